//! The market intelligence agent.
//!
//! Three cadences over open markets:
//!
//! - **Seeding** (every 5 minutes): markets created in the last hour with
//!   zero trades get one LLM assessment; confident assessments place a
//!   seed trade (50-200 credits) by the system actor.
//! - **Tier-1** (every 2 hours): lightweight sentiment/news aggregate
//!   refresh for the stalest open markets, written to the prediction
//!   factor's data sources. No trades.
//! - **Tier-2** (daily): full reassessment; an adjustment trade applies
//!   only when the agent is confident, the gap to the current price is
//!   material, and the market is still thin.
//!
//! All trades are attributed to the reserved system actor.

use chrono::{Duration as ChronoDuration, Utc};
use factico_db::{ClaimStore, MarketStore, NewFactor};
use factico_types::{AccountId, Market, Verdict};
use factico_verifier::{CompletionRequest, PromptEngine, ProviderPair};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::error::MarketError;
use crate::pricing::{move_toward, side_for};

/// Version tag stamped on every prediction factor this agent writes.
const AGENT_VERSION: &str = "market-agent/v2";

/// Sampling temperature for assessments.
const ASSESS_TEMPERATURE: f64 = 0.3;

/// Output token cap for assessments.
const ASSESS_MAX_TOKENS: u32 = 600;

/// Configuration for the market intelligence agent.
#[derive(Debug, Clone)]
pub struct MarketAgentConfig {
    /// Minimum assessment confidence to place a seed trade.
    pub min_seed_confidence: f64,
    /// Seed trade size bounds in credits.
    pub seed_trade_min: i64,
    /// Upper seed trade size bound in credits.
    pub seed_trade_max: i64,
    /// Markets refreshed per tier-1 tick.
    pub tier1_batch: i64,
    /// Markets analyzed per tier-2 run.
    pub tier2_batch: i64,
    /// Minimum confidence for a tier-2 adjustment trade.
    pub tier2_min_confidence: f64,
    /// Minimum |assessed - current| for a tier-2 adjustment trade.
    pub tier2_min_gap: f64,
    /// Tier-2 adjustments only apply below this trade count.
    pub tier2_max_trades: i64,
    /// Markets without an assessment newer than this many hours are
    /// reassessed by the hourly inactive sweep.
    pub inactive_after_hours: i64,
    /// Categories routed to the deep provider pair even for seeding.
    pub high_stakes_categories: Vec<String>,
}

impl Default for MarketAgentConfig {
    fn default() -> Self {
        Self {
            min_seed_confidence: 0.4,
            seed_trade_min: 50,
            seed_trade_max: 200,
            tier1_batch: 50,
            tier2_batch: 50,
            tier2_min_confidence: 0.6,
            tier2_min_gap: 0.15,
            tier2_max_trades: 10,
            inactive_after_hours: 24,
            high_stakes_categories: vec!["elections".to_owned(), "economy".to_owned()],
        }
    }
}

/// Raw JSON shape the assessment prompts ask for.
#[derive(Debug, serde::Deserialize)]
struct RawAssessment {
    assessed_prob: f64,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

/// The market intelligence agent.
pub struct MarketAgent<'a> {
    pool: &'a PgPool,
    /// Fast model for routine assessments.
    fast: &'a ProviderPair,
    /// Stronger model for high-stakes categories and claim-tied markets.
    deep: Option<&'a ProviderPair>,
    prompts: &'a PromptEngine,
    system_account: AccountId,
    config: MarketAgentConfig,
}

impl<'a> MarketAgent<'a> {
    /// Create the agent.
    pub const fn new(
        pool: &'a PgPool,
        fast: &'a ProviderPair,
        deep: Option<&'a ProviderPair>,
        prompts: &'a PromptEngine,
        system_account: AccountId,
        config: MarketAgentConfig,
    ) -> Self {
        Self {
            pool,
            fast,
            deep,
            prompts,
            system_account,
            config,
        }
    }

    /// Seed fresh markets: assess, record, and trade when confident.
    ///
    /// Idempotent per market: the fresh-market query excludes anything
    /// with a trade, so a second tick within the hour does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError`] on data-layer failures; individual market
    /// assessment failures are logged and skipped.
    pub async fn seed_new_markets(&self) -> Result<u32, MarketError> {
        let store = MarketStore::new(self.pool);
        let fresh = store.fresh_unseeded(self.config.tier2_batch).await?;
        let mut seeded = 0_u32;

        for market in fresh {
            let assessment = match self.assess(&market, "seed").await {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(market_id = %market.id, error = %e, "seed assessment failed");
                    continue;
                }
            };

            store
                .append_factor(&NewFactor {
                    market_id: market.id,
                    assessed_prob: assessment.assessed_prob,
                    confidence: assessment.confidence,
                    reasoning: assessment.reasoning.clone().unwrap_or_default(),
                    data_sources: serde_json::json!({ "phase": "seed" }),
                    agent_version: AGENT_VERSION.to_owned(),
                })
                .await?;

            if assessment.confidence < self.config.min_seed_confidence {
                debug!(
                    market_id = %market.id,
                    confidence = assessment.confidence,
                    "assessment recorded, confidence too low to trade"
                );
                continue;
            }

            let amount = self.seed_amount();
            let side = side_for(assessment.assessed_prob);
            let new_yes = move_toward(market.yes_prob, assessment.assessed_prob, amount);
            store
                .place_trade(market.id, self.system_account, side, amount, new_yes)
                .await?;
            seeded = seeded.saturating_add(1);
            info!(
                market_id = %market.id,
                side = side.as_str(),
                amount = %amount,
                assessed_prob = assessment.assessed_prob,
                "seed trade placed"
            );
        }

        Ok(seeded)
    }

    /// Tier-1: refresh sentiment/news aggregates for the stalest markets.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Db`] on data-layer failures.
    pub async fn tier1_update(&self) -> Result<u32, MarketError> {
        let store = MarketStore::new(self.pool);
        let claims = ClaimStore::new(self.pool);
        let markets = store.open_by_staleness(self.config.tier1_batch).await?;
        let mut updated = 0_u32;

        for market in markets {
            let related = claims.search_text(&market.question, 20).await?;
            let debunked = related
                .iter()
                .filter(|c| matches!(c.verdict, Verdict::Debunked | Verdict::Misleading))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let debunked_share = if related.is_empty() {
                0.0
            } else {
                debunked as f64 / related.len() as f64
            };

            let previous = store.latest_factor(market.id).await?;
            let (assessed_prob, confidence) = previous
                .as_ref()
                .map_or((market.yes_prob, 0.0), |f| (f.assessed_prob, f.confidence));

            store
                .append_factor(&NewFactor {
                    market_id: market.id,
                    assessed_prob,
                    confidence,
                    reasoning: previous.map(|f| f.reasoning).unwrap_or_default(),
                    data_sources: serde_json::json!({
                        "phase": "tier1",
                        "related_claims": related.len(),
                        "debunked_share": debunked_share,
                        "current_yes_prob": market.yes_prob,
                    }),
                    agent_version: AGENT_VERSION.to_owned(),
                })
                .await?;
            updated = updated.saturating_add(1);
        }

        info!(updated = updated, "tier-1 market aggregates refreshed");
        Ok(updated)
    }

    /// Tier-2: deep reassessment with bounded adjustment trades.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError`] on data-layer failures; per-market
    /// assessment failures are logged and skipped.
    pub async fn tier2_analysis(&self) -> Result<u32, MarketError> {
        let store = MarketStore::new(self.pool);
        let markets = store.open_by_staleness(self.config.tier2_batch).await?;
        let mut adjusted = 0_u32;

        for market in markets {
            let assessment = match self.assess(&market, "tier2").await {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(market_id = %market.id, error = %e, "tier-2 assessment failed");
                    continue;
                }
            };

            store
                .append_factor(&NewFactor {
                    market_id: market.id,
                    assessed_prob: assessment.assessed_prob,
                    confidence: assessment.confidence,
                    reasoning: assessment.reasoning.clone().unwrap_or_default(),
                    data_sources: serde_json::json!({
                        "phase": "tier2",
                        "current_yes_prob": market.yes_prob,
                    }),
                    agent_version: AGENT_VERSION.to_owned(),
                })
                .await?;

            let gap = (assessment.assessed_prob - market.yes_prob).abs();
            let trades = store.trade_count(market.id).await?;
            if assessment.confidence >= self.config.tier2_min_confidence
                && gap >= self.config.tier2_min_gap
                && trades < self.config.tier2_max_trades
            {
                let amount = self.seed_amount();
                let side = side_for(assessment.assessed_prob);
                let new_yes = move_toward(market.yes_prob, assessment.assessed_prob, amount);
                store
                    .place_trade(market.id, self.system_account, side, amount, new_yes)
                    .await?;
                adjusted = adjusted.saturating_add(1);
                info!(
                    market_id = %market.id,
                    gap = gap,
                    side = side.as_str(),
                    "tier-2 adjustment trade placed"
                );
            }
        }

        Ok(adjusted)
    }

    /// Hourly sweep over markets whose latest assessment has gone stale.
    ///
    /// Records a fresh assessment; only still-unseeded markets may get a
    /// trade (under the seeding rule).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError`] on data-layer failures.
    pub async fn reassess_inactive(&self) -> Result<u32, MarketError> {
        let store = MarketStore::new(self.pool);
        let markets = store.open_by_staleness(self.config.tier1_batch).await?;
        let stale_before = Utc::now() - ChronoDuration::hours(self.config.inactive_after_hours);
        let mut reassessed = 0_u32;

        for market in markets {
            let latest = store.latest_factor(market.id).await?;
            if latest.as_ref().is_some_and(|f| f.computed_at > stale_before) {
                continue;
            }

            let assessment = match self.assess(&market, "reassess").await {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(market_id = %market.id, error = %e, "reassessment failed");
                    continue;
                }
            };

            store
                .append_factor(&NewFactor {
                    market_id: market.id,
                    assessed_prob: assessment.assessed_prob,
                    confidence: assessment.confidence,
                    reasoning: assessment.reasoning.clone().unwrap_or_default(),
                    data_sources: serde_json::json!({ "phase": "reassess" }),
                    agent_version: AGENT_VERSION.to_owned(),
                })
                .await?;
            reassessed = reassessed.saturating_add(1);

            let trades = store.trade_count(market.id).await?;
            if trades == 0 && assessment.confidence >= self.config.min_seed_confidence {
                let amount = self.seed_amount();
                let side = side_for(assessment.assessed_prob);
                let new_yes = move_toward(market.yes_prob, assessment.assessed_prob, amount);
                store
                    .place_trade(market.id, self.system_account, side, amount, new_yes)
                    .await?;
            }
        }

        Ok(reassessed)
    }

    /// One LLM assessment of a market.
    async fn assess(&self, market: &Market, phase: &str) -> Result<RawAssessment, MarketError> {
        let store = MarketStore::new(self.pool);
        let stats = store.category_stats(&market.category).await?;
        let history = store.recent_in_category(&market.category, 5).await?;
        let linked_claim = match market.claim_id {
            Some(claim_id) => ClaimStore::new(self.pool).get(claim_id).await?,
            None => None,
        };

        let context = serde_json::json!({
            "phase": phase,
            "question": market.question,
            "category": market.category,
            "current_yes_prob": market.yes_prob,
            "category_base_rate": stats.mean_resolved_yes,
            "category_resolved_count": stats.resolved_count,
            "recent_markets": history
                .iter()
                .map(|m| serde_json::json!({
                    "question": m.question,
                    "yes_prob": m.yes_prob,
                    "status": m.status.as_str(),
                }))
                .collect::<Vec<_>>(),
            "linked_claim": linked_claim.as_ref().map(|c| serde_json::json!({
                "text": c.text,
                "verdict": c.verdict.as_str(),
                "confidence": c.confidence,
            })),
        });

        let prompt = self
            .prompts
            .render_pair("market_system.j2", "market_assess.j2", &context)?;

        let providers = self.providers_for(market, linked_claim.is_some());
        let raw: RawAssessment = providers
            .complete_json(&CompletionRequest {
                system: prompt.system,
                user: prompt.user,
                max_tokens: ASSESS_MAX_TOKENS,
                temperature: ASSESS_TEMPERATURE,
            })
            .await?;

        Ok(RawAssessment {
            assessed_prob: raw.assessed_prob.clamp(0.0, 1.0),
            confidence: raw.confidence.clamp(0.0, 1.0),
            reasoning: raw.reasoning,
        })
    }

    /// Route to the deep provider pair for high-stakes work.
    fn providers_for(&self, market: &Market, claim_tied: bool) -> &ProviderPair {
        let high_stakes = self
            .config
            .high_stakes_categories
            .iter()
            .any(|c| c == &market.category);
        match self.deep {
            Some(deep) if high_stakes || claim_tied => deep,
            _ => self.fast,
        }
    }

    /// A random seed trade size within the configured bounds.
    fn seed_amount(&self) -> Decimal {
        let min = self.config.seed_trade_min.min(self.config.seed_trade_max);
        let max = self.config.seed_trade_max.max(min);
        let credits = rand::rng().random_range(min..=max);
        Decimal::from(credits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_product_rules() {
        let config = MarketAgentConfig::default();
        assert!((config.min_seed_confidence - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.seed_trade_min, 50);
        assert_eq!(config.seed_trade_max, 200);
        assert!((config.tier2_min_gap - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.tier2_max_trades, 10);
    }
}
