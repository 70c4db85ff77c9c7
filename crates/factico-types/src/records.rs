//! Core entity structs persisted by the data layer.
//!
//! These mirror the relational schema: sources, claims, evidence, entities,
//! topics, markets, trades, prediction factors, trending topics, accounts,
//! and operator notifications. Cross-entity references are ids, never owned
//! values -- in-memory views are assembled from ids by the stores.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    CredibilityTier, EntityKind, EvidenceStrength, MarketStatus, Platform, ReviewPriority,
    SourceState, TradeSide, Verdict,
};
use crate::ids::{
    AccountId, ClaimId, EntityId, EvidenceId, FactorId, MarketId, NotificationId, SourceId,
    TopicId, TradeId, TrendId,
};

/// Maximum content length kept on a source before downstream use (8 KiB).
pub const MAX_SOURCE_CONTENT_BYTES: usize = 8 * 1024;

/// Maximum length of a claim's reader-facing explanation.
pub const MAX_EXPLANATION_CHARS: usize = 280;

/// Maximum length of a normalized claim text.
pub const MAX_CLAIM_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Engagement metrics supplied by a platform adapter.
///
/// Absent metrics are `None`, never zero -- a platform that does not expose
/// view counts is different from a post nobody viewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    /// Number of likes/favorites.
    pub likes: Option<i64>,
    /// Number of shares/reposts.
    pub shares: Option<i64>,
    /// Number of comments/replies.
    pub comments: Option<i64>,
    /// Number of views, where the platform exposes them.
    pub views: Option<i64>,
}

/// A raw post or article captured by a scraper, normalized across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier.
    pub id: SourceId,
    /// Platform the source came from.
    pub platform: Platform,
    /// Platform-native identifier, unique per platform.
    pub external_id: String,
    /// Author handle or outlet name.
    pub author: String,
    /// Canonical URL of the post or article.
    pub url: String,
    /// Primary text to fact-check, truncated to [`MAX_SOURCE_CONTENT_BYTES`].
    pub content: String,
    /// When the scraper captured the source (ingestion time).
    pub captured_at: DateTime<Utc>,
    /// Publication time as reported by the platform, when available.
    pub published_at: Option<DateTime<Utc>>,
    /// Engagement metrics, when the adapter supplies them.
    pub engagement: Engagement,
    /// Lifecycle state.
    pub state: SourceState,
    /// Processing attempts so far (terminal `Failed` after three).
    pub attempts: i16,
    /// Reason code recorded on skip or terminal failure.
    pub state_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Claims and evidence
// ---------------------------------------------------------------------------

/// A fact-checked claim with its verdict.
///
/// Immutable after insert except the review flags, which human reviewers may
/// flip. The pipeline never deletes claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique identifier.
    pub id: ClaimId,
    /// Normalized factual claim in neutral formal Spanish.
    pub text: String,
    /// The original source text the claim was extracted from.
    pub original_text: String,
    /// The synthesized verdict.
    pub verdict: Verdict,
    /// Reader-facing explanation, at most [`MAX_EXPLANATION_CHARS`] chars.
    pub explanation: String,
    /// Calibrated confidence in `[0, 1]`.
    pub confidence: f64,
    /// How strongly the evidence backs the verdict.
    pub evidence_strength: EvidenceStrength,
    /// Whether the claim sits in the human review queue.
    pub needs_review: bool,
    /// Review queue priority.
    pub review_priority: ReviewPriority,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// A fetched external document supporting or refuting a claim.
///
/// Rows are owned by their claim and ordered stably by
/// `(credibility_tier asc, relevance desc)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique identifier.
    pub id: EvidenceId,
    /// The claim this evidence belongs to.
    pub claim_id: ClaimId,
    /// URL the evidence was fetched from.
    pub url: String,
    /// Registrable domain of the URL.
    pub domain: String,
    /// Document title.
    pub title: String,
    /// Extracted snippet shown to readers.
    pub snippet: String,
    /// Fetch time.
    pub fetched_at: DateTime<Utc>,
    /// Relevance to the claim in `[0, 1]`.
    pub relevance: f64,
    /// Credibility tier of the domain.
    pub credibility_tier: CredibilityTier,
}

/// A canonicalized named entity shared across claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Canonical name after alias resolution.
    pub canonical_name: String,
    /// Entity kind.
    pub kind: EntityKind,
}

/// A topic from the fixed taxonomy loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Unique identifier.
    pub id: TopicId,
    /// Display name.
    pub name: String,
    /// Stable slug within the taxonomy.
    pub taxonomy_slug: String,
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// Floating-point tolerance for the `yes_prob + no_prob = 1` invariant.
pub const PROB_TOLERANCE: f64 = 1e-9;

/// A binary prediction market, optionally tied to a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Unique identifier.
    pub id: MarketId,
    /// URL-safe slug.
    pub slug: String,
    /// The yes/no question the market resolves.
    pub question: String,
    /// Category used for base-rate statistics and model routing.
    pub category: String,
    /// Probability of yes in `[0, 1]`.
    pub yes_prob: f64,
    /// Probability of no; always `1 - yes_prob` within [`PROB_TOLERANCE`].
    pub no_prob: f64,
    /// Total credits traded.
    pub volume: Decimal,
    /// Lifecycle state.
    pub status: MarketStatus,
    /// Linked claim, when the market was seeded from one.
    pub claim_id: Option<ClaimId>,
    /// When the market stops accepting trades.
    pub closes_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Market {
    /// True when the probability pair satisfies the market invariant.
    pub fn probs_consistent(&self) -> bool {
        (self.yes_prob + self.no_prob - 1.0).abs() <= PROB_TOLERANCE
            && (0.0..=1.0).contains(&self.yes_prob)
    }
}

/// A trade placed on a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique identifier.
    pub id: TradeId,
    /// The market traded.
    pub market_id: MarketId,
    /// The account placing the trade (the system actor for agent trades).
    pub account_id: AccountId,
    /// Side taken.
    pub side: TradeSide,
    /// Credits committed.
    pub amount: Decimal,
    /// Market yes-probability at execution time.
    pub price: f64,
    /// Execution time.
    pub created_at: DateTime<Utc>,
}

/// An agent assessment of a market, append-only; the latest row wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFactor {
    /// Unique identifier.
    pub id: FactorId,
    /// The market assessed.
    pub market_id: MarketId,
    /// The agent's probability estimate for yes.
    pub assessed_prob: f64,
    /// The agent's confidence in its own estimate.
    pub confidence: f64,
    /// Free-text reasoning from the agent.
    pub reasoning: String,
    /// Sentiment/news inputs that fed the assessment, as opaque JSON.
    pub data_sources: serde_json::Value,
    /// Version tag of the agent that produced the assessment.
    pub agent_version: String,
    /// Computation time.
    pub computed_at: DateTime<Utc>,
}

/// A credit account. The reserved system actor places all agent trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display name (leaderboards may filter the system actor).
    pub display_name: String,
    /// True for the reserved system actor.
    pub is_system: bool,
    /// Current credit balance.
    pub balance: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Trending and aggregates
// ---------------------------------------------------------------------------

/// A trending topic snapshot row, replaced wholesale on each detector run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTopic {
    /// Unique identifier.
    pub id: TrendId,
    /// Display name (the leading phrase).
    pub name: String,
    /// Keyword phrases that matched this topic.
    pub keywords: Vec<String>,
    /// Frequency relative to baseline.
    pub trend_score: f64,
    /// Frequency slope over the window.
    pub velocity: f64,
    /// Platforms-seen over total platforms.
    pub correlation: f64,
    /// Overlap with the topic taxonomy.
    pub relevance: f64,
    /// Share of linked claims that were debunked or misleading.
    pub misinformation_risk: f64,
    /// Weighted priority combining all component scores.
    pub priority: f64,
    /// Detection time.
    pub detected_at: DateTime<Utc>,
}

/// Per-author credibility aggregate maintained alongside trending detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCredibility {
    /// Platform the author publishes on.
    pub platform: Platform,
    /// Author handle or outlet name.
    pub author: String,
    /// Total claims linked to this author's sources.
    pub total_claims: i64,
    /// Claims verified.
    pub verified: i64,
    /// Claims debunked.
    pub debunked: i64,
    /// Claims judged misleading.
    pub misleading: i64,
    /// Claims left unverified.
    pub unverified: i64,
    /// Credibility score in `[0, 1]` (verified share, debunk-penalized).
    pub score: f64,
    /// Computation time.
    pub computed_at: DateTime<Utc>,
}

/// The atomic statistics snapshot exposed to the read API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// All claims ever persisted.
    pub total_claims: i64,
    /// Claims with verdict Verified.
    pub verified: i64,
    /// Claims with verdict Debunked.
    pub debunked: i64,
    /// Claims with verdict Misleading.
    pub misleading: i64,
    /// Claims with verdict Unverified.
    pub unverified: i64,
    /// Claims created in the trailing 24 hours.
    pub claims_24h: i64,
    /// Distinct sources captured in the trailing 24 hours.
    pub active_sources_24h: i64,
    /// When the moving-window numbers were last rolled up.
    pub computed_at: DateTime<Utc>,
}

/// An operator notification (provider hard failure, adapter auth failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: NotificationId,
    /// Short machine-readable kind (e.g. `provider_auth`, `adapter_auth`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Whether an operator has acknowledged it.
    pub acknowledged: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_absent_is_none_not_zero() {
        let engagement = Engagement::default();
        assert_eq!(engagement.likes, None);
        assert_eq!(engagement.views, None);
        let json = serde_json::to_value(engagement).unwrap_or_default();
        assert_eq!(json.get("likes"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn market_prob_invariant() {
        let market = Market {
            id: MarketId::new(),
            slug: "inflation-5pct".to_owned(),
            question: "Will inflation exceed 5% by year-end?".to_owned(),
            category: "economy".to_owned(),
            yes_prob: 0.62,
            no_prob: 0.38,
            volume: Decimal::ZERO,
            status: MarketStatus::Open,
            claim_id: None,
            closes_at: None,
            created_at: Utc::now(),
        };
        assert!(market.probs_consistent());

        let broken = Market {
            yes_prob: 0.62,
            no_prob: 0.40,
            ..market
        };
        assert!(!broken.probs_consistent());
    }

    #[test]
    fn source_serde_roundtrip() {
        let source = Source {
            id: SourceId::new(),
            platform: Platform::NewsRss,
            external_id: "feed-entry-9".to_owned(),
            author: "El Diario".to_owned(),
            url: "https://example.mx/nota".to_owned(),
            content: "El banco central subió la tasa a 11.00%".to_owned(),
            captured_at: Utc::now(),
            published_at: None,
            engagement: Engagement::default(),
            state: SourceState::Pending,
            attempts: 0,
            state_reason: None,
        };
        let json = serde_json::to_string(&source).unwrap_or_default();
        let back = serde_json::from_str::<Source>(&json).ok();
        assert_eq!(back, Some(source));
    }
}
