//! Assembly of the verification context for one claim.
//!
//! The builder gathers similar prior claims (embedding similarity with a
//! trigram fallback), web evidence (search, fetch, tiering), and lexical
//! entity hints into one immutable [`VerificationContext`]. When the top
//! similar claim crosses the dedup threshold the builder short-circuits:
//! the context carries `duplicate_of` and no evidence is fetched, since
//! the orchestrator will not run.

use std::collections::BTreeMap;

use factico_db::ClaimStore;
use factico_types::{DuplicateRef, EvidenceDoc, SimilarClaim, VerificationContext};
use factico_verifier::{classifier, ProviderPair, VerifierError};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::credibility::CredibilityMap;
use crate::error::RagError;
use crate::fetch::EvidenceFetcher;
use crate::search::WebSearchClient;

/// Similar prior claims carried in the context.
const MAX_SIMILAR_CLAIMS: i64 = 5;

/// Evidence documents retained after ordering.
const TOP_EVIDENCE: usize = 5;

/// Fetch budget per claim.
const FETCH_BUDGET: usize = 6;

/// Default similarity at or above which a claim is a duplicate.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.95;

/// The verification context builder.
pub struct ContextBuilder<'a> {
    pool: &'a PgPool,
    providers: &'a ProviderPair,
    search: &'a WebSearchClient,
    fetcher: &'a EvidenceFetcher,
    credibility: &'a CredibilityMap,
    dedup_threshold: f64,
}

impl<'a> ContextBuilder<'a> {
    /// Create a builder over the shared pipeline components.
    pub const fn new(
        pool: &'a PgPool,
        providers: &'a ProviderPair,
        search: &'a WebSearchClient,
        fetcher: &'a EvidenceFetcher,
        credibility: &'a CredibilityMap,
    ) -> Self {
        Self {
            pool,
            providers,
            search,
            fetcher,
            credibility,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
        }
    }

    /// Override the dedup similarity threshold (a product decision that
    /// needs calibration; see the worker configuration).
    #[must_use]
    pub const fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Build the context for a claim.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Db`] on data-layer failures and
    /// [`RagError::Search`] when the web search fails. Individual evidence
    /// fetch failures degrade to fewer documents.
    pub async fn build(
        &self,
        claim_text: &str,
        origin_url: Option<&str>,
    ) -> Result<VerificationContext, RagError> {
        let similar_claims = self.similar_claims(claim_text).await?;

        let duplicate_of = similar_claims
            .first()
            .filter(|top| top.similarity >= self.dedup_threshold)
            .map(|top| DuplicateRef {
                claim_id: top.claim_id,
                similarity: top.similarity,
            });

        let entity_hints = classifier::lexical_entity_hints(claim_text);

        if let Some(duplicate) = duplicate_of {
            info!(
                claim_id = %duplicate.claim_id,
                similarity = duplicate.similarity,
                "duplicate claim detected, skipping evidence gathering"
            );
            return Ok(VerificationContext {
                claim_text: claim_text.to_owned(),
                origin_url: origin_url.map(ToOwned::to_owned),
                similar_claims,
                evidence: Vec::new(),
                credibility: BTreeMap::new(),
                entity_hints,
                duplicate_of: Some(duplicate),
            });
        }

        let hits = self.search.search(claim_text).await?;
        debug!(hits = hits.len(), "search returned candidate evidence");

        let mut evidence = self
            .fetcher
            .fetch_batch(&hits, FETCH_BUDGET, self.credibility)
            .await;
        order_evidence(&mut evidence);
        evidence.truncate(TOP_EVIDENCE);

        let credibility: BTreeMap<String, factico_types::CredibilityTier> = evidence
            .iter()
            .map(|doc| (doc.domain.clone(), doc.tier))
            .collect();

        info!(
            similar = similar_claims.len(),
            evidence = evidence.len(),
            "verification context built"
        );

        Ok(VerificationContext {
            claim_text: claim_text.to_owned(),
            origin_url: origin_url.map(ToOwned::to_owned),
            similar_claims,
            evidence,
            credibility,
            entity_hints,
            duplicate_of: None,
        })
    }

    /// Similar prior claims by embedding, falling back to text trigram
    /// similarity when the embedding provider is unavailable.
    async fn similar_claims(&self, claim_text: &str) -> Result<Vec<SimilarClaim>, RagError> {
        let store = ClaimStore::new(self.pool);

        match self.providers.embed(claim_text).await {
            Ok(embedding) => Ok(store
                .similar_by_embedding(&embedding, MAX_SIMILAR_CLAIMS)
                .await?),
            Err(VerifierError::Unsupported(reason)) => {
                debug!(reason = reason, "no embedding provider, using text similarity");
                Ok(store.similar_by_text(claim_text, MAX_SIMILAR_CLAIMS).await?)
            }
            Err(e) => {
                warn!(error = %e, "embedding failed, falling back to text similarity");
                Ok(store.similar_by_text(claim_text, MAX_SIMILAR_CLAIMS).await?)
            }
        }
    }
}

/// Stable evidence ordering: credibility tier ascending, then relevance
/// descending, then URL for determinism.
pub fn order_evidence(evidence: &mut [EvidenceDoc]) {
    evidence.sort_by(|a, b| {
        a.tier
            .rank()
            .cmp(&b.tier.rank())
            .then_with(|| b.relevance.total_cmp(&a.relevance))
            .then_with(|| a.url.cmp(&b.url))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use factico_types::CredibilityTier;

    fn doc(url: &str, tier: CredibilityTier, relevance: f64) -> EvidenceDoc {
        EvidenceDoc {
            url: url.to_owned(),
            domain: "example.mx".to_owned(),
            title: String::new(),
            text: String::new(),
            fetched_at: Utc::now(),
            tier,
            relevance,
        }
    }

    #[test]
    fn evidence_orders_by_tier_then_relevance() {
        let mut evidence = vec![
            doc("https://c.mx", CredibilityTier::Unknown, 0.9),
            doc("https://a.mx", CredibilityTier::Official, 0.4),
            doc("https://b.mx", CredibilityTier::VettedPress, 0.8),
            doc("https://d.mx", CredibilityTier::Official, 0.9),
        ];
        order_evidence(&mut evidence);
        let urls: Vec<&str> = evidence.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://d.mx", "https://a.mx", "https://b.mx", "https://c.mx"]
        );
    }

    #[test]
    fn ordering_is_deterministic_on_equal_scores() {
        let mut evidence = vec![
            doc("https://b.mx", CredibilityTier::OtherPress, 0.5),
            doc("https://a.mx", CredibilityTier::OtherPress, 0.5),
        ];
        order_evidence(&mut evidence);
        assert_eq!(evidence.first().map(|d| d.url.as_str()), Some("https://a.mx"));
    }
}
