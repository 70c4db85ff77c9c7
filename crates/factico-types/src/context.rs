//! Verification context and verdict synthesis types.
//!
//! The RAG builder assembles an immutable [`VerificationContext`] per claim.
//! The four verification sub-agents read it concurrently and each produce a
//! [`SubAgentReport`]; the synthesizer folds the reports into a
//! [`SynthesizedVerdict`]. No agent mutates shared state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CredibilityTier, EntityKind, EvidenceStrength, SkipReason, Verdict};
use crate::ids::ClaimId;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Outcome of the claim extractor: either a normalized claim or a skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionOutcome {
    /// A normalized factual claim in neutral formal Spanish.
    Claim(String),
    /// The source contains nothing checkable.
    Skip(SkipReason),
}

/// An entity mention pre-extracted from the claim text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHint {
    /// Entity kind.
    pub kind: EntityKind,
    /// The surface form as it appears in the claim.
    pub surface_form: String,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// A prior claim retrieved by embedding similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarClaim {
    /// The prior claim's id.
    pub claim_id: ClaimId,
    /// The prior claim's normalized text.
    pub text: String,
    /// The prior claim's verdict.
    pub verdict: Verdict,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
}

/// A fetched and text-extracted evidence document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDoc {
    /// URL the document was fetched from.
    pub url: String,
    /// Registrable domain of the URL.
    pub domain: String,
    /// Document title.
    pub title: String,
    /// Extracted body text, truncated to the per-source cap.
    pub text: String,
    /// Fetch time.
    pub fetched_at: DateTime<Utc>,
    /// Credibility tier of the domain.
    pub tier: CredibilityTier,
    /// Search-rank derived relevance in `[0, 1]`.
    pub relevance: f64,
}

/// Reference to an existing claim that duplicates the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRef {
    /// The existing claim.
    pub claim_id: ClaimId,
    /// Similarity that triggered the duplicate flag.
    pub similarity: f64,
}

/// Everything the verification orchestrator needs about one claim.
///
/// Built once by the RAG builder, then shared immutably across sub-agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationContext {
    /// The normalized claim under verification.
    pub claim_text: String,
    /// URL of the originating source, when known.
    pub origin_url: Option<String>,
    /// Up to five prior claims ranked by embedding similarity.
    pub similar_claims: Vec<SimilarClaim>,
    /// Fetched evidence documents, ordered by `(tier asc, relevance desc)`.
    pub evidence: Vec<EvidenceDoc>,
    /// Credibility tier per evidence domain (advisory, not filtering).
    pub credibility: BTreeMap<String, CredibilityTier>,
    /// Entities pre-extracted from the claim.
    pub entity_hints: Vec<EntityHint>,
    /// Set when the top similar claim crosses the dedup threshold;
    /// downstream links the source without re-running the orchestrator.
    pub duplicate_of: Option<DuplicateRef>,
}

// ---------------------------------------------------------------------------
// Sub-agent reports and synthesis
// ---------------------------------------------------------------------------

/// The four verification sub-agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubAgentKind {
    /// Weights evidence by tier and domain reputation.
    SourceCredibility,
    /// Inspects similar prior claims for debunk history.
    HistoricalContext,
    /// Inspects the claim for internal contradictions and manipulation cues.
    LogicalConsistency,
    /// Reads evidence texts and judges support/refute/irrelevant per doc.
    EvidenceAnalysis,
}

impl SubAgentKind {
    /// Stable name used in logs and prompt template lookup.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceCredibility => "source_credibility",
            Self::HistoricalContext => "historical_context",
            Self::LogicalConsistency => "logical_consistency",
            Self::EvidenceAnalysis => "evidence_analysis",
        }
    }

    /// All sub-agents, in synthesis order.
    pub const ALL: [Self; 4] = [
        Self::SourceCredibility,
        Self::HistoricalContext,
        Self::LogicalConsistency,
        Self::EvidenceAnalysis,
    ];
}

/// One sub-agent's judgment of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentReport {
    /// Which sub-agent produced the report.
    pub agent: SubAgentKind,
    /// The verdict the sub-agent leans toward.
    pub leaning: Verdict,
    /// Confidence in the leaning, `[0, 1]`.
    pub confidence: f64,
    /// Free-text notes fed to the synthesizer's explanation.
    pub notes: String,
    /// Set by evidence analysis when facts are present but context is
    /// manipulated; drives the Misleading verdict.
    pub contextual_manipulation: bool,
    /// Key evidence points (evidence analysis only; empty elsewhere).
    pub key_points: Vec<KeyEvidencePoint>,
}

/// A key evidence point attached to the synthesized verdict (at most five).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvidencePoint {
    /// One-line summary of what the evidence shows.
    pub summary: String,
    /// Evidence URL, when tied to a fetched document.
    pub url: Option<String>,
    /// Whether the point supports (true) or refutes (false) the claim.
    pub supports: bool,
}

/// The deterministic synthesis of all sub-agent reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedVerdict {
    /// Final verdict.
    pub verdict: Verdict,
    /// Combined confidence, `[0, 1]`.
    pub confidence: f64,
    /// Evidence strength classification.
    pub strength: EvidenceStrength,
    /// Reader-facing explanation, hard-capped at 280 characters.
    pub explanation: String,
    /// Up to five key evidence points.
    pub key_points: Vec<KeyEvidencePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_serde_roundtrip() {
        let context = VerificationContext {
            claim_text: "El banco central subió la tasa de referencia a 11.00%".to_owned(),
            origin_url: Some("https://example.mx/nota".to_owned()),
            similar_claims: vec![SimilarClaim {
                claim_id: ClaimId::new(),
                text: "La tasa de referencia subió a 11%".to_owned(),
                verdict: Verdict::Verified,
                similarity: 0.91,
            }],
            evidence: Vec::new(),
            credibility: BTreeMap::from([(
                "banxico.org.mx".to_owned(),
                CredibilityTier::Official,
            )]),
            entity_hints: vec![EntityHint {
                kind: EntityKind::Institution,
                surface_form: "banco central".to_owned(),
            }],
            duplicate_of: None,
        };
        let json = serde_json::to_string(&context).unwrap_or_default();
        let back = serde_json::from_str::<VerificationContext>(&json).ok();
        assert_eq!(back, Some(context));
    }

    #[test]
    fn sub_agent_names_are_stable() {
        assert_eq!(SubAgentKind::SourceCredibility.as_str(), "source_credibility");
        assert_eq!(SubAgentKind::ALL.len(), 4);
    }
}
