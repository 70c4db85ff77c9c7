//! Shared type definitions for the Factico fact-checking pipeline.
//!
//! This crate is the single source of truth for all types used across the
//! Factico workspace: the data model (sources, claims, evidence, markets),
//! the task bus message shapes, and the verification context passed through
//! the RAG builder and orchestrator.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Closed vocabularies (platforms, states, verdicts, tiers)
//! - [`records`] -- Persisted entity structs
//! - [`tasks`] -- Task bus payloads and retry policies
//! - [`context`] -- Verification context and synthesis types

pub mod context;
pub mod enums;
pub mod ids;
pub mod records;
pub mod tasks;

// Re-export all public types at crate root for convenience.
pub use context::{
    DuplicateRef, EntityHint, EvidenceDoc, ExtractionOutcome, KeyEvidencePoint, SimilarClaim,
    SubAgentKind, SubAgentReport, SynthesizedVerdict, VerificationContext,
};
pub use enums::{
    CredibilityTier, EntityKind, EvidenceStrength, MarketStatus, Platform, ReviewPriority,
    SkipReason, SourceState, TaskKind, TradeSide, Verdict,
};
pub use ids::{
    AccountId, ClaimId, EntityId, EvidenceId, FactorId, MarketId, NotificationId, SourceId,
    TaskId, TopicId, TradeId, TrendId,
};
pub use records::{
    Account, Claim, Engagement, Entity, Evidence, Market, Notification, PredictionFactor, Source,
    SourceCredibility, StatsSnapshot, Topic, Trade, TrendingTopic, MAX_CLAIM_CHARS,
    MAX_EXPLANATION_CHARS, MAX_SOURCE_CONTENT_BYTES, PROB_TOLERANCE,
};
pub use tasks::{ProcessSourcePayload, RetryPolicy, TaskMessage, WriteEmbeddingPayload};
