//! LLM-backed verification for the Factico pipeline.
//!
//! This crate owns every LLM touchpoint: the provider abstraction
//! (OpenAI-compatible and Anthropic wire formats behind enum dispatch,
//! with primary/fallback composition), prompt templating, robust JSON
//! response parsing, the claim extractor, the four verification sub-agents
//! with their deterministic synthesizer, the entity/topic classifier, and
//! cost tracking.
//!
//! # Architecture
//!
//! ```text
//! Source content --> Extractor --> VerificationContext (from factico-rag)
//!                                   --> 4 sub-agents (concurrent)
//!                                   --> Synthesizer --> SynthesizedVerdict
//! ```
//!
//! Providers are constructed once at startup and injected; no handler
//! reaches for process-wide state.

pub mod agents;
pub mod classifier;
pub mod cost;
pub mod error;
pub mod extractor;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod synthesizer;

pub use agents::{Orchestrator, DEFAULT_ORCHESTRATOR_BUDGET};
pub use classifier::{CanonicalEntity, Classifier, TopicAssignment};
pub use cost::{CostSummary, CostTracker};
pub use error::VerifierError;
pub use extractor::ClaimExtractor;
pub use prompt::{PromptEngine, RenderedPrompt};
pub use provider::{
    create_provider, Completion, CompletionRequest, LlmProvider, ProviderConfig, ProviderKind,
    ProviderPair,
};
pub use synthesizer::synthesize;
