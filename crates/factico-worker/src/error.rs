//! Error types for task handlers.

use factico_db::DbError;
use factico_market::MarketError;
use factico_rag::RagError;
use factico_verifier::VerifierError;

/// Errors surfaced by task handlers to the worker loop.
///
/// Any handler error Nacks the task; the bus retry policy decides
/// between redelivery and the dead-letter stream. Hard provider
/// failures additionally raise operator notifications at the failure
/// site before propagating.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A data-layer operation failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// An LLM call failed.
    #[error("verifier error: {0}")]
    Verifier(#[from] VerifierError),

    /// Context building failed.
    #[error("rag error: {0}")]
    Rag(#[from] RagError),

    /// Market agent work failed.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// The task payload did not deserialize.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
