//! Error types for the market intelligence agent.

use factico_db::DbError;
use factico_verifier::VerifierError;

/// Errors that can occur during market analysis.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// A data-layer operation failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// An LLM assessment call failed.
    #[error("assessment error: {0}")]
    Llm(#[from] VerifierError),
}

impl MarketError {
    /// Whether the task layer should retry after this error.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Db(_) => true,
            Self::Llm(e) => e.is_transient(),
        }
    }
}
