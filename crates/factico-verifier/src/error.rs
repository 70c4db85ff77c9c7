//! Error types for the verifier.
//!
//! Errors carry their retry classification: transient failures (timeouts,
//! rate limits, 5xx) are safe for the task layer to Nack and retry; hard
//! failures (auth, quota) escalate to an operator notification and are not
//! retried blindly.

/// Errors that can occur in the verification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// A provider HTTP call failed in a retryable way (timeout, 5xx,
    /// rate limit, connection error).
    #[error("provider transient failure: {0}")]
    ProviderTransient(String),

    /// A provider rejected the call permanently (auth, quota exhausted).
    #[error("provider hard failure: {0}")]
    ProviderHard(String),

    /// The provider call exceeded its deadline.
    #[error("provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The response text could not be parsed into the expected shape.
    #[error("parse failure: {0}")]
    Parse(String),

    /// A prompt template failed to load or render.
    #[error("template failure: {0}")]
    Template(String),

    /// The operation's call or time budget was exhausted.
    #[error("budget exhausted: {0}")]
    Budget(String),

    /// The configured provider does not support the requested capability.
    #[error("unsupported capability: {0}")]
    Unsupported(String),
}

impl VerifierError {
    /// Whether the task layer should retry after this error.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProviderTransient(_) | Self::Timeout(_) | Self::Budget(_)
        )
    }

    /// Whether this error should raise an operator notification.
    pub const fn is_hard(&self) -> bool {
        matches!(self, Self::ProviderHard(_))
    }
}
