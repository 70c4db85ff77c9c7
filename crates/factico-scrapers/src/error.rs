//! Error types for scraper adapters.
//!
//! Network and rate-limit errors are transient: the driver skips the
//! adapter for the current tick and the next scheduled scrape retries.
//! Auth failures are hard: they surface as operator alerts and are not
//! retried blindly.

/// Errors that can occur while scraping a platform.
#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    /// A network call failed or the platform answered 5xx.
    #[error("transient scrape failure: {0}")]
    Transient(String),

    /// The platform rate limit was hit; retry next tick.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Authentication was rejected; operator intervention needed.
    #[error("adapter auth failure: {0}")]
    Auth(String),

    /// The platform response could not be parsed.
    #[error("parse failure: {0}")]
    Parse(String),
}

impl ScraperError {
    /// Whether the next scheduled tick should simply retry.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_) | Self::Parse(_))
    }
}
