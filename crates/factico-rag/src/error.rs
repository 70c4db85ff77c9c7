//! Error types for the RAG context builder.

use factico_db::DbError;
use factico_verifier::VerifierError;

/// Errors that can occur while building a verification context.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A data-layer lookup failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// An embedding call failed (the builder falls back to text
    /// similarity before surfacing this).
    #[error("embedding error: {0}")]
    Embedding(#[from] VerifierError),

    /// The web search call failed.
    #[error("search error: {0}")]
    Search(String),

    /// An evidence fetch failed (individual fetches degrade gracefully;
    /// this surfaces only for non-fetch plumbing failures).
    #[error("fetch error: {0}")]
    Fetch(String),
}
