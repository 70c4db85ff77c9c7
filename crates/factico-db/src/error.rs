//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors with context about which operation failed. Enum values
//! read back from the database that fail to parse surface as
//! [`DbError::Decode`] -- a row with an unknown verdict string is corrupt,
//! not a default.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The database schema is behind the embedded migration set.
    #[error("Schema out of date: {0}")]
    SchemaOutOfDate(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
