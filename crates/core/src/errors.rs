//! Error types shared across the taskdeck crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Database-level failures surfaced by storage implementations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Could not obtain a connection from the pool.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Anything else the storage layer could not classify.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Top-level error for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage failure. Callers must treat the mutation as not applied.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced entity does not exist.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Invalid input to a service call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sync identity (user/device/app) has not been initialized yet.
    #[error("Sync identity not configured: {0}")]
    IdentityMissing(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
