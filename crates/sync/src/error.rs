//! Error types for the sync transport crate.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Retry policy class for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur while talking to the relay.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the relay
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (token provider failed or token malformed)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Socket-level failure
    #[error("Socket error: {0}")]
    Socket(String),

    /// Invalid request (bad configuration, malformed URL, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure from the core (event log, checkpoint store, projector)
    #[error("Core error: {0}")]
    Core(#[from] taskdeck_core::Error),
}

impl SyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn socket(message: impl std::fmt::Display) -> Self {
        Self::Socket(message.to_string())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => RetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) | Self::Socket(_) => RetryClass::Retryable,
            Self::Json(_) | Self::InvalidRequest(_) => RetryClass::Permanent,
            Self::Auth(_) => RetryClass::ReauthRequired,
            Self::Core(_) => RetryClass::Permanent,
        }
    }
}
