//! Common error types for monitoring backends

use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in monitoring backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// Bad or missing backend configuration. Fatal at registry resolution,
    /// never deferred to query time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote monitoring system could not be reached or returned a
    /// protocol-level error. Recoverable per query: the aggregation layer
    /// degrades affected objects instead of failing the batch.
    #[error("Backend unavailable: {message}")]
    Unavailable {
        /// Transport or remote error message
        message: String,
        /// Remote error code, when the backend reported one
        code: Option<i64>,
    },

    /// Valid query, but the remote system has no such object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Operation not supported by this backend
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Backend query exceeded the caller-specified timeout
    #[error("Backend query timed out")]
    Timeout,
}

impl BackendError {
    /// Create an `Unavailable` error without a remote error code
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            code: None,
        }
    }

    /// Returns `true` for failures the aggregation layer degrades to
    /// UNKNOWN records rather than propagating.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable { .. } | BackendError::Timeout
        )
    }
}
