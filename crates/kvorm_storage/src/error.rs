//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// An iteration range was malformed.
    #[error("invalid range: {message}")]
    InvalidRange {
        /// Description of the problem.
        message: String,
    },

    /// The iterator was used after it was closed or exhausted.
    #[error("iterator is not valid")]
    InvalidIterator,

    /// The backing store reported a failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates an invalid range error.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange {
            message: message.into(),
        }
    }
}
