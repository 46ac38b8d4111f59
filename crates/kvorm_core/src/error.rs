//! Error types for kvorm core.

use thiserror::Error;

/// Result type for ORM operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors that can occur in ORM operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrmError {
    /// No record is stored under the requested row id.
    #[error("not found")]
    NotFound,

    /// The write would duplicate an existing row id, unique index key or
    /// sequence value.
    #[error("unique constraint violation")]
    UniqueConstraint,

    /// Malformed input.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A record of the wrong type was passed to a table or index.
    #[error("invalid type: expected {expected}, got {actual}")]
    InvalidType {
        /// Type bound to the table.
        expected: &'static str,
        /// Type that was passed.
        actual: &'static str,
    },

    /// An operation that needs a non-empty row id received an empty one.
    #[error("key must not be empty")]
    EmptyKey,

    /// The iterator has no more elements.
    #[error("iterator done")]
    IteratorDone,

    /// The iterator was used after close or advanced past its end.
    #[error("invalid iterator")]
    InvalidIterator,

    /// A byte key part exceeds the length-prefix limit.
    #[error("key part of {len} bytes exceeds the maximum of 255")]
    KeyMaxLength {
        /// Length of the rejected part.
        len: usize,
    },

    /// Stateless record validation failed.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] kvorm_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] kvorm_codec::CodecError),
}

impl OrmError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid type error.
    pub fn invalid_type(expected: &'static str, actual: &'static str) -> Self {
        Self::InvalidType { expected, actual }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` for [`OrmError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` for [`OrmError::UniqueConstraint`].
    pub fn is_unique_constraint(&self) -> bool {
        matches!(self, Self::UniqueConstraint)
    }

    /// Returns `true` for [`OrmError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` for [`OrmError::InvalidType`].
    pub fn is_invalid_type(&self) -> bool {
        matches!(self, Self::InvalidType { .. })
    }

    /// Returns `true` for [`OrmError::IteratorDone`].
    pub fn is_iterator_done(&self) -> bool {
        matches!(self, Self::IteratorDone)
    }
}
