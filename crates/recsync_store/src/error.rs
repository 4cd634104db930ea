//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete in time.
    #[error("store operation timed out")]
    Timeout,

    /// An insert collided with an existing record on a unique field.
    #[error("duplicate value {key:?} for unique field {field}")]
    DuplicateKey {
        /// The unique field.
        field: String,
        /// The colliding value.
        key: String,
    },

    /// The store refused the record (malformed, constraint violation).
    #[error("record rejected: {0}")]
    Rejected(String),

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}
