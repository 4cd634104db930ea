//! Error types for the sync engine.

use crate::report::PassKind;
use recsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Source or target store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration rejected before any I/O.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A record has no usable business key.
    #[error("record has no string value for key field {field}")]
    MissingKey {
        /// The configured key field.
        field: String,
    },

    /// Another pass of the same kind is already running.
    #[error("a {0} pass is already in progress")]
    PassInProgress(PassKind),

    /// `start()` was called on a running scheduler.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// The scheduler has been stopped.
    #[error("scheduler stopped")]
    Stopped,

    /// A transient failure persisted through every retry.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// What was being attempted.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// The final error.
        last_error: StoreError,
    },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
