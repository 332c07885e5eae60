// crates/sync-engine/src/error.rs
//! Error types for sync operations

use laboursync_core::{AppError, RemoteError};
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failed; surfaced to the caller, never retried automatically
    #[error("Storage error: {0}")]
    Storage(#[from] AppError),

    /// Stored event type is not one the engine can replay
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Remote service rejected the event or could not be reached
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Payload references an entity the server has not assigned an id to yet
    #[error("Field '{field}' references unresolved identifier {temp_id}")]
    UnresolvedIdentifier { field: String, temp_id: String },
}

impl SyncError {
    /// Returns true if the failed event is put on the backoff schedule
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::UnresolvedIdentifier { .. })
    }

    /// Returns true if the error comes from the local store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
