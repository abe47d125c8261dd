use queueable_core::{JobId, JobState};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A state change would violate `Waiting -> Active -> {Completed, Failed}`.
    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    /// Only completed or failed jobs can be reaped.
    #[error("Job {id} is still {state}")]
    NotTerminal { id: JobId, state: JobState },

    #[error("Job not found: {queue}:{id}")]
    NotFound { queue: String, id: JobId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record could not be decoded.
    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub(crate) fn not_found(queue: &str, id: JobId) -> Self {
        StoreError::NotFound {
            queue: queue.to_string(),
            id,
        }
    }

    /// Whether the error means the store itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}
