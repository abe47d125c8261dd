use std::time::Duration;

use store::StoreError;
use thiserror::Error;

/// Errors returned to producers by the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    /// The arguments could not be encoded as JSON.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The store rejected the insert; nothing was enqueued.
    #[error("Dispatch failed: {0}")]
    DispatchFailed(#[from] StoreError),
}

/// Why a handler did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Failed(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Failed(format!("Invalid arguments: {}", err))
    }
}

/// Why a worker stopped other than by request.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The store failed and the worker could not continue safely.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker actor ended without reporting an exit status.
    #[error("Worker terminated: {0}")]
    Terminated(String),
}

/// Errors from the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Failed to spawn supervisor: {0}")]
    Spawn(String),

    #[error("Supervisor error: {0}")]
    Supervisor(String),
}
