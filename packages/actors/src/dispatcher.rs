//! Producer-side API for adding jobs to a queue.

use std::sync::Arc;

use queueable_core::{JobId, Payload, validate_queue_name};
use serde::Serialize;
use serde_json::Value;
use store::JobStore;

use crate::error::DispatchError;
use crate::handler::JobHandler;
use crate::reporter::OutcomeReporter;

/// Turns producer arguments into durable `Waiting` jobs.
///
/// Each call is one store insert. Failures are returned to the caller and
/// never retried here.
pub struct Dispatcher<S> {
    store: Arc<S>,
    reporter: OutcomeReporter,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<S: JobStore> Dispatcher<S> {
    pub fn new(store: Arc<S>, reporter: OutcomeReporter) -> Self {
        Self { store, reporter }
    }

    /// Enqueue a job with positional arguments.
    pub async fn enqueue(&self, queue: &str, payload: Payload) -> Result<JobId, DispatchError> {
        validate_queue_name(queue).map_err(DispatchError::InvalidQueueName)?;

        let id = self.store.insert(queue, payload).await.map_err(|e| {
            tracing::warn!(queue = %queue, error = %e, "Failed to enqueue job");
            DispatchError::DispatchFailed(e)
        })?;

        self.reporter.enqueued(queue, id);
        Ok(id)
    }

    /// Serialize `args` and enqueue them.
    ///
    /// A value serializing to a JSON array (a tuple, a `Vec`) is spread into
    /// positional arguments; anything else becomes a single argument.
    pub async fn dispatch<T>(&self, queue: &str, args: &T) -> Result<JobId, DispatchError>
    where
        T: Serialize + ?Sized,
    {
        let payload = to_payload(args)?;
        self.enqueue(queue, payload).await
    }

    /// Enqueue onto the queue consumed by `handler`.
    pub async fn dispatch_to<H, T>(&self, handler: &H, args: &T) -> Result<JobId, DispatchError>
    where
        H: JobHandler + ?Sized,
        T: Serialize + ?Sized,
    {
        self.dispatch(&handler.queue_name(), args).await
    }
}

/// Encode dispatch arguments as a payload.
///
/// `()` encodes as no arguments.
pub fn to_payload<T: Serialize + ?Sized>(args: &T) -> Result<Payload, DispatchError> {
    let value =
        serde_json::to_value(args).map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;
    Ok(match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}
