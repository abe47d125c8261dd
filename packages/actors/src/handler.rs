//! Job handler trait and function-based handlers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;

use futures_util::FutureExt;
use queueable_core::{Job, Payload};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HandlerError;

/// Result type for job handlers.
pub type HandlerResult = Result<Value, HandlerError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// Implement this trait to define how the jobs of one queue are processed.
/// The worker resolves the returned future, records the outcome in the store
/// and only then calls the matching hook, exactly once per job.
pub trait JobHandler: Send + Sync + 'static {
    /// The queue this handler consumes.
    ///
    /// Defaults to the implementing type's name without its module path,
    /// so `struct SendEmail` consumes the `SendEmail` queue.
    fn queue_name(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }

    /// Process a job's arguments and return its result.
    fn handle(&self, payload: Payload) -> HandlerFuture;

    /// Called after the job was stored as completed.
    fn on_completed(&self, _job: &Job, _result: &Value) {}

    /// Called after the job was stored as failed.
    fn on_failed(&self, _job: &Job, _error: &HandlerError) {}
}

fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Decode positional arguments into a typed value.
///
/// Tuples and structs with sequence-compatible layouts decode directly, a
/// single-argument payload decodes into its only element.
pub fn parse_args<T: DeserializeOwned>(payload: Payload) -> Result<T, HandlerError> {
    let value = if payload.len() == 1 {
        // Prefer the bare argument, fall back to a one-element sequence.
        let single = payload[0].clone();
        match serde_json::from_value(single) {
            Ok(parsed) => return Ok(parsed),
            Err(_) => Value::Array(payload),
        }
    } else {
        Value::Array(payload)
    };
    Ok(serde_json::from_value(value)?)
}

type CompletedHook = Box<dyn Fn(&Job, &Value) + Send + Sync>;
type FailedHook = Box<dyn Fn(&Job, &HandlerError) + Send + Sync>;

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(Payload) -> HandlerFuture + Send + Sync + 'static,
{
    queue: String,
    handler: F,
    on_completed: Option<CompletedHook>,
    on_failed: Option<FailedHook>,
}

impl<F> FnHandler<F>
where
    F: Fn(Payload) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler for `queue`.
    pub fn new(queue: impl Into<String>, handler: F) -> Self {
        Self {
            queue: queue.into(),
            handler,
            on_completed: None,
            on_failed: None,
        }
    }

    pub fn with_on_completed(mut self, hook: impl Fn(&Job, &Value) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }

    pub fn with_on_failed(
        mut self,
        hook: impl Fn(&Job, &HandlerError) + Send + Sync + 'static,
    ) -> Self {
        self.on_failed = Some(Box::new(hook));
        self
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(Payload) -> HandlerFuture + Send + Sync + 'static,
{
    fn queue_name(&self) -> String {
        self.queue.clone()
    }

    fn handle(&self, payload: Payload) -> HandlerFuture {
        (self.handler)(payload)
    }

    fn on_completed(&self, job: &Job, result: &Value) {
        if let Some(hook) = &self.on_completed {
            hook(job, result);
        }
    }

    fn on_failed(&self, job: &Job, error: &HandlerError) {
        if let Some(hook) = &self.on_failed {
            hook(job, error);
        }
    }
}

/// Run a handler to completion, turning panics and timeouts into
/// [`HandlerError`]s.
pub(crate) async fn execute(
    handler: &dyn JobHandler,
    payload: Payload,
    timeout: Option<Duration>,
) -> HandlerResult {
    // `handle` may panic before it hands back a future.
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(payload))) {
        Ok(future) => future,
        Err(panic) => return Err(HandlerError::Panicked(panic_message(panic))),
    };

    let guarded = AssertUnwindSafe(future).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(HandlerError::TimedOut(limit)),
        },
        None => guarded.await,
    };

    outcome.unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic))))
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Helper macro for creating job handlers from async blocks.
///
/// ```ignore
/// let handler = job_handler!("SendEmail", |payload| {
///     let (to, subject): (String, String) = actors::parse_args(payload)?;
///     Ok(serde_json::json!({ "sent": to, "subject": subject }))
/// });
/// ```
#[macro_export]
macro_rules! job_handler {
    ($queue:expr, |$payload:ident| $body:expr) => {
        $crate::FnHandler::new($queue, |$payload: $crate::Payload| -> $crate::HandlerFuture {
            Box::pin(async move {
                let result: $crate::HandlerResult = $body;
                result
            })
        })
    };
}
