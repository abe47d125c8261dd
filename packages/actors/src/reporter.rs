//! Outcome reporting: logs, lifecycle events and handler hooks.

use std::panic::AssertUnwindSafe;

use chrono::Utc;
use queueable_core::{Job, JobEvent, JobId, WorkerId};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::HandlerError;
use crate::handler::{JobHandler, panic_message};

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 1024;

/// Surfaces job outcomes to observers.
///
/// Every outcome is logged with `queue`, `job_id` and `duration_ms` fields,
/// broadcast as a [`JobEvent`], and forwarded to the handler's hooks. The
/// worker only calls `completed`/`failed` after the store accepted the
/// transition, so each hook fires once per job.
#[derive(Debug, Clone)]
pub struct OutcomeReporter {
    events: broadcast::Sender<JobEvent>,
}

impl Default for OutcomeReporter {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { events }
    }
}

impl OutcomeReporter {
    pub fn new(events: broadcast::Sender<JobEvent>) -> Self {
        Self { events }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn enqueued(&self, queue: &str, job_id: JobId) {
        tracing::debug!(queue = %queue, job_id = %job_id, "Job enqueued");
        self.emit(JobEvent::JobEnqueued {
            job_id,
            queue: queue.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn started(&self, job: &Job, worker_id: WorkerId) {
        tracing::info!(
            queue = %job.queue,
            job_id = %job.id,
            worker_id = %worker_id,
            "Processing started"
        );
        self.emit(JobEvent::JobStarted {
            job_id: job.id,
            queue: job.queue.clone(),
            worker_id,
            timestamp: Utc::now(),
        });
    }

    pub fn completed(&self, job: &Job, handler: &dyn JobHandler, result: &Value) {
        let duration_ms = job.duration_ms().unwrap_or_default();
        tracing::info!(
            queue = %job.queue,
            job_id = %job.id,
            duration_ms,
            "Processed"
        );
        self.emit(JobEvent::JobCompleted {
            job_id: job.id,
            queue: job.queue.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });
        run_hook(job, "on_completed", || handler.on_completed(job, result));
    }

    pub fn failed(&self, job: &Job, handler: &dyn JobHandler, error: &HandlerError) {
        let duration_ms = job.duration_ms().unwrap_or_default();
        tracing::warn!(
            queue = %job.queue,
            job_id = %job.id,
            duration_ms,
            error = %error,
            "Failed"
        );
        self.emit(JobEvent::JobFailed {
            job_id: job.id,
            queue: job.queue.clone(),
            error: error.to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });
        run_hook(job, "on_failed", || handler.on_failed(job, error));
    }

    pub fn worker_started(&self, worker_id: WorkerId, queue: &str) {
        tracing::info!(worker_id = %worker_id, queue = %queue, "Worker started");
        self.emit(JobEvent::WorkerStarted {
            worker_id,
            queue: queue.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn worker_stopped(&self, worker_id: WorkerId, queue: &str, processed: u64) {
        tracing::info!(worker_id = %worker_id, queue = %queue, processed, "Worker stopped");
        self.emit(JobEvent::WorkerStopped {
            worker_id,
            queue: queue.to_string(),
            processed,
            timestamp: Utc::now(),
        });
    }
}

/// A panicking hook is logged and must not take the worker down with it.
fn run_hook(job: &Job, name: &str, hook: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(hook)) {
        tracing::error!(
            queue = %job.queue,
            job_id = %job.id,
            hook = name,
            error = %panic_message(panic),
            "Hook panicked"
        );
    }
}
