//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, WorkerId};

/// Events emitted by the engine as jobs move through their lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    // Job events
    /// A new job was enqueued.
    JobEnqueued {
        job_id: JobId,
        queue: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker claimed a job and started its handler.
    JobStarted {
        job_id: JobId,
        queue: String,
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
    },
    /// A job completed successfully.
    JobCompleted {
        job_id: JobId,
        queue: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    JobFailed {
        job_id: JobId,
        queue: String,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    /// A worker started polling a queue.
    WorkerStarted {
        worker_id: WorkerId,
        queue: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker stopped polling a queue.
    WorkerStopped {
        worker_id: WorkerId,
        queue: String,
        processed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobEnqueued { timestamp, .. } => *timestamp,
            JobEvent::JobStarted { timestamp, .. } => *timestamp,
            JobEvent::JobCompleted { timestamp, .. } => *timestamp,
            JobEvent::JobFailed { timestamp, .. } => *timestamp,
            JobEvent::WorkerStarted { timestamp, .. } => *timestamp,
            JobEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the queue name associated with this event.
    pub fn queue(&self) -> &str {
        match self {
            JobEvent::JobEnqueued { queue, .. }
            | JobEvent::JobStarted { queue, .. }
            | JobEvent::JobCompleted { queue, .. }
            | JobEvent::JobFailed { queue, .. }
            | JobEvent::WorkerStarted { queue, .. }
            | JobEvent::WorkerStopped { queue, .. } => queue,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobEnqueued { job_id, .. } => Some(*job_id),
            JobEvent::JobStarted { job_id, .. } => Some(*job_id),
            JobEvent::JobCompleted { job_id, .. } => Some(*job_id),
            JobEvent::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobEnqueued { job_id, queue, .. } => {
                format!("{} job {} enqueued", queue, job_id)
            }
            JobEvent::JobStarted {
                job_id,
                queue,
                worker_id,
                ..
            } => format!("{} job {} processing on {}", queue, job_id, worker_id),
            JobEvent::JobCompleted {
                job_id,
                queue,
                duration_ms,
                ..
            } => format!("{} job {} processed in {} milliseconds", queue, job_id, duration_ms),
            JobEvent::JobFailed {
                job_id,
                queue,
                error,
                duration_ms,
                ..
            } => format!(
                "{} job {} failed in {} milliseconds: {}",
                queue, job_id, duration_ms, error
            ),
            JobEvent::WorkerStarted {
                worker_id, queue, ..
            } => format!("Worker {} started on {}", worker_id, queue),
            JobEvent::WorkerStopped {
                worker_id,
                queue,
                processed,
                ..
            } => format!(
                "Worker {} stopped on {} after {} jobs",
                worker_id, queue, processed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = JobEvent::JobFailed {
            job_id: JobId(3),
            queue: "reports".into(),
            error: "boom".into(),
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        assert_eq!(event.queue(), "reports");
        assert_eq!(event.job_id(), Some(JobId(3)));
        assert_eq!(
            event.description(),
            "reports job 3 failed in 12 milliseconds: boom"
        );

        let worker = JobEvent::WorkerStarted {
            worker_id: WorkerId::new(),
            queue: "reports".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(worker.job_id(), None);
    }

    #[test]
    fn test_event_is_tagged() {
        let event = JobEvent::JobCompleted {
            job_id: JobId(1),
            queue: "q".into(),
            duration_ms: 5,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "job_completed");
        assert_eq!(json["job_id"], 1);
    }
}
