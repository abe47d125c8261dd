//! Message types for actor communication.

use std::sync::Arc;

use queueable_core::WorkerId;
use ractor::RpcReplyPort;

use crate::error::WorkerError;
use crate::handler::JobHandler;

/// Messages for the worker actor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Claim and run the next job, or back off if none is waiting.
    Poll,

    /// Stop after the in-flight job, if any, has been recorded.
    Shutdown,

    /// Report counters.
    GetStatus { reply: RpcReplyPort<WorkerStatus> },
}

/// Snapshot of a worker's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub queue: String,
    pub processed: u64,
    pub failed: u64,
}

/// A worker tracked by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub queue: String,
}

/// How a drained worker ended.
#[derive(Debug)]
pub struct WorkerExit {
    pub worker_id: WorkerId,
    pub queue: String,
    /// Jobs processed, or the error that stopped the worker.
    pub result: Result<u64, WorkerError>,
}

/// Messages for the Supervisor.
pub enum SupervisorMessage {
    /// Start `concurrency` linked workers for `handler`.
    StartWorkers {
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        reply: RpcReplyPort<Result<Vec<WorkerId>, WorkerError>>,
    },

    /// List running workers.
    ListWorkers { reply: RpcReplyPort<Vec<WorkerInfo>> },

    /// Drain every worker, then stop.
    Shutdown { reply: RpcReplyPort<Vec<WorkerExit>> },
}
