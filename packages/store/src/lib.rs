//! Durable job storage for the queueable engine.
//!
//! This crate owns every job record and the atomic state transitions
//! between them. Producers and workers never hold private copies that
//! could race; they go through a [`JobStore`].
//!
//! # Backends
//!
//! - [`RedisJobStore`]: Redis lists and hashes, with every transition
//!   executed as a single Lua script.
//! - [`MemoryJobStore`]: in-process tables behind one mutex, for tests and
//!   single-process embedding.

use std::future::Future;

use queueable_core::{Job, JobId, JobState, Payload, QueueStats, WorkerId};

mod error;
mod memory;
mod record;
mod redis_store;
mod scripts;

pub use error::StoreError;
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, connection_url};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic job storage.
///
/// Records are keyed by `(queue, id)`. Every method is a single atomic step
/// against the backing store, so concurrent callers in any number of
/// processes observe a consistent state machine.
pub trait JobStore: Send + Sync + 'static {
    /// Create a `Waiting` job at the tail of `queue`.
    fn insert(&self, queue: &str, payload: Payload) -> impl Future<Output = StoreResult<JobId>> + Send;

    /// Move the oldest waiting job of `queue` to `Active` and return it.
    ///
    /// Returns `None` when nothing is waiting. At most one caller ever
    /// receives a given job.
    fn claim_next(
        &self,
        queue: &str,
        worker_id: WorkerId,
    ) -> impl Future<Output = StoreResult<Option<Job>>> + Send;

    /// Transition an `Active` job to `Completed`, storing its result.
    fn mark_completed(
        &self,
        queue: &str,
        id: JobId,
        result: serde_json::Value,
    ) -> impl Future<Output = StoreResult<Job>> + Send;

    /// Transition an `Active` job to `Failed`, storing the error.
    fn mark_failed(
        &self,
        queue: &str,
        id: JobId,
        error: &str,
    ) -> impl Future<Output = StoreResult<Job>> + Send;

    /// Get a job by queue and ID.
    fn get(&self, queue: &str, id: JobId) -> impl Future<Output = StoreResult<Job>> + Send;

    /// Count jobs per state.
    fn stats(&self, queue: &str) -> impl Future<Output = StoreResult<QueueStats>> + Send;

    /// List up to `limit` jobs in `state`.
    ///
    /// Waiting jobs come back in claim order, the other states newest first.
    fn list(
        &self,
        queue: &str,
        state: JobState,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<Job>>> + Send;

    /// Delete a terminal job record.
    fn reap(&self, queue: &str, id: JobId) -> impl Future<Output = StoreResult<()>> + Send;

    /// Check that the backing store is reachable.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}
