//! In-memory job store implementation
//!
//! Keeps the same per-queue structures as the Redis layout behind a single
//! mutex. Suitable for tests, development and single-process embedding;
//! nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use queueable_core::{Job, JobId, JobState, Payload, QueueStats, WorkerId};
use tokio::sync::Mutex;

use crate::{JobStore, StoreError, StoreResult};

/// Tables for one queue.
#[derive(Debug, Default)]
struct QueueTable {
    last_id: u64,
    /// Oldest at the front.
    waiting: VecDeque<JobId>,
    /// Newest at the front, as are the terminal lists.
    active: VecDeque<JobId>,
    completed: VecDeque<JobId>,
    failed: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl QueueTable {
    fn list_mut(&mut self, state: JobState) -> &mut VecDeque<JobId> {
        match state {
            JobState::Waiting => &mut self.waiting,
            JobState::Active => &mut self.active,
            JobState::Completed => &mut self.completed,
            JobState::Failed => &mut self.failed,
        }
    }

    fn remove_from(&mut self, state: JobState, id: JobId) {
        let list = self.list_mut(state);
        if let Some(pos) = list.iter().position(|j| *j == id) {
            list.remove(pos);
        }
    }
}

/// In-memory job store.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    queues: Arc<Mutex<HashMap<String, QueueTable>>>,
    /// Simulated outage switch, see [`MemoryJobStore::set_available`].
    unavailable: Arc<AtomicBool>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StorageUnavailable` until re-enabled.
    ///
    /// Lets callers exercise their handling of store outages.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Release);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Acquire) {
            Err(StoreError::StorageUnavailable("memory store disabled".into()))
        } else {
            Ok(())
        }
    }

    async fn finish(
        &self,
        queue: &str,
        id: JobId,
        target: JobState,
        outcome: Outcome,
    ) -> StoreResult<Job> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let table = queues
            .get_mut(queue)
            .ok_or_else(|| StoreError::not_found(queue, id))?;
        let job = table
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(queue, id))?;

        if !job.state.can_transition_to(target) || job.state != JobState::Active {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.state,
                to: target,
            });
        }

        job.state = target;
        job.finished_at = Some(Utc::now());
        match outcome {
            Outcome::Result(value) => job.result = Some(value),
            Outcome::Error(error) => job.error = Some(error),
        }
        let job = job.clone();

        table.remove_from(JobState::Active, id);
        table.list_mut(target).push_front(id);
        Ok(job)
    }
}

enum Outcome {
    Result(serde_json::Value),
    Error(String),
}

impl JobStore for MemoryJobStore {
    async fn insert(&self, queue: &str, payload: Payload) -> StoreResult<JobId> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let table = queues.entry(queue.to_string()).or_default();

        table.last_id += 1;
        let id = JobId(table.last_id);
        table.jobs.insert(id, Job::new(id, queue, payload));
        table.waiting.push_back(id);

        tracing::debug!(queue = %queue, job_id = %id, "Inserted job");
        Ok(id)
    }

    async fn claim_next(&self, queue: &str, worker_id: WorkerId) -> StoreResult<Option<Job>> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let Some(table) = queues.get_mut(queue) else {
            return Ok(None);
        };

        while let Some(id) = table.waiting.pop_front() {
            // Skip ids whose record vanished; reaping only touches terminal jobs.
            let Some(job) = table.jobs.get_mut(&id) else {
                continue;
            };
            job.state = JobState::Active;
            job.started_at = Some(Utc::now());
            job.worker_id = Some(worker_id);
            let job = job.clone();
            table.active.push_front(id);

            tracing::debug!(queue = %queue, job_id = %id, worker_id = %worker_id, "Claimed job");
            return Ok(Some(job));
        }

        Ok(None)
    }

    async fn mark_completed(
        &self,
        queue: &str,
        id: JobId,
        result: serde_json::Value,
    ) -> StoreResult<Job> {
        self.finish(queue, id, JobState::Completed, Outcome::Result(result))
            .await
    }

    async fn mark_failed(&self, queue: &str, id: JobId, error: &str) -> StoreResult<Job> {
        self.finish(queue, id, JobState::Failed, Outcome::Error(error.to_string()))
            .await
    }

    async fn get(&self, queue: &str, id: JobId) -> StoreResult<Job> {
        self.check_available()?;
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .and_then(|table| table.jobs.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(queue, id))
    }

    async fn stats(&self, queue: &str) -> StoreResult<QueueStats> {
        self.check_available()?;
        let queues = self.queues.lock().await;
        Ok(queues
            .get(queue)
            .map(|table| QueueStats {
                waiting: table.waiting.len() as u64,
                active: table.active.len() as u64,
                completed: table.completed.len() as u64,
                failed: table.failed.len() as u64,
            })
            .unwrap_or_default())
    }

    async fn list(&self, queue: &str, state: JobState, limit: usize) -> StoreResult<Vec<Job>> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let Some(table) = queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let ids: Vec<JobId> = table.list_mut(state).iter().take(limit).copied().collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| table.jobs.get(&id).cloned())
            .collect())
    }

    async fn reap(&self, queue: &str, id: JobId) -> StoreResult<()> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let table = queues
            .get_mut(queue)
            .ok_or_else(|| StoreError::not_found(queue, id))?;
        let state = table
            .jobs
            .get(&id)
            .map(|job| job.state)
            .ok_or_else(|| StoreError::not_found(queue, id))?;

        if !state.is_terminal() {
            return Err(StoreError::NotTerminal { id, state });
        }

        table.remove_from(state, id);
        table.jobs.remove(&id);
        tracing::debug!(queue = %queue, job_id = %id, "Reaped job");
        Ok(())
    }

    async fn ping(&self) -> bool {
        !self.unavailable.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_queue_is_empty() {
        let store = MemoryJobStore::new();
        assert!(store.claim_next("nothing", WorkerId::new()).await.unwrap().is_none());
        assert_eq!(store.stats("nothing").await.unwrap(), QueueStats::default());
        assert!(store.list("nothing", JobState::Waiting, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_per_queue() {
        let store = MemoryJobStore::new();
        let a1 = store.insert("a", vec![]).await.unwrap();
        let a2 = store.insert("a", vec![]).await.unwrap();
        let b1 = store.insert("b", vec![]).await.unwrap();
        assert_eq!((a1, a2, b1), (JobId(1), JobId(2), JobId(1)));
    }

    #[tokio::test]
    async fn test_outage_switch() {
        let store = MemoryJobStore::new();
        store.set_available(false);
        assert!(!store.ping().await);
        let err = store.insert("q", vec![json!(1)]).await.unwrap_err();
        assert!(err.is_unavailable());

        store.set_available(true);
        assert!(store.ping().await);
        assert!(store.insert("q", vec![json!(1)]).await.is_ok());
    }
}
