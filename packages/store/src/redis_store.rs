//! Redis-backed job store.

use std::collections::HashMap;

use chrono::Utc;
use queueable_core::{Job, JobId, JobState, Payload, QueueStats, StoreConfig, WorkerId};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::record::{QueueKeys, format_time, pairs_to_map, parse_job};
use crate::scripts::Scripts;
use crate::{JobStore, StoreError, StoreResult};

/// Build a `redis://` URL from the connection settings.
///
/// Empty username/password fields are left out, matching a server without
/// authentication.
pub fn connection_url(config: &StoreConfig) -> String {
    let auth = match (config.username.is_empty(), config.password.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!(":{}@", urlencoding::encode(&config.password)),
        (false, _) => format!(
            "{}:{}@",
            urlencoding::encode(&config.username),
            urlencoding::encode(&config.password)
        ),
    };
    format!("redis://{}{}:{}/{}", auth, config.host, config.port, config.db)
}

/// Redis-backed job store.
///
/// Every state transition runs as one Lua script, so no two workers can
/// claim the same job and no transition can interleave with another. The
/// [`ConnectionManager`] reconnects on its own and is shared by clones.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
    prefix: String,
    scripts: Scripts,
}

impl RedisJobStore {
    /// Connect using the given settings.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        tracing::info!(host = %config.host, port = config.port, "Connecting to Redis");

        let client = redis::Client::open(connection_url(config))?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(host = %config.host, port = config.port, "Connected to Redis");
        Ok(Self::from_connection(conn, &config.key_prefix))
    }

    /// Create a store from an existing connection manager.
    ///
    /// Useful when sharing one connection across components.
    pub fn from_connection(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
            scripts: Scripts::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keys(&self, queue: &str) -> QueueKeys {
        QueueKeys::new(&self.prefix, queue)
    }

    /// Run the finish script for `Active -> target`.
    async fn finish(
        &self,
        queue: &str,
        id: JobId,
        target: JobState,
        field: &str,
        value: String,
    ) -> StoreResult<Job> {
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();

        let reply: Option<Vec<String>> = self
            .scripts
            .finish
            .key(keys.job(id))
            .key(keys.list(JobState::Active))
            .key(keys.list(target))
            .arg(id.as_u64())
            .arg(target.as_str())
            .arg(format_time(Utc::now()))
            .arg(field)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;

        let mut flat = reply.ok_or_else(|| StoreError::not_found(queue, id))?;
        if flat.is_empty() {
            return Err(StoreError::Corrupt(format!("empty reply finishing job {}", id)));
        }
        let previous = flat.remove(0);
        let from = JobState::parse(&previous)
            .ok_or_else(|| StoreError::Corrupt(format!("job {} has state {:?}", id, previous)))?;
        if from != JobState::Active {
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: target,
            });
        }

        parse_job(pairs_to_map(flat))
    }
}

impl JobStore for RedisJobStore {
    async fn insert(&self, queue: &str, payload: Payload) -> StoreResult<JobId> {
        let keys = self.keys(queue);
        let payload = serde_json::to_string(&payload)?;
        let mut conn = self.conn.clone();

        let id: u64 = self
            .scripts
            .insert
            .key(keys.counter())
            .key(keys.list(JobState::Waiting))
            .arg(keys.job_prefix())
            .arg(queue)
            .arg(payload)
            .arg(format_time(Utc::now()))
            .invoke_async(&mut conn)
            .await?;

        tracing::debug!(queue = %queue, job_id = id, "Inserted job");
        Ok(JobId(id))
    }

    async fn claim_next(&self, queue: &str, worker_id: WorkerId) -> StoreResult<Option<Job>> {
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();

        let reply: Option<Vec<String>> = self
            .scripts
            .claim
            .key(keys.list(JobState::Waiting))
            .key(keys.list(JobState::Active))
            .arg(keys.job_prefix())
            .arg(format_time(Utc::now()))
            .arg(worker_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        match reply {
            Some(flat) => {
                let job = parse_job(pairs_to_map(flat))?;
                tracing::debug!(queue = %queue, job_id = %job.id, worker_id = %worker_id, "Claimed job");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn mark_completed(
        &self,
        queue: &str,
        id: JobId,
        result: serde_json::Value,
    ) -> StoreResult<Job> {
        let result = serde_json::to_string(&result)?;
        self.finish(queue, id, JobState::Completed, "result", result)
            .await
    }

    async fn mark_failed(&self, queue: &str, id: JobId, error: &str) -> StoreResult<Job> {
        self.finish(queue, id, JobState::Failed, "error", error.to_string())
            .await
    }

    async fn get(&self, queue: &str, id: JobId) -> StoreResult<Job> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(self.keys(queue).job(id)).await?;

        if fields.is_empty() {
            return Err(StoreError::not_found(queue, id));
        }
        parse_job(fields)
    }

    async fn stats(&self, queue: &str) -> StoreResult<QueueStats> {
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();

        let (waiting, active, completed, failed): (u64, u64, u64, u64) = redis::pipe()
            .atomic()
            .llen(keys.list(JobState::Waiting))
            .llen(keys.list(JobState::Active))
            .llen(keys.list(JobState::Completed))
            .llen(keys.list(JobState::Failed))
            .query_async(&mut conn)
            .await?;

        Ok(QueueStats {
            waiting,
            active,
            completed,
            failed,
        })
    }

    async fn list(&self, queue: &str, state: JobState, limit: usize) -> StoreResult<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let keys = self.keys(queue);
        let mut conn = self.conn.clone();
        let list_key = keys.list(state);

        // Waiting ids are claimed from the tail; every other list is pushed
        // at the head, so its head is the newest entry.
        let limit = limit.min(isize::MAX as usize) as isize;
        let ids: Vec<u64> = if state == JobState::Waiting {
            let mut ids: Vec<u64> = conn.lrange(&list_key, -limit, -1).await?;
            ids.reverse();
            ids
        } else {
            conn.lrange(&list_key, 0, limit - 1).await?
        };

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(keys.job(JobId(*id)));
        }
        let records: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        records
            .into_iter()
            .filter(|fields| !fields.is_empty())
            .map(parse_job)
            .collect()
    }

    async fn reap(&self, queue: &str, id: JobId) -> StoreResult<()> {
        let keys = self.keys(queue);
        let mut conn = self.conn.clone();

        let state: Option<String> = self
            .scripts
            .reap
            .key(keys.job(id))
            .key(keys.list(JobState::Completed))
            .key(keys.list(JobState::Failed))
            .arg(id.as_u64())
            .invoke_async(&mut conn)
            .await?;

        let raw = state.ok_or_else(|| StoreError::not_found(queue, id))?;
        let state = JobState::parse(&raw)
            .ok_or_else(|| StoreError::Corrupt(format!("job {} has state {:?}", id, raw)))?;
        if !state.is_terminal() {
            return Err(StoreError::NotTerminal { id, state });
        }

        tracing::debug!(queue = %queue, job_id = %id, "Reaped job");
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        if let Err(e) = &result {
            tracing::warn!("Redis ping failed: {}", e);
        }
        result.is_ok()
    }
}
