//! Redis key layout and hash <-> [`Job`] mapping.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use queueable_core::{Job, JobId, JobState, WorkerId};

use crate::StoreError;

/// Keys used for one queue.
///
/// - `{prefix}:{queue}:id` - id counter
/// - `{prefix}:{queue}:wait` - waiting ids, pushed left and popped right
/// - `{prefix}:{queue}:active|completed|failed` - ids per state
/// - `{prefix}:{queue}:{id}` - job hash
#[derive(Debug, Clone)]
pub(crate) struct QueueKeys {
    base: String,
}

impl QueueKeys {
    pub fn new(prefix: &str, queue: &str) -> Self {
        Self {
            base: format!("{}:{}:", prefix, queue),
        }
    }

    pub fn counter(&self) -> String {
        format!("{}id", self.base)
    }

    /// List holding the ids of jobs in `state`.
    pub fn list(&self, state: JobState) -> String {
        match state {
            JobState::Waiting => format!("{}wait", self.base),
            other => format!("{}{}", self.base, other.as_str()),
        }
    }

    /// Prefix that a job id is appended to inside scripts.
    pub fn job_prefix(&self) -> &str {
        &self.base
    }

    pub fn job(&self, id: JobId) -> String {
        format!("{}{}", self.base, id)
    }
}

pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{}: {}", field, e)))
}

/// Turn a flat `HGETALL` reply into field pairs.
pub(crate) fn pairs_to_map(flat: Vec<String>) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        map.insert(key, value);
    }
    map
}

/// Decode a job hash.
pub(crate) fn parse_job(mut fields: HashMap<String, String>) -> Result<Job, StoreError> {
    // An empty error message is still an error message.
    let error = fields.remove("error");
    let mut take = |name: &str| fields.remove(name).filter(|v| !v.is_empty());

    let id = take("id")
        .ok_or_else(|| StoreError::Corrupt("missing id".into()))
        .and_then(|raw| JobId::parse(&raw).map_err(|e| StoreError::Corrupt(format!("id: {}", e))))?;
    let queue = take("queue").ok_or_else(|| StoreError::Corrupt("missing queue".into()))?;
    let payload = match take("payload") {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Vec::new(),
    };
    let state = take("state")
        .as_deref()
        .and_then(JobState::parse)
        .ok_or_else(|| StoreError::Corrupt(format!("job {} has no valid state", id)))?;
    let enqueued_at = match take("enqueued_at") {
        Some(raw) => parse_time("enqueued_at", &raw)?,
        None => return Err(StoreError::Corrupt("missing enqueued_at".into())),
    };
    let started_at = take("started_at")
        .map(|raw| parse_time("started_at", &raw))
        .transpose()?;
    let finished_at = take("finished_at")
        .map(|raw| parse_time("finished_at", &raw))
        .transpose()?;
    let result = take("result")
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;
    let worker_id = take("worker_id").and_then(|raw| WorkerId::parse(&raw).ok());

    Ok(Job {
        id,
        queue,
        payload,
        state,
        enqueued_at,
        started_at,
        finished_at,
        result,
        error,
        worker_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_layout() {
        let keys = QueueKeys::new("queueable", "SendEmail");
        assert_eq!(keys.counter(), "queueable:SendEmail:id");
        assert_eq!(keys.list(JobState::Waiting), "queueable:SendEmail:wait");
        assert_eq!(keys.list(JobState::Failed), "queueable:SendEmail:failed");
        assert_eq!(keys.job(JobId(12)), "queueable:SendEmail:12");
        assert_eq!(keys.job_prefix(), "queueable:SendEmail:");
    }

    #[test]
    fn test_parse_completed_hash() {
        let started = Utc::now();
        let start = format_time(started);
        let end = format_time(started + chrono::Duration::milliseconds(30));
        let flat: Vec<String> = [
            ("id", "4"),
            ("queue", "reports"),
            ("payload", r#"[1,"two"]"#),
            ("state", "completed"),
            ("enqueued_at", start.as_str()),
            ("started_at", start.as_str()),
            ("finished_at", end.as_str()),
            ("result", r#"{"ok":true}"#),
        ]
        .into_iter()
        .flat_map(|(k, v)| [k.to_string(), v.to_string()])
        .collect();

        let job = parse_job(pairs_to_map(flat)).unwrap();
        assert_eq!(job.id, JobId(4));
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.payload, vec![json!(1), json!("two")]);
        assert_eq!(job.result, Some(json!({"ok": true})));
        assert_eq!(job.duration_ms(), Some(30));
        assert_eq!(job.error, None);
    }

    #[test]
    fn test_parse_keeps_empty_error() {
        let now = format_time(Utc::now());
        let flat: Vec<String> = [
            ("id", "9"),
            ("queue", "q"),
            ("state", "failed"),
            ("enqueued_at", now.as_str()),
            ("started_at", now.as_str()),
            ("finished_at", now.as_str()),
            ("error", ""),
        ]
        .into_iter()
        .flat_map(|(k, v)| [k.to_string(), v.to_string()])
        .collect();

        let job = parse_job(pairs_to_map(flat)).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_rejects_unknown_state() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "1".to_string());
        fields.insert("queue".to_string(), "q".to_string());
        fields.insert("state".to_string(), "paused".to_string());
        fields.insert("enqueued_at".to_string(), format_time(Utc::now()));
        assert!(matches!(parse_job(fields), Err(StoreError::Corrupt(_))));
    }
}
