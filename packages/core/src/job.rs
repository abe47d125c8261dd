//! Job domain types for work items in the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Positional arguments supplied by the producer.
pub type Payload = Vec<serde_json::Value>;

/// Identifier for a job within its queue.
///
/// Ids come from a per-queue counter in the backing store, so they increase
/// strictly in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        Ok(Self(s.parse()?))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Unique identifier for a worker, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub Ulid);

impl WorkerId {
    /// Create a new unique worker ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a worker ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current state of a job in its lifecycle.
///
/// Jobs only move forward: `Waiting -> Active -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting to be claimed by a worker.
    #[default]
    Waiting,
    /// Job is held by exactly one worker.
    Active,
    /// Handler returned a result.
    Completed,
    /// Handler returned an error, panicked or timed out.
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 4] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
    ];

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Waiting, JobState::Active)
                | (JobState::Active, JobState::Completed)
                | (JobState::Active, JobState::Failed)
        )
    }

    /// Get a simple state string for display and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Parse the storage representation produced by [`JobState::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job represents one unit of work: a payload plus its lifecycle and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier, unique within `queue`.
    pub id: JobId,
    /// The queue this job belongs to.
    pub queue: String,
    /// Positional arguments for the handler.
    pub payload: Payload,
    /// Current state.
    pub state: JobState,
    /// When the job was inserted.
    pub enqueued_at: DateTime<Utc>,
    /// When a worker claimed the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Handler output, only for completed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Rendered handler error, only for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Worker that claimed the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
}

impl Job {
    /// Create a new waiting job.
    pub fn new(id: JobId, queue: impl Into<String>, payload: Payload) -> Self {
        Self {
            id,
            queue: queue.into(),
            payload,
            state: JobState::Waiting,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            worker_id: None,
        }
    }

    /// Milliseconds between claim and terminal transition.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }

    /// Milliseconds the job spent waiting before it was claimed.
    pub fn wait_ms(&self) -> Option<u64> {
        self.started_at
            .map(|start| (start - self.enqueued_at).num_milliseconds().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_state_machine_only_moves_forward() {
        use JobState::*;

        assert!(Waiting.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Failed));

        assert!(!Waiting.can_transition_to(Completed));
        assert!(!Waiting.can_transition_to(Failed));
        assert!(!Active.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Active));
        for state in JobState::ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in JobState::ALL {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("paused"), None);
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Active.is_terminal());
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let mut job = Job::new(JobId(1), "mailer", vec![serde_json::json!("a@b.c")]);
        assert_eq!(job.duration_ms(), None);

        let start = job.enqueued_at + Duration::milliseconds(5);
        job.started_at = Some(start);
        job.finished_at = Some(start + Duration::milliseconds(250));
        assert_eq!(job.duration_ms(), Some(250));
        assert_eq!(job.wait_ms(), Some(5));
    }

    #[test]
    fn test_job_id_ordering_and_parse() {
        assert!(JobId(2) > JobId(1));
        assert_eq!(JobId::parse("42").ok(), Some(JobId(42)));
        assert!(JobId::parse("abc").is_err());
        assert_eq!(JobId(7).to_string(), "7");
    }
}
