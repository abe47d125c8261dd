//! Queue-level types.

use serde::{Deserialize, Serialize};

/// Check that a queue name can be used as a key component.
///
/// Names must contain at least one non-whitespace character and no control
/// characters.
pub fn validate_queue_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("queue name must not be empty".into());
    }
    if name.chars().any(char::is_control) {
        return Err(format!("queue name {:?} contains control characters", name));
    }
    Ok(())
}

/// Statistics for a queue's current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Number of waiting jobs.
    pub waiting: u64,
    /// Number of jobs held by a worker.
    pub active: u64,
    /// Number of retained completed jobs.
    pub completed: u64,
    /// Number of retained failed jobs.
    pub failed: u64,
}

impl QueueStats {
    /// Jobs not yet finished (waiting + active).
    pub fn pending(&self) -> u64 {
        self.waiting + self.active
    }

    /// Total processed jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}
