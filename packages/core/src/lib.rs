//! Core domain types for the queueable job engine.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId and JobState for work items
//! - QueueStats for per-queue counts
//! - Events for real-time updates
//! - Configuration loaded once at startup

mod config;
mod events;
mod job;
mod queue;

pub use config::{ConfigError, QueueableConfig, StoreConfig, WorkerConfig};
pub use events::JobEvent;
pub use job::{Job, JobId, JobState, Payload, WorkerId};
pub use queue::{QueueStats, validate_queue_name};
