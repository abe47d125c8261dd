//! Producer and worker side of the queueable engine.
//!
//! Jobs are stored through a [`store::JobStore`]; this crate adds the
//! pieces that put work in and take it out again.
//!
//! # Architecture
//!
//! - `Dispatcher` - validates and enqueues jobs
//! - [`WorkerLoop`] - runs a Ractor actor that claims and executes jobs
//!   from one queue, controlled through a [`WorkerHandle`]
//! - `OutcomeReporter` - logs, lifecycle events and handler hooks
//! - `Supervisor` - owns the workers started by an [`Engine`]
//!
//! # Usage
//!
//! ```ignore
//! use actors::{Engine, job_handler};
//!
//! let engine = Engine::connect(QueueableConfig::load(None)?).await?;
//!
//! engine.process(job_handler!("SendEmail", |payload| {
//!     let (to,): (String,) = actors::parse_args(payload)?;
//!     Ok(serde_json::json!({ "sent": to }))
//! }), 4).await?;
//!
//! engine.dispatch("SendEmail", &("someone@example.com",)).await?;
//! ```

mod dispatcher;
mod engine;
mod error;
mod handler;
mod messages;
mod reporter;
mod supervisor;
mod worker_actor;

pub use dispatcher::{Dispatcher, to_payload};
pub use engine::Engine;
pub use error::{DispatchError, EngineError, HandlerError, WorkerError};
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, parse_args};
pub use messages::{SupervisorMessage, WorkerExit, WorkerInfo, WorkerMessage, WorkerStatus};
pub use reporter::OutcomeReporter;
pub use supervisor::{Supervisor, start_supervisor};
pub use worker_actor::{WorkerHandle, WorkerLoop};

pub use queueable_core::{Job, JobEvent, JobId, JobState, Payload, WorkerConfig, WorkerId};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
