#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{HandlerError, HandlerFuture, JobHandler};
use queueable_core::{Job, JobId, Payload, QueueStats, WorkerConfig};
use serde_json::{Value, json};
use store::JobStore;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; set `RUST_LOG` to see worker logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short polling so idle workers react quickly.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig::default().with_poll_interval(Duration::from_millis(2), Duration::from_millis(10))
}

/// Poll queue stats until `check` passes or five seconds elapse.
pub async fn wait_until<S, F>(store: &S, queue: &str, check: F) -> Result<QueueStats, Box<dyn Error>>
where
    S: JobStore,
    F: Fn(&QueueStats) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stats = store.stats(queue).await?;
        if check(&stats) {
            return Ok(stats);
        }
        if tokio::time::Instant::now() > deadline {
            return Err(format!("timed out waiting on {}: {:?}", queue, stats).into());
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// What an [`Echo`] handler saw.
#[derive(Default)]
pub struct Tally {
    pub handled: Mutex<Vec<Payload>>,
    pub completed: Mutex<Vec<(JobId, Value)>>,
    pub failed: Mutex<Vec<(JobId, HandlerError)>>,
}

impl Tally {
    pub fn handled(&self) -> Vec<Payload> {
        self.handled.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<(JobId, Value)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<(JobId, HandlerError)> {
        self.failed.lock().unwrap().clone()
    }
}

/// Handler driven by its first argument:
/// `"fail"` errors, `"panic"` panics, `"sleep:<ms>"` sleeps, anything else
/// echoes the payload back.
pub struct Echo {
    pub tally: Arc<Tally>,
}

impl Echo {
    pub fn new() -> (Self, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        (
            Self {
                tally: tally.clone(),
            },
            tally,
        )
    }
}

impl JobHandler for Echo {
    fn handle(&self, payload: Payload) -> HandlerFuture {
        self.tally.handled.lock().unwrap().push(payload.clone());
        let command = payload
            .first()
            .and_then(Value::as_str)
            .map(str::to_string);

        Box::pin(async move {
            match command.as_deref() {
                Some("fail") => Err(HandlerError::msg("asked to fail")),
                Some("panic") => panic!("asked to panic"),
                Some(cmd) if cmd.starts_with("sleep:") => {
                    let ms = cmd["sleep:".len()..].parse().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(json!("slept"))
                }
                _ => Ok(json!({ "echo": payload })),
            }
        })
    }

    fn on_completed(&self, job: &Job, result: &Value) {
        self.tally
            .completed
            .lock()
            .unwrap()
            .push((job.id, result.clone()));
    }

    fn on_failed(&self, job: &Job, error: &HandlerError) {
        self.tally
            .failed
            .lock()
            .unwrap()
            .push((job.id, error.clone()));
    }
}
