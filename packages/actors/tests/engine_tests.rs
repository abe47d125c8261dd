#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use actors::{Engine, HandlerError, job_handler, parse_args};
use common::{Echo, fast_config, init_tracing, wait_until};
use queueable_core::{JobState, QueueableConfig};
use serde_json::json;
use store::{JobStore, MemoryJobStore};

fn config() -> QueueableConfig {
    QueueableConfig {
        worker: fast_config(),
        ..QueueableConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_engine_end_to_end() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let engine = Engine::with_store(MemoryJobStore::new(), config()).await?;
    let (echo, tally) = Echo::new();

    let workers = engine.process(echo, 2).await?;
    assert_eq!(workers.len(), 2);
    assert_eq!(engine.workers().await?.len(), 2);

    for n in 0..10 {
        engine.dispatch("Echo", &(n,)).await?;
    }
    wait_until(engine.store().as_ref(), "Echo", |s| s.completed == 10).await?;

    let exits = engine.shutdown().await?;
    assert_eq!(exits.len(), 2);
    let total: u64 = exits
        .into_iter()
        .map(|exit| exit.result.map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .sum();
    assert_eq!(total, 10);
    assert_eq!(tally.completed().len(), 10);

    // The supervisor is gone.
    assert!(engine.workers().await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_engine_with_macro_handler() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let engine = Engine::with_store(MemoryJobStore::new(), config()).await?;

    let add = job_handler!("Add", |payload| {
        let (a, b): (i64, i64) = parse_args(payload)?;
        if b == 0 {
            return Err(HandlerError::msg("zero is not allowed"));
        }
        Ok(json!(a + b))
    });
    engine.process(add, 0).await?;

    let ok = engine.dispatch("Add", &(2, 3)).await?;
    let rejected = engine.dispatch("Add", &(2, 0)).await?;
    let malformed = engine.enqueue("Add", vec![json!("x")]).await?;

    wait_until(engine.store().as_ref(), "Add", |s| s.processed() == 3).await?;

    let store = engine.store();
    let job = store.get("Add", ok).await?;
    assert_eq!((job.state, job.result), (JobState::Completed, Some(json!(5))));
    let job = store.get("Add", rejected).await?;
    assert_eq!(job.error.as_deref(), Some("zero is not allowed"));
    let job = store.get("Add", malformed).await?;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error.unwrap_or_default().starts_with("Invalid arguments"));

    engine.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_engine_shutdown_without_workers() -> Result<(), Box<dyn Error>> {
    let engine = Engine::with_store(MemoryJobStore::new(), QueueableConfig::default()).await?;
    let clone = engine.clone();
    assert!(clone.workers().await?.is_empty());
    assert!(engine.shutdown().await?.is_empty());
    assert!(clone.shutdown().await.is_err());
    Ok(())
}
