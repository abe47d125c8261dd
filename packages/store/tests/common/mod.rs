#![allow(dead_code)]

use std::collections::HashSet;
use std::error::Error;

use queueable_core::{JobId, JobState, WorkerId};
use serde_json::json;
use store::{JobStore, RedisJobStore, StoreError};

type TestResult = Result<(), Box<dyn Error>>;

/// Connect to the server named by `REDIS_URL` under a fresh key prefix.
pub async fn redis_store() -> Result<RedisJobStore, StoreError> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into());
    let client = redis::Client::open(url)?;
    let conn = redis::aio::ConnectionManager::new(client).await?;
    let prefix = format!("queueable-test-{}", WorkerId::new());
    Ok(RedisJobStore::from_connection(conn, &prefix))
}

pub async fn claims_in_fifo_order<S: JobStore>(store: &S) -> TestResult {
    let worker = WorkerId::new();
    for name in ["A", "B", "C"] {
        store.insert("fifo", vec![json!(name)]).await?;
    }

    let mut seen = Vec::new();
    while let Some(job) = store.claim_next("fifo", worker).await? {
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.worker_id, Some(worker));
        assert!(job.started_at.is_some());
        seen.push(job.payload[0].clone());
    }

    assert_eq!(seen, vec![json!("A"), json!("B"), json!("C")]);
    assert!(store.claim_next("fifo", worker).await?.is_none());
    Ok(())
}

pub async fn concurrent_claims_are_exclusive<S: JobStore + Clone>(store: &S) -> TestResult {
    for n in 0..100 {
        store.insert("race", vec![json!(n)]).await?;
    }

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerId::new();
            let mut claimed = Vec::new();
            while let Some(job) = store.claim_next("race", worker).await? {
                claimed.push(job.id);
            }
            Ok::<_, StoreError>(claimed)
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await??);
    }

    let unique: HashSet<JobId> = all.iter().copied().collect();
    assert_eq!(all.len(), 100);
    assert_eq!(unique.len(), 100);

    let stats = store.stats("race").await?;
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.active, 100);
    Ok(())
}

pub async fn transitions_follow_lifecycle<S: JobStore>(store: &S) -> TestResult {
    let worker = WorkerId::new();
    let id = store.insert("life", vec![json!({"to": "a@b.c"})]).await?;

    let waiting = store.get("life", id).await?;
    assert_eq!(waiting.state, JobState::Waiting);
    assert!(waiting.started_at.is_none());

    // Not claimed yet.
    let early = store.mark_completed("life", id, json!(null)).await;
    assert!(matches!(
        early,
        Err(StoreError::InvalidTransition {
            from: JobState::Waiting,
            to: JobState::Completed,
            ..
        })
    ));

    let claimed = store.claim_next("life", worker).await?.ok_or("nothing claimed")?;
    assert_eq!(claimed.id, id);

    let done = store.mark_completed("life", id, json!({"sent": true})).await?;
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.result, Some(json!({"sent": true})));
    assert!(done.finished_at.is_some());
    assert!(done.duration_ms().is_some());

    let again = store.mark_failed("life", id, "late").await;
    assert!(matches!(
        again,
        Err(StoreError::InvalidTransition {
            from: JobState::Completed,
            to: JobState::Failed,
            ..
        })
    ));

    let stored = store.get("life", id).await?;
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(stored.error, None);

    let second = store.insert("life", vec![]).await?;
    store.claim_next("life", worker).await?;
    let failed = store.mark_failed("life", second, "boom").await?;
    assert_eq!(failed.state, JobState::Failed);
    assert_eq!(failed.error.as_deref(), Some("boom"));
    assert_eq!(failed.result, None);
    Ok(())
}

pub async fn unknown_jobs_are_not_found<S: JobStore>(store: &S) -> TestResult {
    let missing = JobId(9_999);
    assert!(matches!(
        store.get("ghost", missing).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.mark_completed("ghost", missing, json!(1)).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.mark_failed("ghost", missing, "x").await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.reap("ghost", missing).await,
        Err(StoreError::NotFound { .. })
    ));

    // Ids are scoped to their queue.
    let id = store.insert("real", vec![]).await?;
    assert!(matches!(
        store.get("other", id).await,
        Err(StoreError::NotFound { .. })
    ));
    Ok(())
}

pub async fn stats_and_listing<S: JobStore>(store: &S) -> TestResult {
    let worker = WorkerId::new();
    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(store.insert("stats", vec![json!(n)]).await?);
    }
    for _ in 0..3 {
        store.claim_next("stats", worker).await?;
    }
    store.mark_completed("stats", ids[0], json!(0)).await?;
    store.mark_failed("stats", ids[1], "nope").await?;

    let stats = store.stats("stats").await?;
    assert_eq!(stats.waiting, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed(), 2);

    let waiting = store.list("stats", JobState::Waiting, 10).await?;
    let waiting_ids: Vec<JobId> = waiting.iter().map(|j| j.id).collect();
    assert_eq!(waiting_ids, vec![ids[3], ids[4]]);

    let limited = store.list("stats", JobState::Waiting, 1).await?;
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, ids[3]);

    let unbounded = store.list("stats", JobState::Waiting, usize::MAX).await?;
    assert_eq!(unbounded.len(), 2);
    assert_eq!(unbounded[0].id, ids[3]);
    let failed = store.list("stats", JobState::Failed, usize::MAX).await?;
    assert_eq!(failed.len(), 1);

    let active = store.list("stats", JobState::Active, 10).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, ids[2]);

    assert!(store.list("stats", JobState::Completed, 0).await?.is_empty());
    Ok(())
}

pub async fn reap_removes_terminal_jobs<S: JobStore>(store: &S) -> TestResult {
    let worker = WorkerId::new();
    let id = store.insert("reap", vec![]).await?;

    assert!(matches!(
        store.reap("reap", id).await,
        Err(StoreError::NotTerminal {
            state: JobState::Waiting,
            ..
        })
    ));

    store.claim_next("reap", worker).await?;
    assert!(matches!(
        store.reap("reap", id).await,
        Err(StoreError::NotTerminal {
            state: JobState::Active,
            ..
        })
    ));

    store.mark_completed("reap", id, json!(true)).await?;
    store.reap("reap", id).await?;

    assert!(matches!(
        store.get("reap", id).await,
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(store.stats("reap").await?.completed, 0);

    // Ids are never reused after a reap.
    let next = store.insert("reap", vec![]).await?;
    assert!(next > id);
    Ok(())
}
