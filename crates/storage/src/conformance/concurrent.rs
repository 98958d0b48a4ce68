use std::future::Future;
use std::sync::Arc;

use tokio::sync::Barrier;

use super::{commit_put, expect_value, CaseResult, Cases};
use crate::{LedgerStorage, StorageError};

const RACERS: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = Cases::new("concurrent");

    cases.record("racing_updates_one_winner", racing_updates_one_winner(factory).await);
    cases.record("racing_creates_one_winner", racing_creates_one_winner(factory).await);
    cases.record("disjoint_keys_all_commit", disjoint_keys_all_commit(factory).await);

    cases.into_results()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

enum Outcome {
    Committed,
    Conflict,
}

/// Spawn `RACERS` tasks that each read `key_for(i)`, wait until every task has
/// read, then write and commit. Returns one outcome per task.
async fn race<S>(
    storage: Arc<S>,
    key_for: fn(usize) -> String,
) -> Result<Vec<Outcome>, String>
where
    S: LedgerStorage,
{
    let barrier = Arc::new(Barrier::new(RACERS));
    let mut handles = Vec::with_capacity(RACERS);

    for i in 0..RACERS {
        let s = Arc::clone(&storage);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            let key = key_for(i);
            let mut snap = s.begin_snapshot().await?;
            s.get_state(&mut snap, &key).await?;
            barrier.wait().await;
            s.put_state(&mut snap, &key, format!("racer-{i}").into_bytes())
                .await?;
            s.commit_snapshot(snap).await
        }));
    }

    let mut outcomes = Vec::with_capacity(RACERS);
    for handle in handles {
        match handle.await.map_err(|e| format!("task panicked: {e}"))? {
            Ok(_) => outcomes.push(Outcome::Committed),
            Err(StorageError::ConcurrentConflict { .. }) => outcomes.push(Outcome::Conflict),
            Err(e) => return Err(format!("unexpected storage error: {e}")),
        }
    }
    Ok(outcomes)
}

fn committed(outcomes: &[Outcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Committed))
        .count()
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn racing_updates_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    commit_put(s.as_ref(), "P-1", b"seed").await?;

    let outcomes = race(Arc::clone(&s), |_| "P-1".to_string()).await?;
    let winners = committed(&outcomes);
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    let history = super::collect_history(s.as_ref(), "P-1").await?;
    if history.len() != 2 {
        return Err(format!("expected 2 history entries, got {}", history.len()));
    }
    Ok(())
}

async fn racing_creates_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    let outcomes = race(Arc::clone(&s), |_| "P-new".to_string()).await?;
    let winners = committed(&outcomes);
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if s
        .get_committed_state("P-new")
        .await
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err("winner's value is missing".to_string());
    }
    Ok(())
}

async fn disjoint_keys_all_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    let outcomes = race(Arc::clone(&s), |i| format!("P-{i}")).await?;
    let winners = committed(&outcomes);
    if winners != RACERS {
        return Err(format!("expected {RACERS} commits, got {winners}"));
    }
    expect_value(
        s.get_committed_state("P-3")
            .await
            .map_err(|e| e.to_string())?,
        Some("racer-3"),
        "P-3",
    )
}
