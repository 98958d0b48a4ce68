use std::future::Future;

use super::{commit_delete, commit_put, expect_value, CaseResult, Cases};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = Cases::new("version");

    // Stale reads fail
    cases.record("stale_read_rejected_at_commit", stale_read_rejected_at_commit(factory).await);
    cases.record(
        "absent_read_conflicts_with_concurrent_create",
        absent_read_conflicts_with_concurrent_create(factory).await,
    );
    cases.record(
        "read_conflicts_with_concurrent_delete",
        read_conflicts_with_concurrent_delete(factory).await,
    );

    // Conflict error fields
    cases.record("conflict_names_the_key", conflict_names_the_key(factory).await);

    // Conflict does not mutate state
    cases.record("conflict_does_not_change_state", conflict_does_not_change_state(factory).await);

    // Fresh reads succeed
    cases.record(
        "read_after_prior_commit_succeeds",
        read_after_prior_commit_succeeds(factory).await,
    );
    cases.record("blind_write_does_not_conflict", blind_write_does_not_conflict(factory).await);
    cases.record(
        "unrelated_key_commit_does_not_conflict",
        unrelated_key_commit_does_not_conflict(factory).await,
    );

    // Race conditions (sequential simulation)
    cases.record("two_snapshots_race_one_wins", two_snapshots_race_one_wins(factory).await);

    cases.into_results()
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn stale_read_rejected_at_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-1", b"v2").await?;
    match s.commit_snapshot(snap).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("stale snapshot committed".to_string()),
    }
}

/// Two "create if absent" transactions: the one committing second read the
/// key as absent, which is no longer true.
async fn absent_read_conflicts_with_concurrent_create<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let probe = s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    if probe.is_some() {
        return Err("fresh ledger already holds P-1".to_string());
    }
    s.put_state(&mut snap, "P-1", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-1", b"theirs").await?;
    match s.commit_snapshot(snap).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("second create committed".to_string()),
    }
}

async fn read_conflicts_with_concurrent_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_delete(&s, "P-1").await?;
    match s.commit_snapshot(snap).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("write over concurrently deleted key committed".to_string()),
    }
}

async fn conflict_names_the_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-7", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-7").await.map_err(|e| e.to_string())?;
    commit_put(&s, "P-7", b"v2").await?;
    match s.commit_snapshot(snap).await {
        Err(StorageError::ConcurrentConflict { key, .. }) if key == "P-7" => Ok(()),
        Err(StorageError::ConcurrentConflict { key, .. }) => {
            Err(format!("expected key P-7 in conflict, got {key}"))
        }
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("stale snapshot committed".to_string()),
    }
}

async fn conflict_does_not_change_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"loser".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-1", b"winner").await?;
    let _ = s.commit_snapshot(snap).await;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("winner"),
        "after conflict",
    )
}

async fn read_after_prior_commit_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    commit_put(&s, "P-1", b"v2").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"v3".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("v3"),
        "after commit",
    )
}

async fn blind_write_does_not_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"blind".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-1", b"v2").await?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("blind"),
        "after blind write",
    )
}

async fn unrelated_key_commit_does_not_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-2", b"other").await?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn two_snapshots_race_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;

    let mut a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (snap, value) in [(&mut a, b"a".to_vec()), (&mut b, b"b".to_vec())] {
        s.get_state(snap, "P-1").await.map_err(|e| e.to_string())?;
        s.put_state(snap, "P-1", value)
            .await
            .map_err(|e| e.to_string())?;
    }

    s.commit_snapshot(a)
        .await
        .map_err(|e| format!("first commit: {e}"))?;
    match s.commit_snapshot(b).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => return Err("both racing snapshots committed".to_string()),
    }
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("a"),
        "winner value",
    )
}
