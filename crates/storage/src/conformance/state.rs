use std::future::Future;

use super::{commit_delete, commit_put, expect_value, CaseResult, Cases};
use crate::LedgerStorage;

pub(super) async fn run_state_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = Cases::new("state");

    cases.record("missing_key_reads_none", missing_key_reads_none(factory).await);
    cases.record("committed_put_readable", committed_put_readable(factory).await);
    cases.record(
        "committed_put_readable_in_later_snapshot",
        committed_put_readable_in_later_snapshot(factory).await,
    );
    cases.record("put_overwrites_whole_value", put_overwrites_whole_value(factory).await);
    cases.record("snapshot_reads_its_own_writes", snapshot_reads_its_own_writes(factory).await);
    cases.record("delete_makes_key_absent", delete_makes_key_absent(factory).await);
    cases.record("snapshot_reads_its_own_delete", snapshot_reads_its_own_delete(factory).await);
    cases.record("keys_are_independent", keys_are_independent(factory).await);
    cases.record("snapshots_get_distinct_tx_ids", snapshots_get_distinct_tx_ids(factory).await);

    cases.into_results()
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A key that was never written reads as `None`, both committed and in a snapshot.
async fn missing_key_reads_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_value(
        s.get_committed_state("P-404").await.map_err(|e| e.to_string())?,
        None,
        "committed read",
    )?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let got = s
        .get_state(&mut snap, "P-404")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(got, None, "snapshot read")
}

async fn committed_put_readable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"{\"id\":\"P-1\"}").await?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("{\"id\":\"P-1\"}"),
        "committed read",
    )
}

async fn committed_put_readable_in_later_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let got = s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(got, Some("v1"), "snapshot read")
}

async fn put_overwrites_whole_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"a long first value").await?;
    commit_put(&s, "P-1", b"short").await?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("short"),
        "after overwrite",
    )
}

async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"old").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"new".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let got = s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(got, Some("new"), "read after own write")
}

async fn delete_makes_key_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    commit_delete(&s, "P-1").await?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        None,
        "after delete",
    )
}

async fn snapshot_reads_its_own_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "P-1")
        .await
        .map_err(|e| e.to_string())?;
    let got = s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(got, None, "read after own delete")
}

async fn keys_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"one").await?;
    commit_put(&s, "P-2", b"two").await?;
    commit_delete(&s, "P-1").await?;
    expect_value(
        s.get_committed_state("P-2").await.map_err(|e| e.to_string())?,
        Some("two"),
        "untouched key",
    )
}

async fn snapshots_get_distinct_tx_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let same = s.tx_context(&a).tx_id == s.tx_context(&b).tx_id;
    s.abort_snapshot(a).await.map_err(|e| e.to_string())?;
    s.abort_snapshot(b).await.map_err(|e| e.to_string())?;
    if same {
        return Err("two snapshots were assigned the same tx id".to_string());
    }
    Ok(())
}
