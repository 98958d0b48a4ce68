use std::future::Future;

use super::{collect_history, commit_put, expect_value, CaseResult, Cases};
use crate::{ChaincodeEvent, LedgerStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = Cases::new("snapshot");

    cases.record("uncommitted_put_invisible", uncommitted_put_invisible(factory).await);
    cases.record(
        "uncommitted_put_invisible_to_other_snapshot",
        uncommitted_put_invisible_to_other_snapshot(factory).await,
    );
    cases.record("abort_discards_put", abort_discards_put(factory).await);
    cases.record("abort_discards_delete", abort_discards_delete(factory).await);
    cases.record("abort_leaves_no_history", abort_leaves_no_history(factory).await);
    cases.record(
        "multi_key_commit_is_all_or_nothing",
        multi_key_commit_is_all_or_nothing(factory).await,
    );
    cases.record("commit_with_event_succeeds", commit_with_event_succeeds(factory).await);

    cases.into_results()
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn uncommitted_put_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"pending".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let got = s
        .get_committed_state("P-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(got, None, "committed read during open snapshot")
}

async fn uncommitted_put_invisible_to_other_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut writer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut writer, "P-1", b"pending".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let mut reader = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let got = s
        .get_state(&mut reader, "P-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(writer).await.map_err(|e| e.to_string())?;
    s.abort_snapshot(reader).await.map_err(|e| e.to_string())?;
    expect_value(got, None, "read from concurrent snapshot")
}

async fn abort_discards_put<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"v".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        None,
        "after abort",
    )
}

async fn abort_discards_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"keep").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, "P-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("keep"),
        "after aborted delete",
    )
}

async fn abort_leaves_no_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"v2".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    let history = collect_history(&s, "P-1").await?;
    if history.len() != 1 {
        return Err(format!("expected 1 history entry, got {}", history.len()));
    }
    Ok(())
}

async fn multi_key_commit_is_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;

    // A transaction that read P-1 before someone else rewrote it must not
    // apply its write to P-2 either.
    commit_put(&s, "P-1", b"v1").await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_state(&mut snap, "P-1").await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-2", b"mine".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    commit_put(&s, "P-1", b"theirs").await?;

    if s.commit_snapshot(snap).await.is_ok() {
        return Err("stale snapshot committed".to_string());
    }
    expect_value(
        s.get_committed_state("P-1").await.map_err(|e| e.to_string())?,
        Some("theirs"),
        "P-1",
    )?;
    expect_value(
        s.get_committed_state("P-2").await.map_err(|e| e.to_string())?,
        None,
        "P-2",
    )
}

async fn commit_with_event_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, "P-1", b"v".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.set_event(
        &mut snap,
        ChaincodeEvent {
            name: "DPP_EVENT".to_string(),
            payload: b"{}".to_vec(),
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    let tx_id = s.tx_context(&snap).tx_id.clone();
    let receipt = s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    if receipt.tx_id != tx_id {
        return Err(format!(
            "receipt tx id {} does not match snapshot tx id {}",
            receipt.tx_id, tx_id
        ));
    }
    Ok(())
}
