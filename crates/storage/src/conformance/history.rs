use std::future::Future;

use super::{collect_history, commit_delete, commit_put, CaseResult, Cases};
use crate::LedgerStorage;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = Cases::new("history");

    cases.record("unknown_key_has_empty_history", unknown_key_has_empty_history(factory).await);
    cases.record(
        "history_lists_versions_oldest_first",
        history_lists_versions_oldest_first(factory).await,
    );
    cases.record("delete_recorded_without_value", delete_recorded_without_value(factory).await);
    cases.record(
        "history_entry_carries_tx_context",
        history_entry_carries_tx_context(factory).await,
    );
    cases.record("history_is_per_key", history_is_per_key(factory).await);
    cases.record("history_excludes_open_snapshot", history_excludes_open_snapshot(factory).await);

    cases.into_results()
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn unknown_key_has_empty_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let history = collect_history(&s, "P-404").await?;
    if !history.is_empty() {
        return Err(format!("expected empty history, got {} entries", history.len()));
    }
    Ok(())
}

async fn history_lists_versions_oldest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    commit_put(&s, "P-1", b"v2").await?;
    commit_put(&s, "P-1", b"v3").await?;

    let values: Vec<Option<Vec<u8>>> = collect_history(&s, "P-1")
        .await?
        .into_iter()
        .map(|m| m.value)
        .collect();
    let want = vec![
        Some(b"v1".to_vec()),
        Some(b"v2".to_vec()),
        Some(b"v3".to_vec()),
    ];
    if values != want {
        return Err(format!("expected v1, v2, v3 in order, got {values:?}"));
    }
    Ok(())
}

async fn delete_recorded_without_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"v1").await?;
    commit_delete(&s, "P-1").await?;

    let history = collect_history(&s, "P-1").await?;
    let [put, delete] = history.as_slice() else {
        return Err(format!("expected 2 entries, got {}", history.len()));
    };
    if put.is_delete || put.value.is_none() {
        return Err("first entry should be a put with a value".to_string());
    }
    if !delete.is_delete || delete.value.is_some() {
        return Err("second entry should be a delete without a value".to_string());
    }
    Ok(())
}

async fn history_entry_carries_tx_context<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let ctx = s.tx_context(&snap).clone();
    s.put_state(&mut snap, "P-1", b"v1".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let history = collect_history(&s, "P-1").await?;
    let entry = history.first().ok_or("history is empty")?;
    if entry.tx_id != ctx.tx_id {
        return Err(format!("tx id {} != {}", entry.tx_id, ctx.tx_id));
    }
    if entry.timestamp != ctx.timestamp {
        return Err(format!("timestamp {} != {}", entry.timestamp, ctx.timestamp));
    }
    Ok(())
}

async fn history_is_per_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    commit_put(&s, "P-1", b"a").await?;
    commit_put(&s, "P-2", b"b").await?;
    commit_put(&s, "P-2", b"c").await?;

    let one = collect_history(&s, "P-1").await?.len();
    let two = collect_history(&s, "P-2").await?.len();
    if (one, two) != (1, 2) {
        return Err(format!("expected (1, 2) entries, got ({one}, {two})"));
    }
    Ok(())
}

async fn history_excludes_open_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let during = collect_history(&s, "P-1").await?.len();
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    let after = collect_history(&s, "P-1").await?.len();
    if (during, after) != (1, 2) {
        return Err(format!(
            "expected 1 entry during and 2 after commit, got {during} and {after}"
        ));
    }
    Ok(())
}
