//! Conformance test suite for `LedgerStorage` implementations.
//!
//! Backend-agnostic checks every `LedgerStorage` implementation must pass:
//!
//! - **World state**: reads, writes, deletes, read-your-own-writes
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes discarded
//! - **Version validation / OCC**: stale read sets rejected without side effects
//! - **History**: every committed version, in order, deletions included
//! - **Concurrency**: racing transactions on one key produce exactly one winner
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { CouchLedger::connect(url).await }).await;
//! assert_eq!(report.failed(), 0, "{report}");
//! ```

mod concurrent;
mod history;
mod snapshot;
mod state;
mod version;

use std::fmt;
use std::future::Future;

use crate::{KeyModification, LedgerStorage, StorageError};

/// Outcome of one conformance case.
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Suite group, e.g. `"version"`.
    pub group: &'static str,
    pub case: &'static str,
    /// `Err` carries what the backend did wrong.
    pub outcome: Result<(), String>,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Collects the cases of one group.
struct Cases {
    group: &'static str,
    results: Vec<CaseResult>,
}

impl Cases {
    fn new(group: &'static str) -> Self {
        Cases {
            group,
            results: Vec::new(),
        }
    }

    fn record(&mut self, case: &'static str, outcome: Result<(), String>) {
        self.results.push(CaseResult {
            group: self.group,
            case,
            outcome,
        });
    }

    fn into_results(self) -> Vec<CaseResult> {
        self.results
    }
}

#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub cases: Vec<CaseResult>,
}

impl ConformanceReport {
    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.passed())
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ledger conformance: {} of {} cases passed",
            self.total() - self.failed(),
            self.total()
        )?;
        for case in self.failures() {
            if let Err(reason) = &case.outcome {
                writeln!(f, "  {}::{}: {}", case.group, case.case, reason)?;
            }
        }
        Ok(())
    }
}

/// Run every group against a backend. `factory` builds a fresh, empty
/// ledger for each case.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut cases = state::run_state_tests(&factory).await;
    cases.extend(snapshot::run_snapshot_tests(&factory).await);
    cases.extend(version::run_version_tests(&factory).await);
    cases.extend(history::run_history_tests(&factory).await);
    cases.extend(concurrent::run_concurrent_tests(&factory).await);
    ConformanceReport { cases }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Write `value` to `key` in a snapshot of its own and commit it.
async fn commit_put<S: LedgerStorage>(s: &S, key: &str, value: &[u8]) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_state(&mut snap, key, value.to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete `key` in a snapshot of its own and commit it.
async fn commit_delete<S: LedgerStorage>(s: &S, key: &str) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut snap, key)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}

/// Drain a history cursor into a Vec.
async fn collect_history<S: LedgerStorage>(
    s: &S,
    key: &str,
) -> Result<Vec<KeyModification>, String> {
    let cursor = s.history_for_key(key).await.map_err(|e| e.to_string())?;
    cursor
        .collect::<Result<Vec<_>, StorageError>>()
        .map_err(|e| e.to_string())
}

fn expect_value(got: Option<Vec<u8>>, want: Option<&str>, what: &str) -> Result<(), String> {
    if got.as_deref() != want.map(str::as_bytes) {
        return Err(format!(
            "{what}: expected {want:?}, got {:?}",
            got.as_deref().map(String::from_utf8_lossy)
        ));
    }
    Ok(())
}
