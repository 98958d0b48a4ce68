#![allow(dead_code)]

use std::sync::Arc;

use dpp_engine::{Caller, PassportContract, PassportService, Response};
use dpp_storage::{LedgerClock, MemoryLedger};
use serde_json::Value;
use time::macros::datetime;

pub const SUPPLIER: &str = "Org1MSP";
pub const MANUFACTURER: &str = "Org2MSP";
pub const SITE: &str = "Org3MSP";
pub const AUDITOR: &str = "Org4MSP";

/// Consensus time every transaction in these tests is stamped with.
pub const STAMP: &str = "2025-03-01T09:30:00.250Z";

pub fn ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::with_clock(LedgerClock::Fixed(datetime!(
        2025-03-01 09:30:00.25 UTC
    ))))
}

pub fn service() -> PassportService<MemoryLedger> {
    PassportService::new(ledger(), PassportContract::default())
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn json(response: &Response) -> Value {
    serde_json::to_value(response).unwrap()
}

/// Submit and expect success.
pub async fn ok(
    svc: &PassportService<MemoryLedger>,
    msp: &str,
    function: &str,
    values: &[&str],
) -> Value {
    let submitted = svc
        .submit(&Caller::new(msp), function, &args(values))
        .await
        .unwrap_or_else(|e| panic!("{function} by {msp} failed: {e}"));
    json(&submitted.response)
}

/// Committed bytes of a product record.
pub async fn stored(svc: &PassportService<MemoryLedger>, id: &str) -> Option<Vec<u8>> {
    use dpp_storage::LedgerStorage;
    svc.ledger().get_committed_state(id).await.unwrap()
}

/// Create `id` and register one raw material batch for it.
pub async fn with_raw_material(svc: &PassportService<MemoryLedger>, id: &str) {
    ok(svc, SUPPLIER, "CreateProduct", &[id, r#"{"name":"pane"}"#]).await;
    ok(
        svc,
        SUPPLIER,
        "RegisterRawMaterial",
        &[id, "sand-hash", "ipfs://sand", "B-001"],
    )
    .await;
}
