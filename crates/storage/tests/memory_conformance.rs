use dpp_storage::conformance::run_conformance_suite;
use dpp_storage::MemoryLedger;

#[tokio::test]
async fn memory_ledger_passes_conformance() {
    let report = run_conformance_suite(|| async { MemoryLedger::new() }).await;
    assert!(report.total() > 30, "suite shrank: {report}");
    assert_eq!(report.failed(), 0, "{report}");
}

#[tokio::test]
async fn every_group_runs() {
    let report = run_conformance_suite(|| async { MemoryLedger::new() }).await;
    for group in ["state", "snapshot", "version", "history", "concurrent"] {
        assert!(
            report.cases.iter().any(|c| c.group == group),
            "no cases for {group}"
        );
    }
}
