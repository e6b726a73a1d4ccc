use vigil_storage::conformance::run_conformance_suite;
use vigil_storage::MemoryStore;

#[tokio::test]
async fn memory_store_passes_conformance_suite() {
    let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
    assert!(report.failed == 0, "{report}");
}
