//! Conformance test suite for `CheckStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `CheckStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Memos**: upsert-by-(check, bastion), first-report None, snapshot
//!   visibility
//! - **State**: lock acquisition and blocking, default-OK synthesis,
//!   threshold copying, full re-aggregation
//! - **Transition log**: identity assignment, append-only visibility
//! - **Liveness**: the recency window anchored at the newest memo
//! - **Commit**: all-or-nothing snapshot semantics
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use vigil_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod liveness;
mod memo;
mod state;
mod transition_log;

use std::fmt;
use std::future::Future;

use time::OffsetDateTime;

use vigil_core::Check;

use crate::record::ResultMemo;
use crate::CheckStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "memo", "state", "liveness").
    pub category: String,
    /// Test name (e.g. "absent_state_row_synthesizes_default_ok").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(memo::run_memo_tests(&factory).await);
    results.extend(state::run_state_tests(&factory).await);
    results.extend(transition_log::run_transition_log_tests(&factory).await);
    results.extend(liveness::run_liveness_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: fixtures with sensible defaults ─────────────────────────────────

const CUSTOMER_ID: &str = "11111111-1111-1111-1111-111111111111";
const CHECK_ID: &str = "check-id";

fn base_time() -> OffsetDateTime {
    time::macros::datetime!(2025-01-01 00:00:00 UTC)
}

fn make_check() -> Check {
    Check {
        id: CHECK_ID.to_string(),
        customer_id: CUSTOMER_ID.to_string(),
        name: "conformance check".to_string(),
        min_failing_count: 1,
        min_failing_time: 90,
        deleted: false,
    }
}

fn make_memo(bastion_id: &str, failing: i32, responses: i32, at: OffsetDateTime) -> ResultMemo {
    ResultMemo {
        check_id: CHECK_ID.to_string(),
        customer_id: CUSTOMER_ID.to_string(),
        bastion_id: bastion_id.to_string(),
        failing_count: failing,
        response_count: responses,
        last_updated: at,
    }
}

/// Create a fresh store with the standard check seeded.
async fn store_with_check<S, F, Fut>(factory: &F) -> Result<S, String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .put_check(make_check())
        .await
        .map_err(|e| format!("put_check failed: {e}"))?;
    Ok(store)
}

/// Commit a set of memos in one snapshot.
async fn commit_memos<S: CheckStore>(store: &S, memos: Vec<ResultMemo>) -> Result<(), String> {
    let mut snapshot = store
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin_snapshot failed: {e}"))?;
    for memo in memos {
        store
            .put_memo(&mut snapshot, memo)
            .await
            .map_err(|e| format!("put_memo failed: {e}"))?;
    }
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| format!("commit_snapshot failed: {e}"))
}
