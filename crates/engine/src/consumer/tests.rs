use std::sync::Arc;

use async_trait::async_trait;
use time::macros::datetime;
use time::OffsetDateTime;

use vigil_archive::{ArchiveError, MemoryArchive, ResultArchive};
use vigil_core::{Check, CheckResponse, CheckResult};
use vigil_storage::{CheckStore, MemoryStore};

use super::{Consumer, ConsumerOutcome};
use crate::error::WorkerError;
use crate::hook::{NoopHook, TransitionHook};
use crate::worker::{StateChange, WorkerOutcome};

const CUSTOMER_ID: &str = "cust-1";
const CHECK_ID: &str = "check-1";

fn t0() -> OffsetDateTime {
    datetime!(2025-01-01 00:00:00 UTC)
}

fn check() -> Check {
    Check {
        id: CHECK_ID.to_string(),
        customer_id: CUSTOMER_ID.to_string(),
        name: "api health".to_string(),
        min_failing_count: 1,
        min_failing_time: 90,
        deleted: false,
    }
}

fn result(customer_id: &str, check_id: &str, passing: bool) -> CheckResult {
    CheckResult {
        customer_id: customer_id.to_string(),
        check_id: check_id.to_string(),
        bastion_id: "bastion-a".to_string(),
        timestamp: t0(),
        passing,
        responses: vec![CheckResponse {
            passing,
            error: None,
        }],
    }
}

fn payload(result: &CheckResult) -> Vec<u8> {
    serde_json::to_vec(result).unwrap()
}

async fn consumer() -> (
    Consumer<MemoryStore, MemoryArchive, NoopHook>,
    Arc<MemoryStore>,
    Arc<MemoryArchive>,
) {
    let store = Arc::new(MemoryStore::new());
    let archive = Arc::new(MemoryArchive::new());
    store.put_check(check()).await.unwrap();
    (
        Consumer::new(Arc::clone(&store), Arc::clone(&archive), NoopHook),
        store,
        archive,
    )
}

#[tokio::test]
async fn valid_message_runs_the_worker_and_archives_the_result() {
    let (consumer, _store, archive) = consumer().await;

    let outcome = consumer
        .handle_message(&payload(&result(CUSTOMER_ID, CHECK_ID, false)))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ConsumerOutcome::Handled(WorkerOutcome::Completed(_))
    ));
    assert_eq!(consumer.results_handled(), 1);

    let archived = archive
        .get_result_by_check_id("bastion-a", CHECK_ID)
        .await
        .unwrap();
    assert!(!archived.passing);
}

#[tokio::test]
async fn malformed_payload_is_a_decode_error() {
    let (consumer, _store, _archive) = consumer().await;

    let err = consumer.handle_message(b"not json").await.unwrap_err();
    assert!(matches!(err, WorkerError::Decode(_)));
    assert_eq!(consumer.results_handled(), 0);
}

#[tokio::test]
async fn empty_customer_id_is_discarded() {
    let (consumer, store, _archive) = consumer().await;

    let outcome = consumer
        .handle_message(&payload(&result("", CHECK_ID, false)))
        .await
        .unwrap();
    assert!(matches!(outcome, ConsumerOutcome::Discarded));
    assert_eq!(consumer.results_handled(), 0);
    assert!(store.get_state(CUSTOMER_ID, CHECK_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_check_id_is_discarded() {
    let (consumer, _store, _archive) = consumer().await;

    let outcome = consumer
        .handle_message(&payload(&result(CUSTOMER_ID, "", false)))
        .await
        .unwrap();
    assert!(matches!(outcome, ConsumerOutcome::Discarded));
}

#[tokio::test]
async fn redelivered_message_is_a_quiet_stale_outcome() {
    let (consumer, _store, _archive) = consumer().await;
    let msg = payload(&result(CUSTOMER_ID, CHECK_ID, true));

    consumer.handle_message(&msg).await.unwrap();
    let outcome = consumer.handle_message(&msg).await.unwrap();
    assert!(matches!(
        outcome,
        ConsumerOutcome::Handled(WorkerOutcome::StaleResult)
    ));
    assert_eq!(consumer.results_handled(), 2);
}

// ── Hook failure isolation ────────────────────────────────────────────────

struct FailingHook;

#[async_trait]
impl TransitionHook for FailingHook {
    async fn on_transition(
        &self,
        _change: &StateChange,
        _result: &CheckResult,
    ) -> Result<(), WorkerError> {
        Err(WorkerError::Archive(ArchiveError::Backend(
            "snapshot write refused".to_string(),
        )))
    }
}

#[tokio::test]
async fn hook_failure_does_not_fail_the_message() {
    let store = Arc::new(MemoryStore::new());
    let archive = Arc::new(MemoryArchive::new());
    store.put_check(check()).await.unwrap();
    let consumer = Consumer::new(Arc::clone(&store), archive, FailingHook);

    // A failing result changes state, which invokes the failing hook.
    let outcome = consumer
        .handle_message(&payload(&result(CUSTOMER_ID, CHECK_ID, false)))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ConsumerOutcome::Handled(WorkerOutcome::Completed(_))
    ));
}
