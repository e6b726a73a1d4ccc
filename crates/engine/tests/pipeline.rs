//! End-to-end run of the message pipeline against the in-memory backends:
//! consumer decode, worker transaction, latest-result archival, snapshot
//! archival, and alerting, across a full failure-and-recovery cycle.

use std::sync::Arc;

use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use vigil_archive::{MemoryArchive, ResultArchive};
use vigil_core::{Check, CheckResponse, CheckResult, StateId};
use vigil_engine::{
    get_live_check_results, ChannelAlertSink, Consumer, ConsumerOutcome, SnapshotAlertHook,
    WorkerOutcome,
};
use vigil_storage::{CheckStore, MemoryStore};

const CUSTOMER_ID: &str = "cust-1";
const CHECK_ID: &str = "check-1";

fn t0() -> OffsetDateTime {
    datetime!(2025-01-01 00:00:00 UTC)
}

fn message(bastion_id: &str, at: OffsetDateTime, passing: bool) -> Vec<u8> {
    let result = CheckResult {
        customer_id: CUSTOMER_ID.to_string(),
        check_id: CHECK_ID.to_string(),
        bastion_id: bastion_id.to_string(),
        timestamp: at,
        passing,
        responses: vec![CheckResponse {
            passing,
            error: if passing {
                None
            } else {
                Some("connection refused".to_string())
            },
        }],
    };
    serde_json::to_vec(&result).unwrap()
}

#[tokio::test]
async fn failure_and_recovery_cycle_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let archive = Arc::new(MemoryArchive::new());
    store
        .put_check(Check {
            id: CHECK_ID.to_string(),
            customer_id: CUSTOMER_ID.to_string(),
            name: "api health".to_string(),
            min_failing_count: 1,
            min_failing_time: 90,
            deleted: false,
        })
        .await
        .unwrap();

    let (sink, mut alerts) = ChannelAlertSink::new();
    let hook = SnapshotAlertHook::new(Arc::clone(&store), Arc::clone(&archive), sink);
    let consumer = Consumer::new(Arc::clone(&store), Arc::clone(&archive), hook);

    // Failure observed: OK -> FAIL_WAIT, no alert yet.
    let outcome = consumer
        .handle_message(&message("bastion-a", t0(), false))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ConsumerOutcome::Handled(WorkerOutcome::Completed(_))
    ));
    assert!(alerts.try_recv().is_err());

    // Still failing at the confirmation boundary: FAIL_WAIT -> FAIL, alert.
    consumer
        .handle_message(&message("bastion-a", t0() + Duration::seconds(90), false))
        .await
        .unwrap();
    let alert = alerts.try_recv().unwrap();
    assert_eq!(alert.state, StateId::Fail);
    assert_eq!(alert.check_id, CHECK_ID);
    assert!(!alert.result.passing);

    // Recovery observed: FAIL -> PASS_WAIT, no alert.
    consumer
        .handle_message(&message("bastion-a", t0() + Duration::seconds(120), true))
        .await
        .unwrap();
    assert!(alerts.try_recv().is_err());

    // Recovery confirmed: PASS_WAIT -> OK, alert.
    consumer
        .handle_message(&message("bastion-a", t0() + Duration::seconds(211), true))
        .await
        .unwrap();
    let alert = alerts.try_recv().unwrap();
    assert_eq!(alert.state, StateId::Ok);
    assert!(alert.result.passing);

    // The committed state is OK and the full transition path is logged.
    let state = store.get_state(CUSTOMER_ID, CHECK_ID).await.unwrap().unwrap();
    assert_eq!(state.id, StateId::Ok);
    // Log entries are stamped with wall-clock insertion time.
    let now = OffsetDateTime::now_utc();
    let entries = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, now - Duration::days(1), now + Duration::days(1))
        .await
        .unwrap();
    let path = entries
        .iter()
        .map(|e| (e.from_state, e.to_state))
        .collect::<Vec<_>>();
    assert_eq!(
        path,
        vec![
            (StateId::Ok, StateId::FailWait),
            (StateId::FailWait, StateId::Fail),
            (StateId::Fail, StateId::PassWait),
            (StateId::PassWait, StateId::Ok),
        ]
    );

    // Each transition left a snapshot keyed by its log entry id, with the
    // state it landed in.
    let fail_entry = entries
        .iter()
        .find(|e| e.to_state == StateId::Fail)
        .unwrap();
    let snapshot = archive
        .get_check_snapshot(fail_entry.id, CHECK_ID)
        .await
        .unwrap();
    assert_eq!(snapshot.state, "FAIL");
    assert_eq!(snapshot.results.len(), 1);
    assert!(!snapshot.results[0].passing);

    // The archive holds the newest raw result and the read path serves it.
    let live = get_live_check_results(store.as_ref(), Arc::clone(&archive), CUSTOMER_ID, CHECK_ID)
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].timestamp, t0() + Duration::seconds(211));

    assert_eq!(consumer.results_handled(), 4);
}
