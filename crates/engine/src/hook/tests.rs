use std::sync::Arc;

use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use vigil_archive::{MemoryArchive, ResultArchive};
use vigil_core::{Check, CheckResponse, CheckResult, StateId};
use vigil_storage::{CheckStore, MemoryStore, ResultMemo, StateTransitionLogEntry};

use super::{AlertPayload, ChannelAlertSink, SnapshotAlertHook, TransitionHook};
use crate::worker::StateChange;

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

fn result(bastion_id: &str, at: OffsetDateTime, passing: bool) -> CheckResult {
    CheckResult {
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
    }
}

fn change(from: StateId, to: StateId, transition_id: i64) -> StateChange {
    StateChange {
        customer_id: CUSTOMER_ID.to_string(),
        check_id: CHECK_ID.to_string(),
        from,
        to,
        failing_count: 1,
        response_count: 2,
        transition: Some(StateTransitionLogEntry {
            id: transition_id,
            check_id: CHECK_ID.to_string(),
            customer_id: CUSTOMER_ID.to_string(),
            from_state: from,
            to_state: to,
            created_at: t0(),
        }),
    }
}

/// Seed the store with a check plus one committed memo and one archived
/// result per entry.
async fn fixture(
    results: &[CheckResult],
) -> (Arc<MemoryStore>, Arc<MemoryArchive>) {
    let store = Arc::new(MemoryStore::new());
    let archive = Arc::new(MemoryArchive::new());
    store.put_check(check()).await.unwrap();

    let mut snapshot = store.begin_snapshot().await.unwrap();
    for r in results {
        store
            .put_memo(&mut snapshot, ResultMemo::from_result(r))
            .await
            .unwrap();
        archive.put_result(r).await.unwrap();
    }
    store.commit_snapshot(snapshot).await.unwrap();
    (store, archive)
}

fn hook(
    store: &Arc<MemoryStore>,
    archive: &Arc<MemoryArchive>,
) -> (
    SnapshotAlertHook<MemoryStore, MemoryArchive, ChannelAlertSink>,
    tokio::sync::mpsc::UnboundedReceiver<AlertPayload>,
) {
    let (sink, rx) = ChannelAlertSink::new();
    (
        SnapshotAlertHook::new(Arc::clone(store), Arc::clone(archive), sink),
        rx,
    )
}

#[tokio::test]
async fn archives_snapshot_keyed_by_transition_id() {
    let failing = result("bastion-a", t0(), false);
    let passing = result("bastion-b", t0() + Duration::seconds(10), true);
    let (store, archive) = fixture(&[failing.clone(), passing]).await;
    let (hook, _rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::FailWait, StateId::Fail, 7), &failing)
        .await
        .unwrap();

    let snapshot = archive.get_check_snapshot(7, CHECK_ID).await.unwrap();
    assert_eq!(snapshot.state, "FAIL");
    assert_eq!(snapshot.check.id, CHECK_ID);
    assert_eq!(snapshot.failing_count, 1);
    assert_eq!(snapshot.results.len(), 2);
}

#[tokio::test]
async fn failure_alert_carries_a_failing_result() {
    let failing = result("bastion-a", t0(), false);
    let passing = result("bastion-b", t0() + Duration::seconds(10), true);
    let (store, archive) = fixture(&[failing.clone(), passing]).await;
    let (hook, mut rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::FailWait, StateId::Fail, 1), &failing)
        .await
        .unwrap();

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.state, StateId::Fail);
    assert_eq!(alert.check_name, "api health");
    assert!(!alert.result.passing);
    assert_eq!(alert.result.bastion_id, "bastion-a");
}

#[tokio::test]
async fn recovery_alert_carries_a_passing_result() {
    let recovered = result("bastion-a", t0(), true);
    let (store, archive) = fixture(&[recovered.clone()]).await;
    let (hook, mut rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::PassWait, StateId::Ok, 2), &recovered)
        .await
        .unwrap();

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.state, StateId::Ok);
    assert!(alert.result.passing);
}

#[tokio::test]
async fn pass_wait_to_warn_also_alerts() {
    let recovered = result("bastion-a", t0(), true);
    let (store, archive) = fixture(&[recovered.clone()]).await;
    let (hook, mut rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::PassWait, StateId::Warn, 3), &recovered)
        .await
        .unwrap();

    assert_eq!(rx.try_recv().unwrap().state, StateId::Warn);
}

#[tokio::test]
async fn observation_transitions_snapshot_but_do_not_alert() {
    let failing = result("bastion-a", t0(), false);
    let (store, archive) = fixture(&[failing.clone()]).await;
    let (hook, mut rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::Ok, StateId::FailWait, 4), &failing)
        .await
        .unwrap();

    assert!(archive.get_check_snapshot(4, CHECK_ID).await.is_ok());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn in_hand_result_supersedes_the_archived_one() {
    // The archive still holds bastion-a's older passing result.
    let archived = result("bastion-a", t0(), true);
    let (store, archive) = fixture(&[archived]).await;
    let (hook, mut rx) = hook(&store, &archive);

    let in_hand = result("bastion-a", t0() + Duration::seconds(30), false);
    hook.on_transition(&change(StateId::FailWait, StateId::Fail, 5), &in_hand)
        .await
        .unwrap();

    let snapshot = archive.get_check_snapshot(5, CHECK_ID).await.unwrap();
    assert_eq!(snapshot.results.len(), 1);
    assert!(!snapshot.results[0].passing);

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.result.timestamp, in_hand.timestamp);
}

#[tokio::test]
async fn missing_alert_candidate_is_not_an_error() {
    // Confirmed FAIL but every gathered result passes: nothing to cite.
    let passing = result("bastion-a", t0(), true);
    let (store, archive) = fixture(&[passing.clone()]).await;
    let (hook, mut rx) = hook(&store, &archive);

    hook.on_transition(&change(StateId::FailWait, StateId::Fail, 6), &passing)
        .await
        .unwrap();

    assert!(rx.try_recv().is_err());
}
