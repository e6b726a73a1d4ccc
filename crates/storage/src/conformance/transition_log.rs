use std::future::Future;

use time::{Duration, OffsetDateTime};

use vigil_core::StateId;

use super::{store_with_check, TestResult, CHECK_ID, CUSTOMER_ID};
use crate::CheckStore;

pub(super) async fn run_transition_log_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "transition_log",
        "create_returns_identity_and_timestamp",
        create_returns_identity_and_timestamp(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition_log",
        "ids_strictly_increase",
        ids_strictly_increase(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition_log",
        "entry_visible_only_after_commit",
        entry_visible_only_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition_log",
        "aborted_entry_never_appears",
        aborted_entry_never_appears(factory).await,
    ));
    results.push(TestResult::from_result(
        "transition_log",
        "list_filters_by_check_and_time_window",
        list_filters_by_check_and_time_window(factory).await,
    ));

    results
}

fn all_time() -> (OffsetDateTime, OffsetDateTime) {
    let now = OffsetDateTime::now_utc();
    (now - Duration::days(1), now + Duration::days(1))
}

async fn create_returns_identity_and_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let before = OffsetDateTime::now_utc();
    let entry = store
        .create_state_transition_log_entry(
            &mut snapshot,
            CHECK_ID,
            CUSTOMER_ID,
            StateId::Ok,
            StateId::FailWait,
        )
        .await
        .map_err(|e| e.to_string())?;
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if entry.from_state != StateId::Ok || entry.to_state != StateId::FailWait {
        return Err(format!("entry states wrong: {entry:?}"));
    }
    if entry.check_id != CHECK_ID || entry.customer_id != CUSTOMER_ID {
        return Err(format!("entry identity wrong: {entry:?}"));
    }
    if entry.created_at < before - Duration::seconds(5) {
        return Err(format!("created_at not set at insert time: {entry:?}"));
    }
    Ok(())
}

async fn ids_strictly_increase<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut previous = None;
    for (from, to) in [
        (StateId::Ok, StateId::FailWait),
        (StateId::FailWait, StateId::Fail),
        (StateId::Fail, StateId::PassWait),
    ] {
        let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
        let entry = store
            .create_state_transition_log_entry(&mut snapshot, CHECK_ID, CUSTOMER_ID, from, to)
            .await
            .map_err(|e| e.to_string())?;
        store
            .commit_snapshot(snapshot)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(prev) = previous {
            if entry.id <= prev {
                return Err(format!("id {} did not increase past {}", entry.id, prev));
            }
        }
        previous = Some(entry.id);
    }
    Ok(())
}

async fn entry_visible_only_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let (from, to) = all_time();

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .create_state_transition_log_entry(
            &mut snapshot,
            CHECK_ID,
            CUSTOMER_ID,
            StateId::Ok,
            StateId::FailWait,
        )
        .await
        .map_err(|e| e.to_string())?;

    let pending = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, from, to)
        .await
        .map_err(|e| e.to_string())?;
    if !pending.is_empty() {
        return Err("uncommitted log entry visible to readers".to_string());
    }

    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let committed = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, from, to)
        .await
        .map_err(|e| e.to_string())?;
    if committed.len() != 1 {
        return Err(format!("expected 1 entry after commit, got {committed:?}"));
    }
    Ok(())
}

async fn aborted_entry_never_appears<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let (from, to) = all_time();

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .create_state_transition_log_entry(
            &mut snapshot,
            CHECK_ID,
            CUSTOMER_ID,
            StateId::Ok,
            StateId::FailWait,
        )
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let entries = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, from, to)
        .await
        .map_err(|e| e.to_string())?;
    if !entries.is_empty() {
        return Err(format!("aborted entry survived: {entries:?}"));
    }
    Ok(())
}

async fn list_filters_by_check_and_time_window<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .create_state_transition_log_entry(
            &mut snapshot,
            CHECK_ID,
            CUSTOMER_ID,
            StateId::Ok,
            StateId::FailWait,
        )
        .await
        .map_err(|e| e.to_string())?;
    store
        .create_state_transition_log_entry(
            &mut snapshot,
            "other-check",
            CUSTOMER_ID,
            StateId::Ok,
            StateId::FailWait,
        )
        .await
        .map_err(|e| e.to_string())?;
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let (from, to) = all_time();
    let entries = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, from, to)
        .await
        .map_err(|e| e.to_string())?;
    if entries.len() != 1 || entries[0].check_id != CHECK_ID {
        return Err(format!("check filter leaked entries: {entries:?}"));
    }

    // A window in the past excludes everything.
    let past = store
        .get_transition_log_entries(
            CHECK_ID,
            CUSTOMER_ID,
            from - Duration::days(30),
            from - Duration::days(29),
        )
        .await
        .map_err(|e| e.to_string())?;
    if !past.is_empty() {
        return Err(format!("time window filter leaked entries: {past:?}"));
    }
    Ok(())
}
