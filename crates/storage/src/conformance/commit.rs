use std::future::Future;

use time::{Duration, OffsetDateTime};

use vigil_core::StateId;

use super::{base_time, make_memo, store_with_check, TestResult, CHECK_ID, CUSTOMER_ID};
use crate::CheckStore;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "commit_applies_memo_state_and_log_atomically",
        commit_applies_memo_state_and_log_atomically(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "abort_discards_all_writes",
        abort_discards_all_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "sequential_snapshots_compose",
        sequential_snapshots_compose(factory).await,
    ));

    results
}

async fn commit_applies_memo_state_and_log_atomically<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .put_memo(&mut snapshot, make_memo("bastion-a", 1, 2, base_time()))
        .await
        .map_err(|e| e.to_string())?;
    let mut state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .update_state(&mut snapshot, &mut state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .put_state(&mut snapshot, &state)
        .await
        .map_err(|e| e.to_string())?;
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

    // Nothing is visible before commit.
    if store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("state visible before commit".to_string());
    }

    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    // Everything is visible after commit.
    let state = store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("state missing after commit")?;
    if state.failing_count != 1 {
        return Err(format!("state counts not committed: {state:?}"));
    }
    let bastions = store
        .get_live_bastions(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    if bastions.len() != 1 {
        return Err("memo not committed".to_string());
    }
    let now = OffsetDateTime::now_utc();
    let entries = store
        .get_transition_log_entries(CHECK_ID, CUSTOMER_ID, now - Duration::days(1), now)
        .await
        .map_err(|e| e.to_string())?;
    if entries.len() != 1 {
        return Err("log entry not committed".to_string());
    }
    Ok(())
}

async fn abort_discards_all_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .put_memo(&mut snapshot, make_memo("bastion-a", 1, 2, base_time()))
        .await
        .map_err(|e| e.to_string())?;
    let state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .put_state(&mut snapshot, &state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("state survived abort".to_string());
    }
    if !store
        .get_live_bastions(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .is_empty()
    {
        return Err("memo survived abort".to_string());
    }
    Ok(())
}

async fn sequential_snapshots_compose<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    for (bastion, at) in [
        ("bastion-a", base_time()),
        ("bastion-b", base_time() + Duration::seconds(10)),
    ] {
        let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
        store
            .put_memo(&mut snapshot, make_memo(bastion, 1, 2, at))
            .await
            .map_err(|e| e.to_string())?;
        store
            .commit_snapshot(snapshot)
            .await
            .map_err(|e| e.to_string())?;
    }

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .update_state(&mut snapshot, &mut state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if state.failing_count != 2 || state.response_count != 4 {
        return Err(format!(
            "expected aggregate (2, 4) across two committed snapshots, got ({}, {})",
            state.failing_count, state.response_count
        ));
    }
    Ok(())
}
