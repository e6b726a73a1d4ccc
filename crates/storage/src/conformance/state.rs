use std::future::Future;

use time::Duration;

use vigil_core::StateId;

use super::{
    base_time, commit_memos, make_check, make_memo, store_with_check, TestResult, CHECK_ID,
    CUSTOMER_ID,
};
use crate::{CheckStore, StorageError};

pub(super) async fn run_state_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "state",
        "missing_check_returns_check_not_found",
        missing_check_returns_check_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "deleted_check_returns_check_not_found",
        deleted_check_returns_check_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "absent_state_row_synthesizes_default_ok",
        absent_state_row_synthesizes_default_ok(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "threshold_conversion_is_applied_once_per_read",
        threshold_conversion_is_applied_once_per_read(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "put_state_materializes_then_updates",
        put_state_materializes_then_updates(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "update_state_sums_all_memos",
        update_state_sums_all_memos(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "update_state_without_memos_is_zero",
        update_state_without_memos_is_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "update_state_observes_pending_memo_write",
        update_state_observes_pending_memo_write(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "lock_blocks_concurrent_locker_until_commit",
        lock_blocks_concurrent_locker_until_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "state",
        "lock_released_on_abort",
        lock_released_on_abort(factory).await,
    ));

    results
}

async fn missing_check_returns_check_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, "no-such-check")
        .await;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::CheckNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected CheckNotFound, got: {other}")),
        Ok(state) => Err(format!("expected CheckNotFound, got state: {state:?}")),
    }
}

async fn deleted_check_returns_check_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    store
        .delete_check(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::CheckNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected CheckNotFound, got: {other}")),
        Ok(state) => Err(format!(
            "soft-deleted check still produced state: {state:?}"
        )),
    }
}

async fn absent_state_row_synthesizes_default_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if state.id != StateId::Ok {
        return Err(format!("default state is {}, expected OK", state.id));
    }
    if state.failing_count != 0 || state.response_count != 0 {
        return Err("default state should have zero counts".to_string());
    }
    if state.min_failing_count != 1 || state.min_failing_time != Duration::seconds(90) {
        return Err(format!(
            "thresholds not copied from check: count={} time={}",
            state.min_failing_count, state.min_failing_time
        ));
    }
    // The default is synthesized, not persisted.
    let persisted = store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    if persisted.is_some() {
        return Err("default state was persisted by a read".to_string());
    }
    Ok(())
}

async fn threshold_conversion_is_applied_once_per_read<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    // Materialize a state row, then read it back twice. The seconds ->
    // duration conversion must not compound across reads.
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .put_state(&mut snapshot, &state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    for _ in 0..2 {
        let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
        let state = store
            .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
            .await
            .map_err(|e| e.to_string())?;
        store
            .abort_snapshot(snapshot)
            .await
            .map_err(|e| e.to_string())?;
        if state.min_failing_time != Duration::seconds(90) {
            return Err(format!(
                "threshold duration drifted to {}",
                state.min_failing_time
            ));
        }
    }
    Ok(())
}

async fn put_state_materializes_then_updates<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .put_state(&mut snapshot, &state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let first = store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("state row not materialized by put_state")?;
    if first.id != StateId::Ok {
        return Err(format!("materialized state is {}", first.id));
    }

    // Second put_state overwrites the same row, no duplicate key error.
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    state.failing_count = 3;
    state.response_count = 4;
    store
        .put_state(&mut snapshot, &state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .commit_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let second = store
        .get_state(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("state row vanished after update")?;
    if second.failing_count != 3 || second.response_count != 4 {
        return Err(format!("upsert did not overwrite counts: {second:?}"));
    }
    Ok(())
}

async fn update_state_sums_all_memos<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(
        &store,
        vec![
            make_memo("bastion-a", 1, 2, base_time()),
            make_memo("bastion-b", 0, 2, base_time()),
            make_memo("bastion-c", 4, 5, base_time()),
        ],
    )
    .await?;

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

    if state.failing_count != 5 || state.response_count != 9 {
        return Err(format!(
            "expected (failing=5, responses=9), got ({}, {})",
            state.failing_count, state.response_count
        ));
    }
    Ok(())
}

async fn update_state_without_memos_is_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut state = store
        .get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    state.failing_count = 42;
    state.response_count = 42;
    store
        .update_state(&mut snapshot, &mut state)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if state.failing_count != 0 || state.response_count != 0 {
        return Err(format!(
            "empty memo set should aggregate to zero, got ({}, {})",
            state.failing_count, state.response_count
        ));
    }
    Ok(())
}

async fn update_state_observes_pending_memo_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(&store, vec![make_memo("bastion-a", 1, 2, base_time())]).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    // Overwrite bastion-a inside the snapshot; the sum must use the
    // pending write, not double-count it against the committed row.
    store
        .put_memo(
            &mut snapshot,
            make_memo("bastion-a", 0, 2, base_time() + Duration::seconds(30)),
        )
        .await
        .map_err(|e| e.to_string())?;
    store
        .put_memo(
            &mut snapshot,
            make_memo("bastion-b", 2, 2, base_time() + Duration::seconds(30)),
        )
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
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if state.failing_count != 2 || state.response_count != 4 {
        return Err(format!(
            "expected (failing=2, responses=4) from overlaid memos, got ({}, {})",
            state.failing_count, state.response_count
        ));
    }
    Ok(())
}

async fn lock_blocks_concurrent_locker_until_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut holder = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .get_and_lock_state(&mut holder, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;

    // A second locker must block (not fail) while the first snapshot holds
    // the lock.
    let mut contender = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let blocked = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        store.get_and_lock_state(&mut contender, CUSTOMER_ID, CHECK_ID),
    )
    .await;
    if blocked.is_ok() {
        return Err("second locker acquired the state lock while it was held".to_string());
    }
    store
        .abort_snapshot(contender)
        .await
        .map_err(|e| e.to_string())?;

    store
        .commit_snapshot(holder)
        .await
        .map_err(|e| e.to_string())?;

    // After commit the lock is free again.
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    tokio::time::timeout(
        std::time::Duration::from_millis(50),
        store.get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID),
    )
    .await
    .map_err(|_| "lock not released by commit".to_string())?
    .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn lock_released_on_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;

    let mut holder = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .get_and_lock_state(&mut holder, CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(holder)
        .await
        .map_err(|e| e.to_string())?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    tokio::time::timeout(
        std::time::Duration::from_millis(50),
        store.get_and_lock_state(&mut snapshot, CUSTOMER_ID, CHECK_ID),
    )
    .await
    .map_err(|_| "lock not released by abort".to_string())?
    .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
