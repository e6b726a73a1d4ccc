use std::future::Future;

use time::Duration;

use super::{base_time, commit_memos, make_memo, store_with_check, TestResult, CHECK_ID};
use crate::CheckStore;

pub(super) async fn run_memo_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "memo",
        "get_memo_missing_returns_none",
        get_memo_missing_returns_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "put_memo_visible_after_commit",
        put_memo_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "pending_memo_invisible_to_concurrent_snapshot",
        pending_memo_invisible_to_concurrent_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "aborted_memo_write_is_discarded",
        aborted_memo_write_is_discarded(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "put_memo_overwrites_existing_for_same_bastion",
        put_memo_overwrites_existing_for_same_bastion(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "memos_are_keyed_per_bastion",
        memos_are_keyed_per_bastion(factory).await,
    ));
    results.push(TestResult::from_result(
        "memo",
        "get_memo_sees_pending_write_in_same_snapshot",
        get_memo_sees_pending_write_in_same_snapshot(factory).await,
    ));

    results
}

async fn get_memo_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let memo = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| format!("get_memo failed: {e}"))?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;
    if memo.is_some() {
        return Err("expected None for a never-reported bastion".to_string());
    }
    Ok(())
}

async fn put_memo_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let written = make_memo("bastion-a", 1, 2, base_time());
    commit_memos(&store, vec![written.clone()]).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let memo = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match memo {
        Some(found) if found == written => Ok(()),
        Some(found) => Err(format!("memo mismatch: {found:?}")),
        None => Err("committed memo not found".to_string()),
    }
}

async fn pending_memo_invisible_to_concurrent_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut writer = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    store
        .put_memo(&mut writer, make_memo("bastion-a", 1, 2, base_time()))
        .await
        .map_err(|e| e.to_string())?;

    let mut reader = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let seen = store
        .get_memo(&mut reader, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(reader)
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(writer)
        .await
        .map_err(|e| e.to_string())?;

    if seen.is_some() {
        return Err("uncommitted memo write leaked to a concurrent snapshot".to_string());
    }
    Ok(())
}

async fn aborted_memo_write_is_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let memo = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    if memo.is_some() {
        return Err("aborted memo write survived".to_string());
    }
    Ok(())
}

async fn put_memo_overwrites_existing_for_same_bastion<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(&store, vec![make_memo("bastion-a", 1, 2, base_time())]).await?;
    let updated = make_memo("bastion-a", 0, 3, base_time() + Duration::seconds(30));
    commit_memos(&store, vec![updated.clone()]).await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let memo = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match memo {
        Some(found) if found == updated => Ok(()),
        other => Err(format!("expected the overwritten memo, got {other:?}")),
    }
}

async fn memos_are_keyed_per_bastion<S, F, Fut>(factory: &F) -> Result<(), String>
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
        ],
    )
    .await?;

    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let a = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    let b = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-b")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match (a, b) {
        (Some(a), Some(b)) if a.failing_count == 1 && b.failing_count == 0 => Ok(()),
        other => Err(format!("memos collided across bastions: {other:?}")),
    }
}

async fn get_memo_sees_pending_write_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let mut snapshot = store.begin_snapshot().await.map_err(|e| e.to_string())?;
    let written = make_memo("bastion-a", 2, 4, base_time());
    store
        .put_memo(&mut snapshot, written.clone())
        .await
        .map_err(|e| e.to_string())?;
    let seen = store
        .get_memo(&mut snapshot, CHECK_ID, "bastion-a")
        .await
        .map_err(|e| e.to_string())?;
    store
        .abort_snapshot(snapshot)
        .await
        .map_err(|e| e.to_string())?;

    match seen {
        Some(found) if found == written => Ok(()),
        other => Err(format!(
            "snapshot did not read its own memo write: {other:?}"
        )),
    }
}
