use std::future::Future;

use time::Duration;

use super::{base_time, commit_memos, make_memo, store_with_check, TestResult, CHECK_ID, CUSTOMER_ID};
use crate::CheckStore;

pub(super) async fn run_liveness_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "liveness",
        "no_memos_yields_empty_set",
        no_memos_yields_empty_set(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "single_memo_is_live",
        single_memo_is_live(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "window_is_anchored_at_newest_memo_not_wall_clock",
        window_is_anchored_at_newest_memo_not_wall_clock(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "boundary_at_exactly_the_window_is_live",
        boundary_at_exactly_the_window_is_live(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "memo_beyond_window_is_excluded",
        memo_beyond_window_is_excluded(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "bastions_ordered_newest_first",
        bastions_ordered_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "liveness",
        "memos_105_seconds_apart_are_both_live",
        memos_105_seconds_apart_are_both_live(factory).await,
    ));

    results
}

async fn live<S: CheckStore>(store: &S) -> Result<Vec<String>, String> {
    store
        .get_live_bastions(CUSTOMER_ID, CHECK_ID)
        .await
        .map_err(|e| format!("get_live_bastions failed: {e}"))
}

async fn no_memos_yields_empty_set<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    let bastions = live(&store).await?;
    if !bastions.is_empty() {
        return Err(format!("expected no live bastions, got {bastions:?}"));
    }
    Ok(())
}

async fn single_memo_is_live<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(&store, vec![make_memo("bastion-a", 0, 2, base_time())]).await?;
    let bastions = live(&store).await?;
    if bastions != vec!["bastion-a".to_string()] {
        return Err(format!("expected [bastion-a], got {bastions:?}"));
    }
    Ok(())
}

async fn window_is_anchored_at_newest_memo_not_wall_clock<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    // base_time() is far in the past relative to wall clock. Anchoring at
    // "now" would evict everything; anchoring at the newest memo keeps
    // both bastions live.
    commit_memos(
        &store,
        vec![
            make_memo("bastion-a", 0, 2, base_time()),
            make_memo("bastion-b", 0, 2, base_time() + Duration::seconds(60)),
        ],
    )
    .await?;
    let bastions = live(&store).await?;
    if bastions.len() != 2 {
        return Err(format!(
            "bastions evicted against wall clock: {bastions:?}"
        ));
    }
    Ok(())
}

async fn boundary_at_exactly_the_window_is_live<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(
        &store,
        vec![
            make_memo("bastion-old", 0, 2, base_time()),
            make_memo("bastion-new", 0, 2, base_time() + Duration::seconds(120)),
        ],
    )
    .await?;
    let bastions = live(&store).await?;
    if bastions.len() != 2 {
        return Err(format!(
            "trailing by exactly the window must be live (inclusive boundary), got {bastions:?}"
        ));
    }
    Ok(())
}

async fn memo_beyond_window_is_excluded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(
        &store,
        vec![
            make_memo("bastion-old", 0, 2, base_time()),
            make_memo("bastion-new", 0, 2, base_time() + Duration::seconds(121)),
        ],
    )
    .await?;
    let bastions = live(&store).await?;
    if bastions != vec!["bastion-new".to_string()] {
        return Err(format!("expected only bastion-new, got {bastions:?}"));
    }
    Ok(())
}

async fn bastions_ordered_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(
        &store,
        vec![
            make_memo("bastion-a", 0, 2, base_time() + Duration::seconds(10)),
            make_memo("bastion-b", 0, 2, base_time() + Duration::seconds(30)),
            make_memo("bastion-c", 0, 2, base_time() + Duration::seconds(20)),
        ],
    )
    .await?;
    let bastions = live(&store).await?;
    let expected = vec![
        "bastion-b".to_string(),
        "bastion-c".to_string(),
        "bastion-a".to_string(),
    ];
    if bastions != expected {
        return Err(format!("expected {expected:?}, got {bastions:?}"));
    }
    Ok(())
}

async fn memos_105_seconds_apart_are_both_live<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CheckStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = store_with_check(factory).await?;
    commit_memos(
        &store,
        vec![
            make_memo("bastion-a", 0, 2, base_time() + Duration::seconds(100)),
            make_memo("bastion-b", 0, 2, base_time() + Duration::seconds(205)),
        ],
    )
    .await?;
    let bastions = live(&store).await?;
    if bastions.len() != 2 {
        return Err(format!(
            "105s of trail is inside the 120s window, got {bastions:?}"
        ));
    }
    Ok(())
}
