//! Live-results read path.

use std::sync::Arc;

use tokio::task::JoinSet;

use vigil_archive::ResultArchive;
use vigil_core::CheckResult;
use vigil_storage::CheckStore;

use crate::error::WorkerError;

/// Fetch the latest archived result from every live bastion of a check.
///
/// Fans out one concurrent fetch per bastion and joins them all; a single
/// fetch failure fails the whole read. Results come back in the store's
/// live-bastion order (newest reporter first), independent of fetch
/// completion order.
pub async fn get_live_check_results<S, A>(
    store: &S,
    archive: Arc<A>,
    customer_id: &str,
    check_id: &str,
) -> Result<Vec<CheckResult>, WorkerError>
where
    S: CheckStore,
    A: ResultArchive,
{
    let bastions = store.get_live_bastions(customer_id, check_id).await?;
    if bastions.is_empty() {
        return Ok(Vec::new());
    }

    let mut tasks = JoinSet::new();
    for (index, bastion_id) in bastions.into_iter().enumerate() {
        let archive = Arc::clone(&archive);
        let check_id = check_id.to_string();
        tasks.spawn(async move {
            let result = archive.get_result_by_check_id(&bastion_id, &check_id).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<CheckResult>> = vec![None; tasks.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, fetched) = joined.map_err(|e| WorkerError::Join(e.to_string()))?;
        slots[index] = Some(fetched?);
    }

    // Every slot was filled by exactly one task.
    Ok(slots.into_iter().flatten().collect())
}
