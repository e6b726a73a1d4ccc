//! Inbound queue-message handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use vigil_archive::ResultArchive;
use vigil_core::CheckResult;
use vigil_storage::CheckStore;

use crate::error::WorkerError;
use crate::hook::TransitionHook;
use crate::worker::{CheckWorker, WorkerOutcome};

/// What handling one message amounted to.
#[derive(Debug)]
pub enum ConsumerOutcome {
    /// The payload decoded and the worker ran; see the inner outcome.
    Handled(WorkerOutcome),
    /// The payload was missing a required identifier and was dropped.
    Discarded,
}

/// Decodes raw queue payloads and drives them through the worker, the
/// result archive, and the transition hook.
///
/// Post-commit side effects never fail the message: the state change is
/// already durable, and redelivery would be dropped as stale anyway, so
/// archive and hook failures are logged and swallowed.
pub struct Consumer<S, A, H> {
    worker: CheckWorker<S>,
    archive: Arc<A>,
    hook: H,
    results_handled: AtomicU64,
}

impl<S, A, H> Consumer<S, A, H>
where
    S: CheckStore,
    A: ResultArchive,
    H: TransitionHook,
{
    pub fn new(store: Arc<S>, archive: Arc<A>, hook: H) -> Consumer<S, A, H> {
        Consumer {
            worker: CheckWorker::new(store),
            archive,
            hook,
            results_handled: AtomicU64::new(0),
        }
    }

    /// How many messages decoded and ran through the worker so far.
    pub fn results_handled(&self) -> u64 {
        self.results_handled.load(Ordering::Relaxed)
    }

    /// Handle one serialized result.
    ///
    /// Returns an error only for conditions the queue should act on:
    /// an undecodable payload or a store failure. Stale results, deleted
    /// checks, and empty identifiers are all quiet outcomes.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<ConsumerOutcome, WorkerError> {
        let result: CheckResult =
            serde_json::from_slice(payload).map_err(|e| WorkerError::Decode(e.to_string()))?;

        if result.customer_id.is_empty() || result.check_id.is_empty() {
            warn!(
                customer_id = %result.customer_id,
                check_id = %result.check_id,
                "discarding result with missing identifiers"
            );
            return Ok(ConsumerOutcome::Discarded);
        }

        let outcome = self.worker.execute(&result).await?;
        self.results_handled.fetch_add(1, Ordering::Relaxed);

        if let WorkerOutcome::Completed(change) = &outcome {
            // The change is committed; from here on nothing can fail the
            // message.
            if let Err(e) = self.archive.put_result(&result).await {
                warn!(check_id = %result.check_id, error = %e, "latest-result archival failed");
            }
            if change.transition.is_some() {
                debug!(
                    check_id = %change.check_id,
                    from = %change.from,
                    to = %change.to,
                    "state changed"
                );
                if let Err(e) = self.hook.on_transition(change, &result).await {
                    warn!(check_id = %change.check_id, error = %e, "transition hook failed");
                }
            }
        }

        Ok(ConsumerOutcome::Handled(outcome))
    }
}

#[cfg(test)]
mod tests;
