//! Transactional check worker.
//!
//! Drives one check result end-to-end through the backing store using
//! snapshot (transaction) semantics: memo upsert, staleness guard,
//! aggregate recomputation, state-machine transition, and transition log
//! append all happen in a single snapshot -- either everything commits or
//! the snapshot is aborted and the store is untouched.

use std::sync::Arc;

use tracing::debug;

use vigil_core::{CheckResult, StateId};
use vigil_storage::{CheckStore, ResultMemo, StateTransitionLogEntry, StorageError};

use crate::error::WorkerError;

// ──────────────────────────────────────────────
// Outcomes
// ──────────────────────────────────────────────

/// What executing one result amounted to.
///
/// The two no-op variants are expected steady-state conditions under
/// at-least-once delivery and check deletion races; the caller must not
/// requeue or error on them.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The result was at or before the bastion's last-seen timestamp and
    /// was dropped without touching the store.
    StaleResult,
    /// The check is missing or soft-deleted; nothing was persisted.
    CheckNotFound,
    /// The result was applied and the snapshot committed.
    Completed(StateChange),
}

/// Everything a post-commit collaborator needs to react to one applied
/// result: the state ids on both sides of the transition and the counts
/// that produced them.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub customer_id: String,
    pub check_id: String,
    pub from: StateId,
    pub to: StateId,
    pub failing_count: i32,
    pub response_count: i32,
    /// The log entry appended for this change, present only when the
    /// discrete state actually changed (`from != to`).
    pub transition: Option<StateTransitionLogEntry>,
}

impl StateChange {
    /// Whether the discrete state changed at all.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Outcome of the in-snapshot steps, before commit/abort is decided.
enum Step {
    Commit(StateChange),
    Discard(WorkerOutcome),
}

// ──────────────────────────────────────────────
// Worker
// ──────────────────────────────────────────────

/// Executes one result at a time against a [`CheckStore`].
///
/// Workers are cheap to clone and safe to drive concurrently; per-check
/// serialization comes from the store's exclusive state lock, not from
/// the worker itself.
pub struct CheckWorker<S> {
    store: Arc<S>,
}

impl<S> Clone for CheckWorker<S> {
    fn clone(&self) -> Self {
        CheckWorker {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CheckStore> CheckWorker<S> {
    pub fn new(store: Arc<S>) -> CheckWorker<S> {
        CheckWorker { store }
    }

    /// Drive one result through the pipeline.
    ///
    /// Any error between `begin_snapshot` and commit aborts the snapshot
    /// before the error is returned; the worker never partially commits.
    pub async fn execute(&self, result: &CheckResult) -> Result<WorkerOutcome, WorkerError> {
        let mut snapshot = self.store.begin_snapshot().await?;

        match self.run(&mut snapshot, result).await {
            Ok(Step::Commit(change)) => {
                self.store.commit_snapshot(snapshot).await?;
                Ok(WorkerOutcome::Completed(change))
            }
            Ok(Step::Discard(outcome)) => {
                self.store.abort_snapshot(snapshot).await?;
                Ok(outcome)
            }
            Err(e) => {
                // Roll back; the original error is what the caller needs.
                let _ = self.store.abort_snapshot(snapshot).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        snapshot: &mut S::Snapshot,
        result: &CheckResult,
    ) -> Result<Step, WorkerError> {
        // Staleness is checked against the bastion's own memo before the
        // state lock is ever taken, so redelivered messages are dropped
        // without contending on the check.
        let memo = match self
            .store
            .get_memo(snapshot, &result.check_id, &result.bastion_id)
            .await?
        {
            Some(existing) => {
                if existing.last_updated >= result.timestamp {
                    debug!(
                        check_id = %result.check_id,
                        bastion_id = %result.bastion_id,
                        "dropping stale result"
                    );
                    return Ok(Step::Discard(WorkerOutcome::StaleResult));
                }
                ResultMemo {
                    failing_count: result.failing_count(),
                    response_count: result.response_count(),
                    last_updated: result.timestamp,
                    ..existing
                }
            }
            None => ResultMemo::from_result(result),
        };
        self.store.put_memo(snapshot, memo).await?;

        let mut state = match self
            .store
            .get_and_lock_state(snapshot, &result.customer_id, &result.check_id)
            .await
        {
            Ok(state) => state,
            Err(StorageError::CheckNotFound { .. }) => {
                // Deletion race: the memo write above is discarded with
                // the snapshot.
                debug!(check_id = %result.check_id, "result for deleted check");
                return Ok(Step::Discard(WorkerOutcome::CheckNotFound));
            }
            Err(e) => return Err(e.into()),
        };

        self.store.update_state(snapshot, &mut state).await?;

        let from = state.id;
        state.transition(result)?;
        self.store.put_state(snapshot, &state).await?;

        let transition = if from != state.id {
            Some(
                self.store
                    .create_state_transition_log_entry(
                        snapshot,
                        &result.check_id,
                        &result.customer_id,
                        from,
                        state.id,
                    )
                    .await?,
            )
        } else {
            None
        };

        Ok(Step::Commit(StateChange {
            customer_id: result.customer_id.clone(),
            check_id: result.check_id.clone(),
            from,
            to: state.id,
            failing_count: state.failing_count,
            response_count: state.response_count,
            transition,
        }))
    }
}
