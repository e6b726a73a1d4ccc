//! Post-commit transition side effects.
//!
//! The worker reports a committed [`StateChange`]; what happens next --
//! snapshot archival, alerting -- is the hook's business. Keeping these
//! behind a trait passed in at construction (instead of a process-global
//! registration) makes the side effects mockable and keeps them strictly
//! outside the store transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use vigil_archive::{CheckSnapshot, ResultArchive};
use vigil_core::{CheckResult, StateId};
use vigil_storage::CheckStore;

use crate::error::WorkerError;
use crate::results::get_live_check_results;
use crate::worker::StateChange;

// ──────────────────────────────────────────────
// Traits
// ──────────────────────────────────────────────

/// Invoked once per committed result whose discrete state changed.
#[async_trait]
pub trait TransitionHook: Send + Sync + 'static {
    /// `change.transition` is always `Some` when this is called; `result`
    /// is the in-hand result that triggered the change.
    async fn on_transition(
        &self,
        change: &StateChange,
        result: &CheckResult,
    ) -> Result<(), WorkerError>;
}

/// A hook that does nothing. Useful when only the state machine matters.
pub struct NoopHook;

#[async_trait]
impl TransitionHook for NoopHook {
    async fn on_transition(
        &self,
        _change: &StateChange,
        _result: &CheckResult,
    ) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Where alert payloads go. Transport is not this crate's concern.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn publish(&self, alert: AlertPayload) -> Result<(), WorkerError>;
}

/// One notification-worthy state change, with the per-bastion result that
/// evidences it.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub customer_id: String,
    pub check_id: String,
    pub check_name: String,
    /// The confirmed state the check landed in.
    pub state: StateId,
    /// For a failure alert, the first currently-failing bastion result;
    /// for a recovery alert, the first currently-passing one.
    pub result: CheckResult,
}

/// An [`AlertSink`] that hands payloads to an in-process channel.
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<AlertPayload>,
}

impl ChannelAlertSink {
    pub fn new() -> (ChannelAlertSink, mpsc::UnboundedReceiver<AlertPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelAlertSink { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn publish(&self, alert: AlertPayload) -> Result<(), WorkerError> {
        self.tx
            .send(alert)
            .map_err(|e| WorkerError::Alert(e.to_string()))
    }
}

// ──────────────────────────────────────────────
// Snapshot + alert hook
// ──────────────────────────────────────────────

/// The production hook: archives a point-in-time snapshot of the check for
/// every transition, and publishes an alert for the three
/// notification-worthy transitions (`FAIL_WAIT→FAIL`, `PASS_WAIT→OK`,
/// `PASS_WAIT→WARN`).
pub struct SnapshotAlertHook<S, A, K> {
    store: Arc<S>,
    archive: Arc<A>,
    alerts: K,
}

impl<S, A, K> SnapshotAlertHook<S, A, K> {
    pub fn new(store: Arc<S>, archive: Arc<A>, alerts: K) -> SnapshotAlertHook<S, A, K> {
        SnapshotAlertHook {
            store,
            archive,
            alerts,
        }
    }
}

#[async_trait]
impl<S, A, K> TransitionHook for SnapshotAlertHook<S, A, K>
where
    S: CheckStore,
    A: ResultArchive,
    K: AlertSink,
{
    async fn on_transition(
        &self,
        change: &StateChange,
        result: &CheckResult,
    ) -> Result<(), WorkerError> {
        let Some(entry) = &change.transition else {
            return Ok(());
        };

        let check = self
            .store
            .get_check(&change.customer_id, &change.check_id)
            .await?;

        // The archive may still hold the triggering bastion's previous
        // result; the in-hand one is authoritative for this snapshot.
        let mut results = get_live_check_results(
            self.store.as_ref(),
            Arc::clone(&self.archive),
            &change.customer_id,
            &change.check_id,
        )
        .await?;
        match results.iter_mut().find(|r| r.bastion_id == result.bastion_id) {
            Some(slot) => *slot = result.clone(),
            None => results.push(result.clone()),
        }

        let check_name = check.name.clone();
        let snapshot = CheckSnapshot {
            check,
            state: change.to.as_str().to_string(),
            failing_count: change.failing_count,
            response_count: change.response_count,
            results: results.clone(),
        };
        self.archive.put_check_snapshot(entry.id, &snapshot).await?;

        let candidate = match (change.from, change.to) {
            (StateId::FailWait, StateId::Fail) => results.iter().find(|r| !r.passing),
            (StateId::PassWait, StateId::Ok) | (StateId::PassWait, StateId::Warn) => {
                results.iter().find(|r| r.passing)
            }
            _ => return Ok(()),
        };

        match candidate {
            Some(evidence) => {
                self.alerts
                    .publish(AlertPayload {
                        customer_id: change.customer_id.clone(),
                        check_id: change.check_id.clone(),
                        check_name,
                        state: change.to,
                        result: evidence.clone(),
                    })
                    .await
            }
            None => {
                // A confirmed transition with no matching evidence can
                // happen when another bastion's fresher result already
                // flipped the picture; not an error, just nothing to say.
                warn!(
                    check_id = %change.check_id,
                    from = %change.from,
                    to = %change.to,
                    "no candidate result for alert"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
