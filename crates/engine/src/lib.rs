//! The check-state engine: everything between a raw queue message and a
//! committed state change.
//!
//! One message flows through the [`Consumer`], which decodes and validates
//! it, hands it to the [`CheckWorker`] for the transactional
//! memo-update/aggregate/transition pipeline, archives the raw result, and
//! finally invokes the [`TransitionHook`] when the discrete state changed.
//! The worker itself never alerts or snapshots; those side effects live in
//! the hook so they stay mockable and out of the transaction.

mod consumer;
mod error;
mod hook;
mod results;
mod worker;

pub use consumer::{Consumer, ConsumerOutcome};
pub use error::WorkerError;
pub use hook::{AlertPayload, AlertSink, ChannelAlertSink, NoopHook, SnapshotAlertHook, TransitionHook};
pub use results::get_live_check_results;
pub use worker::{CheckWorker, StateChange, WorkerOutcome};
