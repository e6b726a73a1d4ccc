use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use vigil_core::{Check, CheckState, StateId};

use crate::error::StorageError;
use crate::record::{ResultMemo, StateTransitionLogEntry};

/// How far a bastion's most recent memo may trail the newest memo for the
/// same check before the bastion is no longer considered reporting.
///
/// The window is anchored at the newest observed memo timestamp rather
/// than wall-clock now, so bastions are not falsely evicted while no
/// results are being processed.
pub const LIVE_BASTION_WINDOW: Duration = Duration::seconds(120);

/// The storage trait for check-state backends.
///
/// A `CheckStore` implementation provides durable, transactional storage
/// for check definitions (read-only here), per-bastion result memos, the
/// per-check aggregate state row, and the append-only transition log.
///
/// ## Snapshot semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing
/// an in-progress transaction:
///
/// 1. `begin_snapshot()` -- start a transaction
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` -- commit and consume the transaction
///    OR `abort_snapshot(snapshot)` -- roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying
/// transaction MUST be rolled back. Reads inside a snapshot observe that
/// snapshot's own pending writes; concurrent readers observe only
/// committed data.
///
/// ## Per-check serialization
///
/// `get_and_lock_state` acquires an exclusive per-check lock held until
/// the snapshot is committed or aborted. Two snapshots racing on the same
/// check serialize at that lock; snapshots for different checks proceed in
/// parallel. Lockers block, they do not fail.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across worker tasks.
#[async_trait]
pub trait CheckStore: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this backend.
    ///
    /// Must be `Send` to allow passing across async task boundaries.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable and releasing any
    /// state locks it holds.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations and
    /// releasing any state locks it holds.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Memo operations (within snapshot) ─────────────────────────────────────

    /// Read the memo for `(check_id, bastion_id)`.
    ///
    /// `Ok(None)` means this is the first-ever report from that bastion
    /// for that check -- a distinguished, non-fatal condition.
    async fn get_memo(
        &self,
        snapshot: &mut Self::Snapshot,
        check_id: &str,
        bastion_id: &str,
    ) -> Result<Option<ResultMemo>, StorageError>;

    /// Idempotent upsert keyed by `(check_id, bastion_id)`, overwriting
    /// the counts and `last_updated`. Insert-or-update, no separate
    /// existence check.
    async fn put_memo(
        &self,
        snapshot: &mut Self::Snapshot,
        memo: ResultMemo,
    ) -> Result<(), StorageError>;

    // ── State operations (within snapshot) ────────────────────────────────────

    /// Acquire the exclusive per-check lock and read the check's state.
    ///
    /// If no state row exists yet, a default `OK` state is synthesized
    /// from the check's current thresholds without being persisted; the
    /// later `put_state` upsert materializes it. Threshold time units are
    /// converted to a duration exactly once, here.
    ///
    /// Returns `Err(StorageError::CheckNotFound)` when the check is
    /// missing or soft-deleted, so callers can treat results for deleted
    /// checks as no-ops rather than failures.
    async fn get_and_lock_state(
        &self,
        snapshot: &mut Self::Snapshot,
        customer_id: &str,
        check_id: &str,
    ) -> Result<CheckState, StorageError>;

    /// Recompute `state.failing_count` / `state.response_count` as the sum
    /// over all memos for the check.
    ///
    /// This is full re-aggregation from the current memo set, not an
    /// incremental delta, so it is idempotent and safe to re-run. The sum
    /// observes the snapshot's own pending memo writes. No memos
    /// aggregates to zero, not an error. Must be called while the state
    /// lock is held.
    async fn update_state(
        &self,
        snapshot: &mut Self::Snapshot,
        state: &mut CheckState,
    ) -> Result<(), StorageError>;

    /// Upsert the state row keyed by `check_id`, overwriting all mutable
    /// fields. Usable for both first creation and update.
    async fn put_state(
        &self,
        snapshot: &mut Self::Snapshot,
        state: &CheckState,
    ) -> Result<(), StorageError>;

    /// Append one immutable transition log row and return it with its
    /// assigned id and creation timestamp.
    ///
    /// Must be called only when `from_state != to_state`, in the same
    /// snapshot as the `put_state` that recorded the change.
    async fn create_state_transition_log_entry(
        &self,
        snapshot: &mut Self::Snapshot,
        check_id: &str,
        customer_id: &str,
        from_state: StateId,
        to_state: StateId,
    ) -> Result<StateTransitionLogEntry, StorageError>;

    // ── Query operations (outside snapshot) ───────────────────────────────────

    /// Read a check definition. Returns `Err(StorageError::CheckNotFound)`
    /// when missing or soft-deleted.
    async fn get_check(&self, customer_id: &str, check_id: &str) -> Result<Check, StorageError>;

    /// Read a check's committed state without locking, or `None` when the
    /// state row has never been materialized.
    async fn get_state(
        &self,
        customer_id: &str,
        check_id: &str,
    ) -> Result<Option<CheckState>, StorageError>;

    /// The bastions currently considered reporting for a check: those
    /// whose memo `last_updated` falls within [`LIVE_BASTION_WINDOW`]
    /// (inclusive) of the newest memo timestamp for the check, ordered
    /// newest first. Empty when the check has no memos.
    async fn get_live_bastions(
        &self,
        customer_id: &str,
        check_id: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// Committed transition log entries for a check with `created_at`
    /// inside `[from, to]`, oldest first.
    async fn get_transition_log_entries(
        &self,
        check_id: &str,
        customer_id: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<StateTransitionLogEntry>, StorageError>;

    // ── Check definition seeding (owned by the check CRUD subsystem) ──────────

    /// Insert or replace a check definition.
    async fn put_check(&self, check: Check) -> Result<(), StorageError>;

    /// Soft-delete a check. The engine treats subsequent results for it as
    /// no-ops and never creates state for it.
    async fn delete_check(&self, customer_id: &str, check_id: &str) -> Result<(), StorageError>;
}
