use async_trait::async_trait;

use vigil_core::CheckResult;

use crate::error::ArchiveError;
use crate::snapshot::CheckSnapshot;

/// Storage for raw check results and transition snapshots.
///
/// All operations have at-most-one-object-per-key overwrite semantics --
/// this is not versioned history. Latest-result objects are keyed by
/// `(check_id, bastion_id)`; snapshots are keyed by the transition log
/// entry id that produced them, which makes snapshot writes idempotent
/// under redelivery.
#[async_trait]
pub trait ResultArchive: Send + Sync + 'static {
    /// Write (or overwrite) the latest result for the result's
    /// `(check_id, bastion_id)`.
    async fn put_result(&self, result: &CheckResult) -> Result<(), ArchiveError>;

    /// Read the latest result one bastion reported for a check.
    async fn get_result_by_check_id(
        &self,
        bastion_id: &str,
        check_id: &str,
    ) -> Result<CheckResult, ArchiveError>;

    /// Write (or overwrite) the snapshot for a transition log entry.
    async fn put_check_snapshot(
        &self,
        transition_id: i64,
        snapshot: &CheckSnapshot,
    ) -> Result<(), ArchiveError>;

    /// Read the snapshot stored for a transition log entry.
    async fn get_check_snapshot(
        &self,
        transition_id: i64,
        check_id: &str,
    ) -> Result<CheckSnapshot, ArchiveError>;
}
