use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use vigil_core::{CheckResult, StateId};

/// Last-known report summary from one bastion for one check.
///
/// At most one memo exists per `(check_id, bastion_id)`; it is always
/// overwritten, never appended. Memos are never deleted -- staleness is
/// handled by the live-bastion recency window, not by eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMemo {
    pub check_id: String,
    pub customer_id: String,
    pub bastion_id: String,
    /// Failing assertions in the most recent result from this bastion.
    pub failing_count: i32,
    /// Assertions evaluated in the most recent result from this bastion.
    pub response_count: i32,
    /// Timestamp of the result that produced this memo.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl ResultMemo {
    /// First-report bootstrap: build the memo directly from the result's
    /// own counts when no memo exists yet for this bastion.
    pub fn from_result(result: &CheckResult) -> ResultMemo {
        ResultMemo {
            check_id: result.check_id.clone(),
            customer_id: result.customer_id.clone(),
            bastion_id: result.bastion_id.clone(),
            failing_count: result.failing_count(),
            response_count: result.response_count(),
            last_updated: result.timestamp,
        }
    }
}

/// Immutable audit record of one observed state change.
///
/// Created once per transition where `from_state != to_state`, never
/// updated or deleted. Snapshot and alert collaborators key off `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionLogEntry {
    pub id: i64,
    pub check_id: String,
    pub customer_id: String,
    pub from_state: StateId,
    pub to_state: StateId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
