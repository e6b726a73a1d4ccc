use serde::{Deserialize, Serialize};

use vigil_core::{Check, CheckResult};

/// Point-in-time capture of a check at the moment of a state transition:
/// the check definition, the confirmed state, the aggregated counts, and
/// the per-bastion results that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSnapshot {
    pub check: Check,
    /// Display name of the state the check transitioned into.
    pub state: String,
    pub failing_count: i32,
    pub response_count: i32,
    pub results: Vec<CheckResult>,
}
