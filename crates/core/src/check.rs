use serde::{Deserialize, Serialize};
use time::Duration;

/// A monitored target plus its hysteresis thresholds.
///
/// Checks are owned by a separate check-definition subsystem; this engine
/// never creates or hard-deletes them, it only reads thresholds and the
/// soft-delete flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    /// Aggregated failing-assertion count at or above which the check is
    /// considered failing.
    pub min_failing_count: i32,
    /// Seconds the check must stay failing (or passing) before the
    /// failing (or recovered) state is confirmed.
    pub min_failing_time: i64,
    #[serde(default)]
    pub deleted: bool,
}

impl Check {
    /// The confirmation window as a duration.
    ///
    /// `min_failing_time` is stored in seconds; this is the single place
    /// the unit conversion happens.
    pub fn min_failing_duration(&self) -> Duration {
        Duration::seconds(self.min_failing_time)
    }
}
