use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Outcome of a single assertion evaluated by a bastion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub passing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One bastion's report for one check: the per-assertion outcomes plus the
/// time the probe ran.
///
/// This is the inbound queue message body. The aggregation engine only
/// reads the identifiers, the timestamp, and the pass/fail outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub customer_id: String,
    pub check_id: String,
    pub bastion_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// True when every response passed.
    pub passing: bool,
    pub responses: Vec<CheckResponse>,
}

impl CheckResult {
    /// Number of failing assertions in this report.
    pub fn failing_count(&self) -> i32 {
        self.responses.iter().filter(|r| !r.passing).count() as i32
    }

    /// Number of assertions evaluated in this report.
    pub fn response_count(&self) -> i32 {
        self.responses.len() as i32
    }
}
