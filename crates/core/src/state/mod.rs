//! The check-state hysteresis machine.
//!
//! A check is *failing* when its aggregated failing-assertion count reaches
//! `min_failing_count`, and *passing* otherwise. Rather than flipping the
//! resting state on every sample, the machine routes through two
//! observation states: a failing check must stay failing for
//! `min_failing_time` before `FAIL_WAIT` is promoted to `FAIL`, and a
//! recovered check must stay passing for the same window before
//! `PASS_WAIT` is demoted back to a healthy state.
//!
//! Key invariant: `transition` assumes monotonic result timestamps. The
//! caller rejects results at or before the bastion's last-seen timestamp
//! before the machine is ever invoked.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::check::Check;
use crate::result::CheckResult;

// ──────────────────────────────────────────────
// State identifiers
// ──────────────────────────────────────────────

/// Discrete check states.
///
/// `OK` and `WARN` are the healthy resting states, `FAIL` is the confirmed
/// unhealthy resting state, and `FAIL_WAIT`/`PASS_WAIT` are observation
/// states that exist purely to implement hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateId {
    Ok,
    Warn,
    FailWait,
    Fail,
    PassWait,
}

impl StateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateId::Ok => "OK",
            StateId::Warn => "WARN",
            StateId::FailWait => "FAIL_WAIT",
            StateId::Fail => "FAIL",
            StateId::PassWait => "PASS_WAIT",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that can occur while transitioning a check state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Aggregated counts that cannot have come from a consistent memo set.
    #[error(
        "invalid aggregate for check {check_id}: failing={failing_count} responses={response_count}"
    )]
    InvalidAggregate {
        check_id: String,
        failing_count: i32,
        response_count: i32,
    },
}

// ──────────────────────────────────────────────
// Check state
// ──────────────────────────────────────────────

/// The single authoritative aggregate state of one check.
///
/// `failing_count` and `response_count` are derived by summing all live
/// result memos for the check. The thresholds are copied in from the
/// check definition at read time; they are not authoritative here.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckState {
    pub check_id: String,
    pub customer_id: String,
    pub id: StateId,
    /// Display name of `id`, kept in sync by `transition`.
    pub state: String,
    /// When the current discrete state began.
    pub time_entered: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    pub failing_count: i32,
    pub response_count: i32,
    pub min_failing_count: i32,
    pub min_failing_time: Duration,
}

impl CheckState {
    /// The default state for a check that has never produced one: `OK`
    /// with zero counts and the check's current thresholds.
    pub fn default_ok(check: &Check, now: OffsetDateTime) -> CheckState {
        CheckState {
            check_id: check.id.clone(),
            customer_id: check.customer_id.clone(),
            id: StateId::Ok,
            state: StateId::Ok.as_str().to_string(),
            time_entered: now,
            last_updated: now,
            failing_count: 0,
            response_count: 0,
            min_failing_count: check.min_failing_count,
            min_failing_time: check.min_failing_duration(),
        }
    }

    /// Whether the aggregated counts cross the failing threshold.
    pub fn is_failing(&self) -> bool {
        self.failing_count >= self.min_failing_count
    }

    /// How long the check has been in its current discrete state.
    pub fn time_in_state(&self, now: OffsetDateTime) -> Duration {
        now - self.time_entered
    }

    /// The healthy resting state for the current counts: `WARN` when some
    /// assertions fail without crossing the threshold, `OK` otherwise.
    fn healthy_target(&self) -> StateId {
        if self.failing_count > 0 {
            StateId::Warn
        } else {
            StateId::Ok
        }
    }

    fn enter(&mut self, id: StateId, now: OffsetDateTime) {
        self.id = id;
        self.state = id.as_str().to_string();
        self.time_entered = now;
    }

    /// Advance the machine with freshly aggregated counts and the result's
    /// timestamp. Mutates the state in place; `last_updated` advances on
    /// every invocation whether or not the discrete state changed.
    pub fn transition(&mut self, result: &CheckResult) -> Result<(), StateError> {
        if self.failing_count < 0
            || self.response_count < 0
            || self.failing_count > self.response_count
        {
            return Err(StateError::InvalidAggregate {
                check_id: self.check_id.clone(),
                failing_count: self.failing_count,
                response_count: self.response_count,
            });
        }

        let now = result.timestamp;
        let failing = self.is_failing();

        match self.id {
            StateId::Ok | StateId::Warn => {
                if failing {
                    self.enter(StateId::FailWait, now);
                } else {
                    let target = self.healthy_target();
                    if target != self.id {
                        self.enter(target, now);
                    }
                }
            }
            StateId::FailWait => {
                if failing {
                    if self.time_in_state(now) >= self.min_failing_time {
                        self.enter(StateId::Fail, now);
                    }
                    // Otherwise still inside the observation window.
                } else {
                    // Failing streak broken before confirmation.
                    let target = self.healthy_target();
                    self.enter(target, now);
                }
            }
            StateId::Fail => {
                if !failing {
                    self.enter(StateId::PassWait, now);
                }
            }
            StateId::PassWait => {
                if failing {
                    // Failure resumed before the recovery was confirmed.
                    self.enter(StateId::Fail, now);
                } else if self.time_in_state(now) >= self.min_failing_time {
                    let target = self.healthy_target();
                    self.enter(target, now);
                }
            }
        }

        self.last_updated = now;
        Ok(())
    }
}
