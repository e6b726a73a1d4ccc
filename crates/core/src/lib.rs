//! Domain types and the check-state hysteresis machine for vigil.
//!
//! A *check* is a monitored target with hysteresis thresholds. *Bastions*
//! (distributed probe agents) execute the check and report per-assertion
//! outcomes as a [`CheckResult`]. The [`state`] module derives one
//! authoritative, flap-resistant [`CheckState`] per check from those
//! reports.

mod check;
mod result;
pub mod state;

pub use check::Check;
pub use result::{CheckResponse, CheckResult};
pub use state::{CheckState, StateError, StateId};
