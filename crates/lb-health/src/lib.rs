//! Per-backend health checking (§4.D): a small state machine with
//! hysteresis, driven either by an HTTP probe loop or by direct test
//! control.

mod checker;
mod error;

pub use checker::{Checker, HealthDef, HealthState, Transition};
pub use error::HealthError;
