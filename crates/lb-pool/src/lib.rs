//! The pool/reconfiguration coordinator (§4.F): a VIP-keyed map of Maglev
//! pools, reconfigurable without dropping flows served by still-healthy
//! backends.

mod coordinator;
mod error;
mod vip;

pub use coordinator::{PoolCoordinator, Worker, HEALTH_DELAY, HEALTH_TIMEOUT, HTTP_TIMEOUT, TRACKING_EXPIRY};
pub use error::PoolError;
pub use vip::Vip;
