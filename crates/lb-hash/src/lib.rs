//! Hashing primitives and the flow identity shared by every other crate in
//! the load balancer core: SipHash-2-4 (§4.A), the five-tuple (§4.B), and
//! the backend handle with its unhealthy latch (§3).

pub mod backend;
pub mod siphash;
pub mod tuple;

pub use backend::{Backend, UnhealthyLatch};
pub use tuple::{AddressFamily, FiveTuple};
