//! A backend server handle and its one-shot unhealthy latch.

use std::sync::atomic::{AtomicBool, Ordering};

/// A one-shot signal: open ("live") at construction, closes ("unhealthy")
/// exactly once, and never reopens. Reading it is a non-blocking,
/// idempotent poll — there is no `wait()`.
#[derive(Debug, Default)]
pub struct UnhealthyLatch {
    closed: AtomicBool,
}

impl UnhealthyLatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }

    /// Closes the latch. Idempotent: closing an already-closed latch is a
    /// no-op, not an error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll of the latch's state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// A target server: an immutable IP and name plus its unhealthy latch.
///
/// `Backend` is always held behind `Arc` so that the Maglev table, the
/// tracking cache, and the owning pool can all reference the same instance
/// without copying the latch. Identity for hashing/keying purposes is
/// `Arc` pointer identity (`Arc::ptr_eq`), not a `PartialEq` on contents —
/// two backends with the same IP are still distinct backends.
#[derive(Debug)]
pub struct Backend {
    pub name: String,
    pub ip: Box<[u8]>,
    unhealthy: UnhealthyLatch,
}

impl Backend {
    #[must_use]
    pub fn new(name: impl Into<String>, ip: impl Into<Box<[u8]>>) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            unhealthy: UnhealthyLatch::new(),
        }
    }

    /// Declares this backend unhealthy. Closes the latch; a prior close is
    /// a no-op.
    pub fn mark_unhealthy(&self) {
        self.unhealthy.close();
    }

    /// Non-blocking poll: has the unhealthy latch fired?
    #[must_use]
    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy.is_closed()
    }
}
