//! The connection tracking cache (§4.E): a single-writer, single-reader map
//! from a 5-tuple's hash to the backend it was last resolved to, with
//! purely lazy eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lb_hash::{Backend, FiveTuple};

struct Entry {
    backend: Arc<Backend>,
    expire_at: Instant,
}

/// Maps `FiveTuple::hash() -> (Backend, expire_at)`. Not internally
/// synchronized — callers that need concurrent access wrap it or
/// partition by hash (§4.E).
///
/// The miss resolver receives the full tuple, not just its hash — a
/// pool coordinator needs `dst_ip` to pick which VIP's Maglev table to
/// consult, which the hash alone can't recover.
pub struct TrackingCache<F>
where
    F: FnMut(&FiveTuple) -> Option<Arc<Backend>>,
{
    table: HashMap<u64, Entry>,
    miss: F,
    expiry: Duration,
}

impl<F> TrackingCache<F>
where
    F: FnMut(&FiveTuple) -> Option<Arc<Backend>>,
{
    #[must_use]
    pub fn new(miss: F, expiry: Duration) -> Self {
        Self {
            table: HashMap::new(),
            miss,
            expiry,
        }
    }

    /// Lookup contract (§4.E):
    ///
    /// 1. If `tuple`'s key is present, unexpired, and its backend's
    ///    unhealthy latch hasn't fired, refresh the expiry and return it.
    /// 2. Otherwise call the miss resolver. A hit installs a fresh binding;
    ///    a miss deletes any stale entry and returns `None`.
    ///
    /// The unhealthy-latch check is a non-blocking poll, never a wait.
    pub fn lookup(&mut self, tuple: &FiveTuple) -> Option<Arc<Backend>> {
        let key = tuple.hash();
        let now = Instant::now();

        let fresh = self
            .table
            .get(&key)
            .is_some_and(|e| e.expire_at > now && !e.backend.is_unhealthy());

        if fresh {
            let entry = self.table.get_mut(&key).expect("checked present above");
            entry.expire_at = now + self.expiry;
            return Some(Arc::clone(&entry.backend));
        }

        match (self.miss)(tuple) {
            Some(backend) => {
                self.table.insert(
                    key,
                    Entry {
                        backend: Arc::clone(&backend),
                        expire_at: now + self.expiry,
                    },
                );
                Some(backend)
            }
            None => {
                self.table.remove(&key);
                None
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
