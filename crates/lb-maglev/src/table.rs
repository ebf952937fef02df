//! The Maglev consistent-hashing table (§4.C).

use std::collections::HashMap;
use std::sync::Arc;

use lb_hash::siphash::{self, OFFSET_KEY, SKIP_KEY};
use lb_hash::Backend;
use parking_lot::RwLock;

use crate::prime::is_prime;

/// Wraps `Arc<Backend>` so it can key a `HashMap` by pointer identity
/// rather than by `Backend`'s contents (two backends can legitimately
/// share an IP).
#[derive(Clone)]
struct BackendKey(Arc<Backend>);

impl PartialEq for BackendKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for BackendKey {}

impl std::hash::Hash for BackendKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

#[derive(Clone, Copy)]
struct Permutation {
    weight: u32,
    offset: u64,
    skip: u64,
}

struct Inner {
    permutations: HashMap<BackendKey, Permutation>,
    /// Empty when no backend has positive weight; otherwise length `m`.
    lookup: Vec<Arc<Backend>>,
}

/// `T = (m, permutations, lookup)`. `m` must be prime; `lookup` is either
/// empty or length `m`. All mutation takes the write side of an internal
/// reader-writer lock; `lookup` takes the read side.
pub struct MaglevTable {
    m: u64,
    inner: RwLock<Inner>,
}

impl MaglevTable {
    /// # Panics
    ///
    /// Panics if `m` is not prime — a programmer/config error, not a
    /// runtime condition (§4.C, §7).
    #[must_use]
    pub fn new(m: u64) -> Self {
        assert!(is_prime(m), "maglev table size {m} is not prime");
        Self {
            m,
            inner: RwLock::new(Inner {
                permutations: HashMap::new(),
                lookup: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn m(&self) -> u64 {
        self.m
    }

    fn permutation_for(&self, ip: &[u8]) -> (u64, u64) {
        let offset = siphash::hash(OFFSET_KEY, 0, ip) % self.m;
        let skip = siphash::hash(SKIP_KEY, 0, ip) % (self.m - 1) + 1;
        (offset, skip)
    }

    /// Equivalent to `set_weight(b, 1)`.
    pub fn add(&self, backend: Arc<Backend>) {
        self.set_weight(backend, 1);
    }

    /// Deletes `backend` from the table, repopulating `lookup`. Removing an
    /// unknown backend is a no-op.
    pub fn remove(&self, backend: &Arc<Backend>) {
        let mut inner = self.inner.write();
        inner.permutations.remove(&BackendKey(Arc::clone(backend)));
        self.repopulate(&mut inner);
    }

    /// `weight = 0` deletes the backend; otherwise inserts or updates it.
    ///
    /// # Panics
    ///
    /// Never — callers cannot pass a null backend in safe Rust, but an
    /// `Arc` clone of a dangling handle is not representable either, so
    /// the spec's "null backend is fatal" has no counterpart here.
    pub fn set_weight(&self, backend: Arc<Backend>, weight: u32) {
        let mut inner = self.inner.write();
        if weight == 0 {
            inner.permutations.remove(&BackendKey(backend));
        } else {
            let (offset, skip) = self.permutation_for(&backend.ip);
            inner
                .permutations
                .entry(BackendKey(backend))
                .and_modify(|p| p.weight = weight)
                .or_insert(Permutation {
                    weight,
                    offset,
                    skip,
                });
        }
        self.repopulate(&mut inner);
    }

    /// Wholesale replace the backend set. Zero-weight entries are dropped.
    pub fn reconfig(&self, cfg: &[(Arc<Backend>, u32)]) {
        let mut inner = self.inner.write();
        inner.permutations.clear();
        for (backend, weight) in cfg {
            if *weight == 0 {
                continue;
            }
            let (offset, skip) = self.permutation_for(&backend.ip);
            inner.permutations.insert(
                BackendKey(Arc::clone(backend)),
                Permutation {
                    weight: *weight,
                    offset,
                    skip,
                },
            );
        }
        self.repopulate(&mut inner);
    }

    /// Returns the backend whose handle sits at slot `key mod m`, or
    /// `None` if the table has no live backends.
    #[must_use]
    pub fn lookup(&self, key: u64) -> Option<Arc<Backend>> {
        let inner = self.inner.read();
        if inner.lookup.is_empty() {
            return None;
        }
        let slot = (key % self.m) as usize;
        Some(Arc::clone(&inner.lookup[slot]))
    }

    /// Convenience for `lookup(tuple.hash())`.
    #[must_use]
    pub fn lookup5(&self, tuple: &lb_hash::FiveTuple) -> Option<Arc<Backend>> {
        self.lookup(tuple.hash())
    }

    #[must_use]
    pub fn backend_count(&self) -> usize {
        self.inner.read().permutations.len()
    }

    /// The core population algorithm: for each backend in offset-sorted
    /// order, walk its preference sequence until every slot of `lookup` is
    /// filled. Holding the write lock across repopulation is the simplest
    /// correct implementation (§4.C allows swapping the vector in and
    /// dropping the lock earlier, but the table is small enough relative
    /// to reconfig frequency that this isn't worth the extra complexity).
    fn repopulate(&self, inner: &mut Inner) {
        if inner.permutations.is_empty() {
            inner.lookup = Vec::new();
            return;
        }

        struct BState {
            backend: Arc<Backend>,
            loc: u64,
            skip: u64,
            weight: u32,
        }

        let mut state: Vec<BState> = inner
            .permutations
            .iter()
            .map(|(key, p)| BState {
                backend: Arc::clone(&key.0),
                loc: p.offset,
                skip: p.skip,
                weight: p.weight,
            })
            .collect();
        // Deterministic population order for a given configuration.
        state.sort_by_key(|s| s.loc);

        let m = self.m as usize;
        let mut entry: Vec<Option<Arc<Backend>>> = vec![None; m];
        let mut inserted: u64 = 0;

        'outer: loop {
            for s in &mut state {
                for _ in 0..s.weight {
                    let mut c = s.loc;
                    while entry[c as usize].is_some() {
                        c = (c + s.skip) % self.m;
                    }
                    entry[c as usize] = Some(Arc::clone(&s.backend));
                    s.loc = (c + s.skip) % self.m;

                    inserted += 1;
                    if inserted == self.m {
                        break 'outer;
                    }
                }
            }
        }

        inner.lookup = entry.into_iter().map(|e| e.expect("every slot filled")).collect();
    }
}
