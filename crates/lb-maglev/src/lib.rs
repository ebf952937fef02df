//! The weighted Maglev consistent-hashing table (§4.C). Maps a 64-bit flow
//! key to one of N weighted backends with minimal disruption on membership
//! change.

mod prime;
mod table;

pub use prime::is_prime;
pub use table::MaglevTable;

/// Prime sizes the spec calls out by name.
pub const SMALL_M: u64 = 65537;
pub const BIG_M: u64 = 655373;

#[cfg(test)]
mod tests {
    use super::*;
    use lb_hash::Backend;
    use std::sync::Arc;

    fn backend(name: &str, last_octet: u8) -> Arc<Backend> {
        Arc::new(Backend::new(name, vec![10, 0, 0, last_octet].into_boxed_slice()))
    }

    #[test]
    #[should_panic(expected = "not prime")]
    fn test_new_with_huge_power_of_two_panics() {
        let _ = MaglevTable::new(1u64 << 60);
    }

    #[test]
    #[should_panic(expected = "not prime")]
    fn test_new_with_57_panics() {
        let _ = MaglevTable::new(57);
    }

    #[test]
    fn test_new_with_known_primes_succeeds() {
        for m in [SMALL_M, BIG_M, 1_000_000_007, 1_000_000_009] {
            let _ = MaglevTable::new(m);
        }
    }

    #[test]
    fn test_fresh_table_lookup_fails_cleanly() {
        let t = MaglevTable::new(SMALL_M);
        assert!(t.lookup(0).is_none());
        assert!(t.lookup(12345).is_none());
    }

    #[test]
    fn test_invariant_every_slot_points_into_permutations() {
        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..6).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.add(Arc::clone(b));
        }
        let live: std::collections::HashSet<_> = backends.iter().map(Arc::as_ptr).collect();
        for key in 0..SMALL_M {
            let got = t.lookup(key).expect("table has live backends");
            assert!(live.contains(&Arc::as_ptr(&got)));
        }
    }

    #[test]
    fn test_all_zero_weight_table_is_empty() {
        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..3).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.set_weight(Arc::clone(b), 0);
        }
        assert!(t.lookup(0).is_none());
        assert_eq!(t.backend_count(), 0);
    }

    #[test]
    fn test_remove_then_lookup_never_returns_removed_backend() {
        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..6).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.add(Arc::clone(b));
        }
        let removed = Arc::clone(&backends[2]);
        t.remove(&removed);
        for key in 0..SMALL_M {
            if let Some(got) = t.lookup(key) {
                assert!(!Arc::ptr_eq(&got, &removed));
            }
        }
    }

    #[test]
    fn test_determinism_same_config_same_lookup_array() {
        let backends: Vec<_> = (0..5).map(|i| backend(&format!("b{i}"), i as u8)).collect();

        let t1 = MaglevTable::new(SMALL_M);
        let t2 = MaglevTable::new(SMALL_M);
        let cfg: Vec<_> = backends.iter().cloned().map(|b| (b, 2u32)).collect();
        t1.reconfig(&cfg);
        t2.reconfig(&cfg);

        for key in (0..SMALL_M).step_by(997) {
            let a = t1.lookup(key).map(|b| b.name.clone());
            let b = t2.lookup(key).map(|b| b.name.clone());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_weight_proportionality_within_tolerance() {
        let m: u64 = 1_000_003;
        let t = MaglevTable::new(m);
        let backends: Vec<_> = (0..4).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        let weights = [1u32, 2, 3, 4];
        let total_weight: u64 = weights.iter().map(|&w| u64::from(w)).sum();

        let cfg: Vec<_> = backends
            .iter()
            .cloned()
            .zip(weights.iter().copied())
            .collect();
        t.reconfig(&cfg);

        let mut counts = vec![0u64; backends.len()];
        for key in 0..m {
            let got = t.lookup(key).unwrap();
            for (i, b) in backends.iter().enumerate() {
                if Arc::ptr_eq(&got, b) {
                    counts[i] += 1;
                    break;
                }
            }
        }

        for (i, &w) in weights.iter().enumerate() {
            let expected = (m as f64) * (f64::from(w) / total_weight as f64);
            let actual = counts[i] as f64;
            let rel_error = (actual - expected).abs() / expected;
            assert!(
                rel_error < 0.10,
                "backend {i}: expected~{expected}, got {actual}, rel_error={rel_error}"
            );
        }
    }

    #[test]
    fn test_set_weight_zero_deletes() {
        let t = MaglevTable::new(SMALL_M);
        let b0 = backend("b0", 0);
        let b1 = backend("b1", 1);
        t.add(Arc::clone(&b0));
        t.add(Arc::clone(&b1));
        assert_eq!(t.backend_count(), 2);
        t.set_weight(Arc::clone(&b0), 0);
        assert_eq!(t.backend_count(), 1);
        for key in 0..SMALL_M {
            let got = t.lookup(key).unwrap();
            assert!(!Arc::ptr_eq(&got, &b0));
        }
    }

    #[test]
    fn test_remove_unknown_backend_is_noop() {
        let t = MaglevTable::new(SMALL_M);
        let b0 = backend("b0", 0);
        t.add(Arc::clone(&b0));
        let stranger = backend("stranger", 99);
        t.remove(&stranger); // must not panic, must not disturb b0
        assert_eq!(t.backend_count(), 1);
    }

    /// Round-trip law: `Add(b); Remove(b)` with nothing in between restores
    /// the exact lookup contents the table had before the `Add`.
    #[test]
    fn test_add_then_remove_round_trip_restores_lookup_contents() {
        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..4).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.add(Arc::clone(b));
        }

        let before: Vec<_> = (0..SMALL_M).map(|key| t.lookup(key).map(|b| b.name.clone())).collect();

        let newcomer = backend("newcomer", 99);
        t.add(Arc::clone(&newcomer));
        t.remove(&newcomer);

        let after: Vec<_> = (0..SMALL_M).map(|key| t.lookup(key).map(|b| b.name.clone())).collect();
        assert_eq!(before, after);
    }

    /// Bounded disruption: removing one of N backends reassigns roughly
    /// `m/N` keys, and every reassigned key previously resolved to the
    /// removed backend — no other backend's traffic moves.
    #[test]
    fn test_remove_disruption_is_bounded_and_minimal() {
        let m = SMALL_M;
        let n = 5;
        let t = MaglevTable::new(m);
        let backends: Vec<_> = (0..n).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.add(Arc::clone(b));
        }

        let before: Vec<_> = (0..m).map(|key| t.lookup(key).map(|b| Arc::as_ptr(&b))).collect();

        let removed = Arc::clone(&backends[2]);
        t.remove(&removed);

        let mut changed = 0u64;
        for key in 0..m {
            let before_ptr = before[key as usize];
            let after_ptr = t.lookup(key).map(|b| Arc::as_ptr(&b));
            if before_ptr != after_ptr {
                changed += 1;
                assert_eq!(
                    before_ptr,
                    Some(Arc::as_ptr(&removed)),
                    "key {key} moved but its prior assignment wasn't the removed backend"
                );
            }
        }

        let expected = m as f64 / n as f64;
        let rel_error = (changed as f64 - expected).abs() / expected;
        assert!(
            rel_error < 0.20,
            "disruption {changed} keys, expected~{expected} (m/N), rel_error={rel_error}"
        );
    }

    /// S1 — Basic distribution: 6 backends, then backend 4 removed and
    /// backend 5 set to weight 0. Exactly 4 distinct backends should
    /// remain reachable, and backends 0..3 each get at least one slot
    /// across 10,000 lookups with a seeded PRNG.
    #[test]
    fn test_s1_basic_distribution() {
        use rand::{Rng, SeedableRng};

        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..6).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        for b in &backends {
            t.add(Arc::clone(b));
        }
        t.remove(&backends[4]);
        t.set_weight(Arc::clone(&backends[5]), 0);

        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut seen: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let key: u64 = rng.gen();
            let got = t.lookup(key).unwrap();
            for (i, b) in backends.iter().enumerate() {
                if Arc::ptr_eq(&got, b) {
                    seen.insert(i);
                }
            }
        }
        assert_eq!(seen.len(), 4);
        for i in 0..4 {
            assert!(seen.contains(&i), "backend {i} should receive at least one hit");
        }
        assert!(!seen.contains(&4));
        assert!(!seen.contains(&5));
    }

    /// S2 — Reconfig distribution: weights {0,1,2,3} over 4 backends;
    /// after reconfig, 10,000 seeded lookups hit exactly the 3 backends
    /// with positive weight.
    #[test]
    fn test_s2_reconfig_distribution() {
        use rand::{Rng, SeedableRng};

        let t = MaglevTable::new(SMALL_M);
        let backends: Vec<_> = (0..4).map(|i| backend(&format!("b{i}"), i as u8)).collect();
        let cfg: Vec<_> = backends.iter().cloned().zip([0u32, 1, 2, 3]).collect();
        t.reconfig(&cfg);

        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut seen: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let key: u64 = rng.gen();
            let got = t.lookup(key).unwrap();
            for (i, b) in backends.iter().enumerate() {
                if Arc::ptr_eq(&got, b) {
                    seen.insert(i);
                }
            }
        }
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&0));
    }

    proptest::proptest! {
        /// Every backend with a positive weight claims at least one slot,
        /// and no backend with weight 0 is ever returned, across a range
        /// of randomly generated weight vectors.
        #[test]
        fn prop_positive_weight_always_reachable(weights in proptest::collection::vec(0u32..=5, 2..=8)) {
            let t = MaglevTable::new(SMALL_M);
            let backends: Vec<_> = (0..weights.len()).map(|i| backend(&format!("b{i}"), i as u8)).collect();
            let cfg: Vec<_> = backends.iter().cloned().zip(weights.iter().copied()).collect();
            t.reconfig(&cfg);

            let mut seen = vec![false; backends.len()];
            for key in (0..SMALL_M).step_by(101) {
                if let Some(got) = t.lookup(key) {
                    for (i, b) in backends.iter().enumerate() {
                        if Arc::ptr_eq(&got, b) {
                            seen[i] = true;
                        }
                    }
                }
            }

            for (i, &w) in weights.iter().enumerate() {
                if w > 0 {
                    proptest::prop_assert!(seen[i], "backend {} has weight {} but received no slot", i, w);
                } else {
                    proptest::prop_assert!(!seen[i], "backend {} has weight 0 but received a slot", i);
                }
            }
        }
    }
}
