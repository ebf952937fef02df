use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lb_config::{Config, HealthCheckConfig};
use lb_hash::{Backend, FiveTuple};
use lb_health::{Checker, HealthDef, HealthState};
use lb_maglev::MaglevTable;
use lb_tracking::TrackingCache;
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::error::PoolError;
use crate::vip::Vip;

/// Periodic-probe parameters the config schema doesn't expose per backend
/// (§6 only carries `http_address`); fixed for every `http` checker,
/// matching the original implementation's constants.
pub const HEALTH_DELAY: Duration = Duration::from_secs(2);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(1);
/// Default tracking-cache entry lifetime for a `Worker`.
pub const TRACKING_EXPIRY: Duration = Duration::from_secs(10);

struct BackendInfo {
    #[allow(dead_code)]
    ip: Box<[u8]>,
    health_def: HealthDef,
    checker: Checker,
}

struct Pool {
    backends: HashMap<String, BackendInfo>,
    table: Arc<MaglevTable>,
}

/// Owns `pools: VIP → Pool` under a reader-writer lock (§4.F). Lookups take
/// the read side; `reconfig` takes the write side.
pub struct PoolCoordinator {
    pools: RwLock<HashMap<Vip, Pool>>,
}

impl PoolCoordinator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pools: RwLock::new(HashMap::new()),
        })
    }

    /// Looks up the destination VIP's pool, then its Maglev table. This is
    /// the miss resolver a `Worker`'s tracking cache is wired to; it is not
    /// itself cached.
    #[must_use]
    pub fn resolve(&self, tuple: &FiveTuple) -> Option<Arc<Backend>> {
        let vip = Vip::from_bytes(&tuple.dst_ip);
        let pools = self.pools.read();
        let pool = pools.get(&vip)?;
        pool.table.lookup5(tuple)
    }

    /// Rebuilds the pool map from `cfg` (§4.F's `Reconfig`). Synchronous
    /// and potentially briefly blocking (transplant stops) — callers run
    /// this on an operator task, never the data plane.
    ///
    /// # Panics
    ///
    /// Panics if any pool's `maglev_size` is not prime, or any VIP/backend
    /// address is neither 4 nor 16 bytes — both are programmer/operator
    /// errors (§7), not runtime conditions.
    pub fn reconfig(&self, cfg: &Config) -> Result<(), PoolError> {
        let mut pools = self.pools.write();
        let mut to_stop: Vec<Checker> = Vec::new();
        let mut new_pools: HashMap<Vip, Pool> = HashMap::new();

        for pool_cfg in &cfg.pools {
            let vip_bytes = lb_config::parse_ip(&pool_cfg.vip, &pool_cfg.vip)?;
            let vip = Vip::from_bytes(&vip_bytes);
            let table = Arc::new(MaglevTable::new(pool_cfg.maglev_size));

            let mut old_pool = pools.remove(&vip);
            let mut new_backends = HashMap::new();

            for backend_cfg in &pool_cfg.backends {
                let ip = lb_config::parse_ip(&backend_cfg.name, &backend_cfg.ip)?;
                let health_def = health_def_from_config(&backend_cfg.health_check);

                let old_info = old_pool.as_mut().and_then(|p| p.backends.remove(&backend_cfg.name));

                let checker = match old_info {
                    Some(old) if old.health_def == health_def => {
                        // Transplant: recover the stopped checker's state
                        // and seed the replacement with it (preserves
                        // hysteresis across a no-op reconfig).
                        let recovered = stop_checker(old.checker);
                        spawn_checker(
                            &table,
                            &backend_cfg.name,
                            ip.clone(),
                            health_def.clone(),
                            recovered == HealthState::Healthy,
                        )
                    }
                    Some(old) => {
                        to_stop.push(old.checker);
                        let initial = default_initial_healthy(&backend_cfg.health_check);
                        spawn_checker(&table, &backend_cfg.name, ip.clone(), health_def.clone(), initial)
                    }
                    None => {
                        let initial = default_initial_healthy(&backend_cfg.health_check);
                        spawn_checker(&table, &backend_cfg.name, ip.clone(), health_def.clone(), initial)
                    }
                };

                new_backends.insert(backend_cfg.name.clone(), BackendInfo { ip, health_def, checker });
            }

            // Anything left in the old pool wasn't reused this round.
            if let Some(old_pool) = old_pool {
                for (_, info) in old_pool.backends {
                    to_stop.push(info.checker);
                }
            }

            new_pools.insert(vip, Pool { backends: new_backends, table });
        }

        // VIPs dropped entirely from the new config.
        for (_, old_pool) in pools.drain() {
            for (_, info) in old_pool.backends {
                to_stop.push(info.checker);
            }
        }

        let stopped_inline = to_stop.len();
        *pools = new_pools;
        drop(pools);

        info!(pools = cfg.pools.len(), stopped_inline, "reconfig installed new pool map");

        // Detached: nothing downstream depends on these finishing.
        std::thread::spawn(move || {
            for checker in to_stop {
                checker.stop();
            }
        });

        Ok(())
    }
}

/// Stops `checker`, offloading the blocking wait off the async runtime
/// worker thread when one is present. An `http` checker's `stop()` blocks
/// on a `std::sync::mpsc::Receiver::recv()` until its probe-loop task
/// wakes and replies; `reconfig` is called directly from `#[tokio::main]`
/// code in `lb-cli`/`lb-ffi` with no `spawn_blocking` wrapper of its own,
/// so doing nothing here would stall a runtime worker thread for up to one
/// probe tick. `block_in_place` only works on a multi-threaded runtime, so
/// outside one (a bare thread, or a `current_thread` test runtime) this
/// just calls `stop()` directly — safe there because nothing on those
/// paths exercises an `http` checker's blocking branch.
fn stop_checker(checker: Checker) -> HealthState {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| checker.stop())
        }
        _ => checker.stop(),
    }
}

/// Constructs a checker whose `on_up`/`on_down` callbacks add/remove a
/// freshly built `Backend` handle from `table` — each health-up cycle gets
/// its own handle with a fresh latch, since the latch can only close once.
fn spawn_checker(table: &Arc<MaglevTable>, name: &str, ip: Box<[u8]>, def: HealthDef, initial_healthy: bool) -> Checker {
    let current: Arc<Mutex<Option<Arc<Backend>>>> = Arc::new(Mutex::new(None));

    if initial_healthy {
        let backend = Arc::new(Backend::new(name.to_string(), ip.clone()));
        table.add(Arc::clone(&backend));
        *current.lock() = Some(backend);
    }

    let on_up = {
        let table = Arc::clone(table);
        let current = Arc::clone(&current);
        let name = name.to_string();
        let ip = ip.clone();
        move || {
            let backend = Arc::new(Backend::new(name.clone(), ip.clone()));
            table.add(Arc::clone(&backend));
            *current.lock() = Some(backend);
        }
    };
    let on_down = {
        let table = Arc::clone(table);
        let current = Arc::clone(&current);
        move || {
            if let Some(backend) = current.lock().take() {
                backend.mark_unhealthy();
                table.remove(&backend);
            }
        }
    };

    Checker::start(def, initial_healthy, on_up, on_down)
}

fn health_def_from_config(hc: &HealthCheckConfig) -> HealthDef {
    match hc {
        HealthCheckConfig::Mock { healthy } => HealthDef::Mock { initial_healthy: *healthy },
        HealthCheckConfig::Http { http_address } => HealthDef::Http {
            url: http_address.clone(),
            delay: HEALTH_DELAY,
            timeout: HEALTH_TIMEOUT,
            http_timeout: HTTP_TIMEOUT,
        },
    }
}

/// The config schema only carries an explicit initial-healthy flag for
/// `mock`; an `http` backend starts optimistically healthy and lets the
/// probe loop correct that on the first failed tick.
fn default_initial_healthy(hc: &HealthCheckConfig) -> bool {
    match hc {
        HealthCheckConfig::Mock { healthy } => *healthy,
        HealthCheckConfig::Http { .. } => true,
    }
}

/// A per-data-plane-worker lookup handle: a private tracking cache wired
/// to the shared coordinator's pool map. `lb_tracking::TrackingCache` is
/// explicitly not internally synchronized (§4.E); one `Worker` per task.
pub struct Worker {
    cache: TrackingCache<Box<dyn FnMut(&FiveTuple) -> Option<Arc<Backend>> + Send>>,
}

impl Worker {
    #[must_use]
    pub fn new(coordinator: &Arc<PoolCoordinator>) -> Self {
        Self::with_expiry(coordinator, TRACKING_EXPIRY)
    }

    #[must_use]
    pub fn with_expiry(coordinator: &Arc<PoolCoordinator>, expiry: Duration) -> Self {
        let coordinator = Arc::clone(coordinator);
        let resolver: Box<dyn FnMut(&FiveTuple) -> Option<Arc<Backend>> + Send> =
            Box::new(move |t: &FiveTuple| coordinator.resolve(t));
        Self {
            cache: TrackingCache::new(resolver, expiry),
        }
    }

    /// `lookup(t) → (backend, ok)` (§4.F), delegated straight to the
    /// tracking cache.
    pub fn lookup(&mut self, tuple: &FiveTuple) -> Option<Arc<Backend>> {
        self.cache.lookup(tuple)
    }
}
