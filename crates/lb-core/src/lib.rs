//! Facade crate: wires the hashing, Maglev, health, tracking, pool, and
//! config crates into a single entry point for the C ABI (`lb-ffi`) and
//! the operator REPL (`lb-cli`).

use std::path::Path;
use std::sync::Arc;

pub use lb_config::{Config, ConfigError};
pub use lb_hash::{AddressFamily, Backend, FiveTuple};
pub use lb_health::{Checker, HealthDef, HealthState};
pub use lb_maglev::MaglevTable;
pub use lb_pool::{PoolCoordinator, PoolError, Vip, Worker};
pub use lb_tracking::TrackingCache;

/// The whole running system: a shared coordinator plus loading/reconfig
/// helpers. There is deliberately no `System::lookup` — the tracking
/// cache backing a lookup path is per-task, not shared (§4.E); call
/// [`System::spawn_worker`] once per data-plane task and keep the
/// `Worker` around.
pub struct System {
    coordinator: Arc<PoolCoordinator>,
}

impl System {
    #[must_use]
    pub fn new() -> Self {
        Self {
            coordinator: PoolCoordinator::new(),
        }
    }

    /// Reads and installs `path` as the active configuration (§4.F).
    pub fn reconfig_from_file(&self, path: &Path) -> Result<(), SystemError> {
        let cfg = lb_config::load(path)?;
        self.reconfig(&cfg)
    }

    pub fn reconfig(&self, cfg: &Config) -> Result<(), SystemError> {
        self.coordinator.reconfig(cfg)?;
        Ok(())
    }

    #[must_use]
    pub fn spawn_worker(&self) -> Worker {
        Worker::new(&self.coordinator)
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<PoolCoordinator> {
        &self.coordinator
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}
