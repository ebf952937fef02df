use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as blocking_mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::HealthError;

/// A health-check definition: a tagged variant over check types, matching
/// the declarative config's `health_check.type` discriminant (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthDef {
    /// Driven entirely by `Checker::set_healthy`; never probes on its own.
    Mock { initial_healthy: bool },
    /// Probes `url` every `delay`; a probe must both complete within
    /// `http_timeout` and return a body containing the literal substring
    /// `healthy`.
    Http {
        url: String,
        delay: Duration,
        timeout: Duration,
        http_timeout: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    fn from_bool(healthy: bool) -> Self {
        if healthy {
            Self::Healthy
        } else {
            Self::Unhealthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Up,
    Down,
}

enum Probe {
    Mock,
    Http {
        stop_tx: oneshot::Sender<()>,
        done_rx: blocking_mpsc::Receiver<HealthState>,
        #[allow(dead_code)]
        task: JoinHandle<()>,
    },
}

/// A running checker for one backend. Holds a lock-free, non-blocking view
/// of the current state (`healthy`) alongside the update channel that
/// drives `on_up`/`on_down` callbacks.
pub struct Checker {
    state: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Transition>,
    probe: Probe,
}

impl Checker {
    /// Starts a checker in `initial_healthy` state. `on_up`/`on_down` run
    /// on the single-consumer callback task, in strict per-backend
    /// transition order. Must be called from within a Tokio runtime.
    pub fn start<FUp, FDown>(def: HealthDef, initial_healthy: bool, on_up: FUp, on_down: FDown) -> Self
    where
        FUp: Fn() + Send + 'static,
        FDown: Fn() + Send + 'static,
    {
        let state = Arc::new(AtomicBool::new(initial_healthy));
        let (tx, mut rx) = mpsc::unbounded_channel::<Transition>();

        tokio::spawn(async move {
            while let Some(transition) = rx.recv().await {
                match transition {
                    Transition::Up => {
                        info!("backend health transition: up");
                        on_up();
                    }
                    Transition::Down => {
                        warn!("backend health transition: down");
                        on_down();
                    }
                }
            }
        });

        let probe = match def {
            HealthDef::Mock { .. } => Probe::Mock,
            HealthDef::Http {
                url,
                delay,
                timeout,
                http_timeout,
            } => {
                let state = Arc::clone(&state);
                let tx = tx.clone();
                let (stop_tx, stop_rx) = oneshot::channel();
                let (done_tx, done_rx) = blocking_mpsc::channel();
                let task = tokio::spawn(async move {
                    let final_state = run_http_probe_loop(
                        url,
                        delay,
                        timeout,
                        http_timeout,
                        state,
                        tx,
                        stop_rx,
                        initial_healthy,
                    )
                    .await;
                    let _ = done_tx.send(final_state);
                });
                Probe::Http { stop_tx, done_rx, task }
            }
        };

        Self { state, tx, probe }
    }

    /// Non-blocking poll of the current health state.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    /// Drives a `mock` checker directly. Panics if called on an `http`
    /// checker, which has no externally settable state.
    pub fn set_healthy(&self, healthy: bool) {
        let Probe::Mock = &self.probe else {
            panic!("set_healthy called on a non-mock checker");
        };
        let previous = self.state.swap(healthy, Ordering::AcqRel);
        if previous != healthy {
            let transition = if healthy { Transition::Up } else { Transition::Down };
            let _ = self.tx.send(transition);
        }
    }

    /// Signals termination, blocks until the checker acknowledges, and
    /// returns the last known health state. The coordinator uses this to
    /// seed a replacement checker across a no-op reconfig (§4.F's
    /// transplant). Synchronous by design (§5's "Cancellation": stop
    /// waits for the checker task, matching the serialized-reconfig
    /// operator task this is always called from — never the data plane).
    #[must_use]
    pub fn stop(self) -> HealthState {
        let Self { state, tx, probe } = self;
        let last_state = match probe {
            Probe::Mock => HealthState::from_bool(state.load(Ordering::Acquire)),
            Probe::Http { stop_tx, done_rx, task: _ } => {
                let _ = stop_tx.send(());
                done_rx
                    .recv()
                    .unwrap_or_else(|_| HealthState::from_bool(state.load(Ordering::Acquire)))
            }
        };
        drop(tx);
        last_state
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_http_probe_loop(
    url: String,
    delay: Duration,
    timeout: Duration,
    http_timeout: Duration,
    shared: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Transition>,
    mut stop_rx: oneshot::Receiver<()>,
    initial_healthy: bool,
) -> HealthState {
    let client = reqwest::Client::new();
    let mut state = HealthState::from_bool(initial_healthy);
    let mut last_success = Instant::now();
    let mut ticker = tokio::time::interval(delay);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let ok = match probe_once(&client, &url, http_timeout).await {
                    Ok(()) => true,
                    Err(err) => {
                        debug!(%err, "probe failed for this tick");
                        false
                    }
                };
                let now = Instant::now();
                if ok {
                    last_success = now;
                    if state == HealthState::Unhealthy {
                        state = HealthState::Healthy;
                        shared.store(true, Ordering::Release);
                        let _ = tx.send(Transition::Up);
                    }
                } else if state == HealthState::Healthy && now > last_success + timeout {
                    state = HealthState::Unhealthy;
                    shared.store(false, Ordering::Release);
                    let _ = tx.send(Transition::Down);
                }
            }
        }
    }
    state
}

/// Any transport or parse failure surfaces as a `HealthError` this tick;
/// nothing here ever dereferences a response that wasn't first confirmed
/// `Ok`. The caller treats every error variant identically (absorbed by
/// hysteresis, per §7), but keeps the distinction in the log line.
async fn probe_once(client: &reqwest::Client, url: &str, http_timeout: Duration) -> Result<(), HealthError> {
    let response = client.get(url).timeout(http_timeout).send().await?;
    let body = response.text().await?;
    if body.contains("healthy") {
        Ok(())
    } else {
        Err(HealthError::NotHealthy)
    }
}
