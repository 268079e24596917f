//! Poisson traffic generators
//!
//! Each enabled generator owns one background task. Ticks arrive with
//! exponentially distributed gaps (mean `1 / rate_rps`); every tick runs
//! one trial of the configured target against the canvas's current
//! system/override snapshot and publishes its trace events on the bus.
//!
//! Backpressure drops rather than queues: when in-flight trials hit the
//! fan-out ceiling the tick is discarded and `generator_dropped` counts it,
//! so the offered load stays what the operator asked for.

use crate::bus::{BusTracer, TraceBus};
use crate::state::SharedState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdlsim_core::interpreter::Interpreter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Ceiling on concurrently in-flight trials per generator
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Operator-facing generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub id: String,
    pub name: String,
    /// `instance.method` entry point
    pub target: String,
    pub rate_rps: f64,
    pub enabled: bool,
}

impl GeneratorConfig {
    pub fn new(id: impl Into<String>, target: impl Into<String>, rate_rps: f64) -> Self {
        let id = id.into();
        GeneratorConfig {
            name: id.clone(),
            id,
            target: target.into(),
            rate_rps,
            enabled: true,
        }
    }
}

/// A registered generator and, when running, its background task
pub struct GeneratorHandle {
    pub config: GeneratorConfig,
    pub dropped: Arc<AtomicU64>,
    stop: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl GeneratorHandle {
    pub fn new(config: GeneratorConfig) -> Self {
        GeneratorHandle {
            config,
            dropped: Arc::new(AtomicU64::new(0)),
            stop: None,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the pacing task. Starting a running generator is a no-op.
    pub fn start(&mut self, state: Arc<SharedState>, bus: Arc<TraceBus>, seed: u64) {
        if self.is_running() {
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = spawn_generator(
            self.config.clone(),
            state,
            bus,
            stop_rx,
            self.dropped.clone(),
            seed,
        );
        self.stop = Some(stop_tx);
        self.task = Some(task);
        self.config.enabled = true;
    }

    /// Signal the task to stop and hand back its join handle; the caller
    /// awaits completion so in-flight trials publish before shutdown.
    pub fn stop(&mut self) -> Option<JoinHandle<()>> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }
        self.config.enabled = false;
        self.task.take()
    }
}

fn spawn_generator(
    config: GeneratorConfig,
    state: Arc<SharedState>,
    bus: Arc<TraceBus>,
    mut stop_rx: watch::Receiver<bool>,
    dropped: Arc<AtomicU64>,
    seed: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(seed);
        let in_flight = Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT));
        tracing::info!(
            generator = %config.id,
            target = %config.target,
            rate = config.rate_rps,
            "generator started"
        );

        loop {
            if *stop_rx.borrow() {
                break;
            }
            let gap = exponential_gap(&mut rng, config.rate_rps);
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(gap) => {}
            }
            if *stop_rx.borrow() {
                break;
            }

            let Some((system, overrides)) = state.snapshot() else {
                tracing::debug!(generator = %config.id, "tick skipped, no active system");
                continue;
            };

            match in_flight.clone().try_acquire_owned() {
                Ok(permit) => {
                    let target = config.target.clone();
                    let bus = bus.clone();
                    let trial_seed: u64 = rng.gen();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let tracer = BusTracer::new(bus);
                        let mut interp =
                            Interpreter::new(&system, &overrides, &tracer, trial_seed);
                        if let Err(err) = interp.invoke(&target) {
                            tracing::debug!(target = %target, error = %err, "trial failed to start");
                        }
                    });
                }
                Err(_) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(generator = %config.id, "tick dropped, fan-out ceiling hit");
                }
            }
        }

        // Let in-flight trials publish their events before reporting done.
        let _ = in_flight.acquire_many(DEFAULT_MAX_IN_FLIGHT as u32).await;
        tracing::info!(generator = %config.id, "generator stopped");
    })
}

/// Exponential inter-arrival gap with mean `1 / rate`
fn exponential_gap(rng: &mut StdRng, rate_rps: f64) -> Duration {
    if rate_rps <= 0.0 {
        // Disabled rate: park until cancellation.
        return Duration::from_secs(3600);
    }
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    Duration::from_secs_f64(-u.ln() / rate_rps)
}
