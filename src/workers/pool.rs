//! Spawning, stopping and joining a full set of role workers.

use crate::collections::SharedList;
use crate::error::SimulationError;
use crate::monitor::{AccessMonitor, AdmissionStats, MonitorSnapshot, Role};
use crate::workers::config::SimulationConfig;
use crate::workers::role_worker::{run_role, WorkerReport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Outcome of a finished simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// One report per worker, in spawn order.
    pub workers: Vec<WorkerReport>,
    /// Monitor admission totals.
    pub stats: AdmissionStats,
    /// Counters and list after every worker stopped; `None` if the monitor
    /// was poisoned.
    pub final_state: Option<MonitorSnapshot>,
    /// Wall time from start to join.
    pub elapsed_ms: u64,
}

impl SimulationReport {
    /// Sum of `values` over workers of `role`.
    pub fn values(&self, role: Role) -> u64 {
        self.workers.iter().filter(|w| w.role == role).map(|w| w.values).sum()
    }

    /// Sum of completed cycles over workers of `role`.
    pub fn cycles(&self, role: Role) -> u64 {
        self.workers.iter().filter(|w| w.role == role).map(|w| w.cycles).sum()
    }
}

/// A running set of readers, writers and erasers sharing one monitor.
pub struct Simulation {
    monitor: Arc<AccessMonitor>,
    handles: Vec<(String, JoinHandle<WorkerReport>)>,
    started: Instant,
}

impl Simulation {
    /// Validates `config`, builds the list and monitor, and spawns the
    /// workers: writers first, then readers, then erasers.
    pub fn start(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let list = match config.list_capacity {
            Some(capacity) => SharedList::with_capacity_limit(capacity),
            None => SharedList::new(),
        };
        let monitor = Arc::new(AccessMonitor::with_policy(
            list,
            config.exclusion_policy(),
            config.wake_policy,
        ));
        let config = Arc::new(config);

        let mut simulation = Self {
            monitor,
            handles: Vec::with_capacity(config.total_workers()),
            started: Instant::now(),
        };

        let plan = [
            (Role::Writer, config.writers),
            (Role::Reader, config.readers),
            (Role::Eraser, config.erasers),
        ];
        for (role, count) in plan {
            for id in 0..count {
                if let Err(err) = simulation.spawn(role, id, &config) {
                    simulation.shutdown();
                    // Workers already running stop on the closed monitor.
                    let _ = simulation.join();
                    return Err(err);
                }
            }
        }

        tracing::info!(
            readers = config.readers,
            writers = config.writers,
            erasers = config.erasers,
            wake_policy = %config.wake_policy,
            removal_bound = %config.worker.removal_bound,
            "simulation started"
        );
        Ok(simulation)
    }

    fn spawn(&mut self, role: Role, id: usize, config: &Arc<SimulationConfig>) -> Result<(), SimulationError> {
        let name = format!("{role}-{id}");
        let rng = worker_rng(config.seed, role, id);
        let monitor = Arc::clone(&self.monitor);
        let config = Arc::clone(config);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_role(role, &monitor, &config.worker, id, rng))
            .map_err(|source| SimulationError::Spawn {
                name: name.clone(),
                source,
            })?;
        self.handles.push((name, handle));
        Ok(())
    }

    /// The shared monitor.
    pub fn monitor(&self) -> &Arc<AccessMonitor> {
        &self.monitor
    }

    /// Number of spawned workers.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Closes the monitor: blocked workers give up, idle ones wake, and
    /// every loop ends after its current cycle.
    pub fn shutdown(&self) {
        if self.monitor.close() {
            tracing::info!("simulation shutting down");
        }
    }

    /// Waits for every worker. Call [`shutdown`](Self::shutdown) first, or
    /// this blocks for as long as the workers run.
    pub fn join(mut self) -> Result<SimulationReport, SimulationError> {
        let handles = std::mem::take(&mut self.handles);
        let mut workers = Vec::with_capacity(handles.len());
        let mut panicked = None;
        for (name, handle) in handles {
            match handle.join() {
                Ok(report) => {
                    tracing::debug!(worker = %name, %report, "worker stopped");
                    workers.push(report);
                }
                Err(_) => {
                    tracing::error!(worker = %name, "worker panicked");
                    panicked.get_or_insert(name);
                }
            }
        }
        if let Some(name) = panicked {
            return Err(SimulationError::WorkerPanicked { name });
        }

        let final_state = match self.monitor.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(%err, "no final snapshot");
                None
            }
        };
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(SimulationReport {
            workers,
            stats: self.monitor.stats(),
            final_state,
            elapsed_ms,
        })
    }

    /// Starts a simulation, lets it run for `duration`, then shuts it down
    /// and joins it.
    pub fn run_for(config: SimulationConfig, duration: Duration) -> Result<SimulationReport, SimulationError> {
        let simulation = Self::start(config)?;
        // Sleeping on the monitor's own signal ends early if something else
        // closes it, e.g. a protocol violation.
        simulation.monitor.shutdown_signal().sleep(duration);
        simulation.shutdown();
        simulation.join()
    }
}

impl Drop for Simulation {
    /// An un-joined simulation still stops its workers.
    fn drop(&mut self) {
        self.monitor.close();
    }
}

/// Seeded per-worker generator. Each (role, id) gets its own ChaCha stream,
/// so worker randomness does not depend on spawn order.
fn worker_rng(seed: Option<u64>, role: Role, id: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(((role.index() as u64) << 32) | id as u64);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}
