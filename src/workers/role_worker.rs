//! The reader, writer and eraser loops.
//!
//! Every loop runs `enter -> touch the list -> exit -> idle` until the
//! monitor is closed. The shutdown signal is checked before each admission
//! request, a blocked request is woken by `close`, and the idle pause (and a
//! reader's hold) sleeps on the same signal, so shutdown never waits for a
//! full cycle.

use crate::error::MonitorError;
use crate::monitor::{AccessMonitor, ActiveCounts, Role};
use crate::workers::config::WorkerConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The shutdown signal fired between cycles.
    Shutdown,
    /// An admission request was refused because the monitor closed.
    Cancelled,
    /// The monitor reported corrupted bookkeeping.
    ProtocolViolation(String),
}

impl From<MonitorError> for StopReason {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Cancelled | MonitorError::TimedOut { .. } => StopReason::Cancelled,
            MonitorError::ProtocolViolation { detail } => StopReason::ProtocolViolation(detail),
        }
    }
}

/// What one worker did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// The worker's role.
    pub role: Role,
    /// Index among workers of the same role.
    pub id: usize,
    /// Completed enter/exit cycles.
    pub cycles: u64,
    /// Readers: values observed. Writers: values appended. Erasers: values
    /// removed.
    pub values: u64,
    /// Cycles that found the list empty (readers and erasers).
    pub empty: u64,
    /// Appends that failed with an allocation failure (writers).
    pub allocation_failures: u64,
    /// Why the loop ended.
    pub stop: StopReason,
}

impl WorkerReport {
    fn new(role: Role, id: usize) -> Self {
        Self {
            role,
            id,
            cycles: 0,
            values: 0,
            empty: 0,
            allocation_failures: 0,
            stop: StopReason::Shutdown,
        }
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}: {} cycles, {} values, {} empty, {} allocation failures ({:?})",
            self.role, self.id, self.cycles, self.values, self.empty, self.allocation_failures, self.stop
        )
    }
}

fn log_active(role: Role, id: usize, what: &'static str, active: ActiveCounts) {
    tracing::info!(
        %role,
        worker = id,
        readers = active.readers,
        writers = active.writers,
        erasers = active.erasers,
        "{what}"
    );
}

/// Reader loop: picks a random element and holds read admission for
/// `read_hold_ms` while "reading" it.
pub fn run_reader<R: Rng>(monitor: &AccessMonitor, config: &WorkerConfig, id: usize, mut rng: R) -> WorkerReport {
    const ROLE: Role = Role::Reader;
    let mut report = WorkerReport::new(ROLE, id);
    let signal = monitor.shutdown_signal();

    while !signal.is_triggered() {
        let guard = match monitor.enter_read() {
            Ok(guard) => guard,
            Err(err) => {
                report.stop = err.into();
                return report;
            }
        };
        log_active(ROLE, id, "starts using the list", guard.counts());

        let value = guard.peek_random(&mut rng);
        signal.sleep(config.read_hold());

        match value {
            Some(value) => {
                report.values += 1;
                tracing::info!(role = %ROLE, worker = id, value, "reads value from the list");
            }
            None => {
                report.empty += 1;
                tracing::info!(role = %ROLE, worker = id, "list is empty");
            }
        }
        log_active(ROLE, id, "stops using the list", guard.counts());
        tracing::debug!(role = %ROLE, worker = id, list = %guard.snapshot_string());

        if let Err(err) = guard.exit() {
            report.stop = err.into();
            return report;
        }
        report.cycles += 1;

        signal.sleep(config.idle(&mut rng));
    }
    report
}

/// Writer loop: appends a random value. An allocation failure is logged and
/// the loop carries on.
pub fn run_writer<R: Rng>(monitor: &AccessMonitor, config: &WorkerConfig, id: usize, mut rng: R) -> WorkerReport {
    const ROLE: Role = Role::Writer;
    let mut report = WorkerReport::new(ROLE, id);
    let signal = monitor.shutdown_signal();

    while !signal.is_triggered() {
        let mut guard = match monitor.enter_write() {
            Ok(guard) => guard,
            Err(err) => {
                report.stop = err.into();
                return report;
            }
        };
        log_active(ROLE, id, "starts using the list", guard.counts());

        let value = config.value(&mut rng);
        match guard.append(value) {
            Ok(()) => {
                report.values += 1;
                tracing::info!(role = %ROLE, worker = id, value, "adds value to the end of the list");
            }
            Err(err) => {
                report.allocation_failures += 1;
                tracing::warn!(role = %ROLE, worker = id, value, %err, "append failed");
            }
        }
        tracing::debug!(role = %ROLE, worker = id, list = %guard.snapshot_string());
        log_active(ROLE, id, "stops using the list", guard.counts());

        if let Err(err) = guard.exit() {
            report.stop = err.into();
            return report;
        }
        report.cycles += 1;

        signal.sleep(config.idle(&mut rng));
    }
    report
}

/// Eraser loop: removes one element at a position drawn from the
/// configured removal bound.
pub fn run_eraser<R: Rng>(monitor: &AccessMonitor, config: &WorkerConfig, id: usize, mut rng: R) -> WorkerReport {
    const ROLE: Role = Role::Eraser;
    let mut report = WorkerReport::new(ROLE, id);
    let signal = monitor.shutdown_signal();

    while !signal.is_triggered() {
        let mut guard = match monitor.enter_erase() {
            Ok(guard) => guard,
            Err(err) => {
                report.stop = err.into();
                return report;
            }
        };
        log_active(ROLE, id, "starts using the list", guard.counts());
        tracing::debug!(role = %ROLE, worker = id, list = %guard.snapshot_string());

        match guard.remove_random(config.removal_bound, &mut rng) {
            Some(value) => {
                report.values += 1;
                tracing::info!(role = %ROLE, worker = id, deleted = value, "removes value from the list");
            }
            None => {
                report.empty += 1;
                tracing::info!(role = %ROLE, worker = id, "list is empty, nothing to remove");
            }
        }
        log_active(ROLE, id, "stops using the list", guard.counts());
        tracing::debug!(role = %ROLE, worker = id, list = %guard.snapshot_string());

        if let Err(err) = guard.exit() {
            report.stop = err.into();
            return report;
        }
        report.cycles += 1;

        signal.sleep(config.idle(&mut rng));
    }
    report
}

/// Runs the loop for `role`.
pub fn run_role<R: Rng>(role: Role, monitor: &AccessMonitor, config: &WorkerConfig, id: usize, rng: R) -> WorkerReport {
    match role {
        Role::Reader => run_reader(monitor, config, id, rng),
        Role::Writer => run_writer(monitor, config, id, rng),
        Role::Eraser => run_eraser(monitor, config, id, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::thread;

    #[test]
    fn test_worker_on_closed_monitor_stops_immediately() {
        let monitor = AccessMonitor::default();
        monitor.close();
        let config = WorkerConfig::immediate();
        for role in Role::ALL {
            let report = run_role(role, &monitor, &config, 0, ChaCha8Rng::seed_from_u64(0));
            assert_eq!(report.cycles, 0);
            assert_eq!(report.stop, StopReason::Shutdown);
        }
    }

    #[test]
    fn test_writer_keeps_going_after_allocation_failure() {
        let monitor = AccessMonitor::new(crate::collections::SharedList::with_capacity_limit(3));
        let config = WorkerConfig::immediate();
        let monitor = &monitor;

        let report = thread::scope(|s| {
            let h = s.spawn(move || run_writer(monitor, &config, 0, ChaCha8Rng::seed_from_u64(9)));
            while monitor.stats().granted(Role::Writer) < 10 {
                thread::yield_now();
            }
            monitor.close();
            h.join().unwrap()
        });

        assert_eq!(report.values, 3);
        assert!(report.allocation_failures >= 6);
        assert!(report.cycles >= 9);
        assert_eq!(monitor.snapshot().unwrap().list.len(), 3);
    }

    #[test]
    fn test_reader_counts_empty_observations() {
        let monitor = AccessMonitor::default();
        let config = WorkerConfig::immediate();
        let monitor = &monitor;

        let report = thread::scope(|s| {
            let h = s.spawn(move || run_reader(monitor, &config, 4, ChaCha8Rng::seed_from_u64(1)));
            while monitor.stats().granted(Role::Reader) < 5 {
                thread::yield_now();
            }
            monitor.close();
            h.join().unwrap()
        });

        assert_eq!(report.id, 4);
        assert_eq!(report.values, 0);
        assert_eq!(report.empty, report.cycles);
        assert!(report.cycles >= 4);
    }

    #[test]
    fn test_stop_reason_from_error() {
        assert_eq!(StopReason::from(MonitorError::Cancelled), StopReason::Cancelled);
        assert_eq!(
            StopReason::from(MonitorError::violation("x")),
            StopReason::ProtocolViolation("x".into())
        );
    }
}
