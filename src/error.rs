//! Error types.

use crate::monitor::Role;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`SharedList`](crate::collections::SharedList).
///
/// An empty list is not an error; lookups return `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    /// Storage for a new node could not be obtained, either from the global
    /// allocator or because the list's capacity limit is reached.
    #[error("could not allocate a list node (list holds {len} elements)")]
    AllocationFailure {
        /// Length of the list at the time of the failed append.
        len: usize,
    },
}

/// Errors raised by [`AccessMonitor`](crate::monitor::AccessMonitor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The monitor was closed before or while the caller waited for
    /// admission.
    #[error("monitor is closed")]
    Cancelled,

    /// A bounded admission request ran out of time.
    #[error("{role} admission not granted within {waited:?}")]
    TimedOut {
        /// Role that asked for admission.
        role: Role,
        /// How long the caller waited.
        waited: Duration,
    },

    /// Admission bookkeeping is corrupted. The monitor refuses all further
    /// admissions once this has been observed.
    #[error("admission protocol violated: {detail}")]
    ProtocolViolation {
        /// What was inconsistent.
        detail: String,
    },
}

impl MonitorError {
    pub(crate) fn violation(detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            detail: detail.into(),
        }
    }
}

/// Errors raised while validating a [`SimulationConfig`](crate::workers::SimulationConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A `min..=max` style range has `min > max`.
    #[error("invalid {name} range: {min} > {max}")]
    InvertedRange {
        /// Name of the offending setting.
        name: &'static str,
        /// Lower bound as configured.
        min: String,
        /// Upper bound as configured.
        max: String,
    },

    /// The writer value range contains no integers.
    #[error("value range {start}..{end} is empty")]
    EmptyValueRange {
        /// Inclusive start.
        start: i32,
        /// Exclusive end.
        end: i32,
    },

    /// A fixed removal bound of zero was requested.
    #[error("removal bound must be at least 1")]
    ZeroRemovalBound,
}

/// Errors raised while starting or joining a [`Simulation`](crate::workers::Simulation).
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread {name}")]
    Spawn {
        /// Thread name.
        name: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("worker thread {name} panicked")]
    WorkerPanicked {
        /// Thread name.
        name: String,
    },
}
