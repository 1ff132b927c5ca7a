//! Worker and simulation settings.

use crate::collections::RemovalBound;
use crate::error::ConfigError;
use crate::monitor::{ExclusionPolicy, WakePolicy};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What every worker loop needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Shortest idle pause between cycles.
    pub idle_min_ms: u64,
    /// Longest idle pause between cycles, inclusive.
    pub idle_max_ms: u64,
    /// How long a reader keeps read admission after picking its value.
    pub read_hold_ms: u64,
    /// Smallest value a writer appends.
    pub value_min: i32,
    /// Writers append values strictly below this.
    pub value_max: i32,
    /// Position bound used by erasers.
    pub removal_bound: RemovalBound,
}

impl WorkerConfig {
    /// Settings with no pauses at all, for tests and benchmarks.
    pub fn immediate() -> Self {
        Self {
            idle_min_ms: 0,
            idle_max_ms: 0,
            read_hold_ms: 0,
            ..Self::default()
        }
    }

    /// Rejects inverted idle ranges and empty value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_min_ms > self.idle_max_ms {
            return Err(ConfigError::InvertedRange {
                name: "idle",
                min: format!("{}ms", self.idle_min_ms),
                max: format!("{}ms", self.idle_max_ms),
            });
        }
        if self.value_min >= self.value_max {
            return Err(ConfigError::EmptyValueRange {
                start: self.value_min,
                end: self.value_max,
            });
        }
        Ok(())
    }

    /// A random idle pause in `idle_min_ms..=idle_max_ms`.
    pub fn idle<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.idle_min_ms..=self.idle_max_ms))
    }

    /// How long a reader holds admission.
    pub fn read_hold(&self) -> Duration {
        Duration::from_millis(self.read_hold_ms)
    }

    /// A random value for a writer to append.
    pub fn value<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        rng.gen_range(self.value_min..self.value_max)
    }
}

impl Default for WorkerConfig {
    /// Pauses of 5 to 9 seconds, a 4 second read, values below 100 and a
    /// removal bound of 13.
    fn default() -> Self {
        Self {
            idle_min_ms: 5_000,
            idle_max_ms: 9_000,
            read_hold_ms: 4_000,
            value_min: 0,
            value_max: 100,
            removal_bound: RemovalBound::default(),
        }
    }
}

/// Everything needed to start a [`Simulation`](super::Simulation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Reader threads.
    pub readers: usize,
    /// Writer threads.
    pub writers: usize,
    /// Eraser threads.
    pub erasers: usize,
    /// Appends beyond this many elements fail with an allocation failure.
    pub list_capacity: Option<usize>,
    /// Wake-up table used on release.
    pub wake_policy: WakePolicy,
    /// Make readers and writers exclude each other as well.
    pub strict_exclusion: bool,
    /// Seed for reproducible worker randomness; `None` draws from the OS.
    pub seed: Option<u64>,
    /// Settings shared by every worker loop.
    #[serde(flatten)]
    pub worker: WorkerConfig,
}

impl SimulationConfig {
    /// Parses settings; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validates the worker settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.worker.validate()
    }

    /// STRICT when `strict_exclusion` is set, STANDARD otherwise.
    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        if self.strict_exclusion {
            ExclusionPolicy::STRICT
        } else {
            ExclusionPolicy::STANDARD
        }
    }

    /// Threads the simulation will spawn.
    pub fn total_workers(&self) -> usize {
        self.readers + self.writers + self.erasers
    }
}

impl Default for SimulationConfig {
    /// 12 readers, 4 writers, 2 erasers.
    fn default() -> Self {
        Self {
            readers: 12,
            writers: 4,
            erasers: 2,
            list_capacity: None,
            wake_policy: WakePolicy::default(),
            strict_exclusion: false,
            seed: None,
            worker: WorkerConfig::default(),
        }
    }
}
