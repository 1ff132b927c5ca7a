//! listguard binary: runs the readers/writers/erasers simulation.
//!
//! # Usage
//!
//! ```bash
//! # The classic population (12 readers, 4 writers, 2 erasers), forever
//! listguard
//!
//! # A short, fast, reproducible run
//! listguard --idle-min-ms 10 --idle-max-ms 50 --read-hold-ms 20 --seed 7 --run-for-secs 5
//!
//! # Settings from a file, with one flag overriding it
//! listguard --config sim.json --wake-policy faithful
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use listguard::{ConfigError, RemovalBound, Simulation, SimulationConfig, WakePolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Readers/writers/erasers access monitor simulation
#[derive(Parser, Debug)]
#[command(name = "listguard")]
#[command(about = "Run reader, writer and eraser threads over one shared list")]
#[command(version)]
struct Args {
    /// JSON file with simulation settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of reader threads
    #[arg(long)]
    readers: Option<usize>,

    /// Number of writer threads
    #[arg(long)]
    writers: Option<usize>,

    /// Number of eraser threads
    #[arg(long)]
    erasers: Option<usize>,

    /// Shortest pause between cycles, in milliseconds
    #[arg(long)]
    idle_min_ms: Option<u64>,

    /// Longest pause between cycles, in milliseconds
    #[arg(long)]
    idle_max_ms: Option<u64>,

    /// How long a reader holds read admission, in milliseconds
    #[arg(long)]
    read_hold_ms: Option<u64>,

    /// Eraser position bound: a positive number or `live`
    #[arg(long, value_parser = parse_removal_bound)]
    removal_bound: Option<RemovalBound>,

    /// Wake-up table used on release (faithful, hardened)
    #[arg(long, value_parser = parse_wake_policy)]
    wake_policy: Option<WakePolicy>,

    /// Make readers and writers exclude each other
    #[arg(long)]
    strict: bool,

    /// Fail appends once the list holds this many elements
    #[arg(long)]
    list_capacity: Option<usize>,

    /// Seed for reproducible worker randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds; runs until killed otherwise
    #[arg(long)]
    run_for_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_removal_bound(s: &str) -> Result<RemovalBound, String> {
    if s.eq_ignore_ascii_case("live") {
        return Ok(RemovalBound::LiveLength);
    }
    let n: usize = s.parse().map_err(|_| format!("expected a number or `live`, got `{s}`"))?;
    RemovalBound::fixed(n).ok_or_else(|| ConfigError::ZeroRemovalBound.to_string())
}

fn parse_wake_policy(s: &str) -> Result<WakePolicy, String> {
    match s.to_ascii_lowercase().as_str() {
        "faithful" => Ok(WakePolicy::Faithful),
        "hardened" => Ok(WakePolicy::Hardened),
        other => Err(format!("unknown wake policy `{other}` (faithful, hardened)")),
    }
}

impl Args {
    fn into_config(self) -> Result<(SimulationConfig, Option<Duration>)> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                SimulationConfig::from_json(&json)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => SimulationConfig::default(),
        };

        if let Some(n) = self.readers {
            config.readers = n;
        }
        if let Some(n) = self.writers {
            config.writers = n;
        }
        if let Some(n) = self.erasers {
            config.erasers = n;
        }
        if let Some(ms) = self.idle_min_ms {
            config.worker.idle_min_ms = ms;
        }
        if let Some(ms) = self.idle_max_ms {
            config.worker.idle_max_ms = ms;
        }
        if let Some(ms) = self.read_hold_ms {
            config.worker.read_hold_ms = ms;
        }
        if let Some(bound) = self.removal_bound {
            config.worker.removal_bound = bound;
        }
        if let Some(policy) = self.wake_policy {
            config.wake_policy = policy;
        }
        if self.strict {
            config.strict_exclusion = true;
        }
        if self.list_capacity.is_some() {
            config.list_capacity = self.list_capacity;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate().context("invalid simulation settings")?;
        Ok((config, self.run_for_secs.map(Duration::from_secs)))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_thread_names(true)).with(filter).init();

    let (config, run_for) = args.into_config()?;
    tracing::debug!(config = %config.to_json()?, "effective settings");

    let simulation = Simulation::start(config).context("failed to start simulation")?;
    if let Some(duration) = run_for {
        simulation.monitor().shutdown_signal().sleep(duration);
        simulation.shutdown();
    }
    let report = simulation.join().context("simulation did not finish cleanly")?;

    for worker in &report.workers {
        tracing::info!(%worker, "worker report");
    }
    tracing::info!(report = %serde_json::to_string(&report)?, "final report");
    match &report.final_state {
        Some(snapshot) => tracing::info!(snapshot = %serde_json::to_string(snapshot)?, "final snapshot"),
        None => tracing::warn!("monitor was poisoned; no final snapshot"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "listguard",
            "--readers",
            "2",
            "--removal-bound",
            "live",
            "--wake-policy",
            "faithful",
            "--run-for-secs",
            "3",
        ]);
        let (config, run_for) = args.into_config().unwrap();
        assert_eq!(config.readers, 2);
        assert_eq!(config.writers, 4);
        assert_eq!(config.worker.removal_bound, RemovalBound::LiveLength);
        assert_eq!(config.wake_policy, WakePolicy::Faithful);
        assert_eq!(run_for, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(parse_removal_bound("0").is_err());
        assert!(parse_removal_bound("abc").is_err());
        assert_eq!(parse_removal_bound("7"), Ok(RemovalBound::fixed(7).unwrap()));
        assert!(parse_wake_policy("lazy").is_err());
        assert!(Args::parse_from(["listguard", "--idle-min-ms", "10", "--idle-max-ms", "5"])
            .into_config()
            .is_err());
    }

    #[test]
    fn test_missing_config_file_reports_path() {
        let err = Args::parse_from(["listguard", "--config", "/nonexistent/listguard.json"])
            .into_config()
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/listguard.json"));
    }
}
