//! Reader, writer and eraser worker loops and the simulation that runs them.
//!
//! A [`Simulation`] owns one [`AccessMonitor`](crate::monitor::AccessMonitor)
//! and a thread per worker. Each worker cycles through
//! `enter -> use the list -> exit -> idle` until the monitor is closed.

pub mod config;
pub mod pool;
pub mod role_worker;

pub use config::{SimulationConfig, WorkerConfig};
pub use pool::{Simulation, SimulationReport};
pub use role_worker::{run_eraser, run_reader, run_role, run_writer, StopReason, WorkerReport};
