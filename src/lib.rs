//! # `listguard` - Readers/Writers/Erasers Access Monitor
//!
//! A monitor that admits three classes of threads to one shared singly linked
//! list of integers, plus the worker simulation that exercises it.
//!
//! ## Roles
//!
//! - **Readers** observe the list. Any number may be active at once.
//! - **Writers** append at the tail. At most one is active at a time.
//! - **Erasers** remove an element. An eraser is active alone.
//!
//! Readers and writers do not exclude each other: an append only touches the
//! tail and publishes the new node with a single release store, so a reader
//! walking the list sees either the old or the new tail, never a torn node.
//! [`ExclusionPolicy::STRICT`] adds reader/writer exclusion for callers that
//! want it.
//!
//! ## Architecture
//!
//! 1. **Synchronization** ([`concurrency::sync`]):
//!    - A parking [`Mutex`](concurrency::Mutex) and a
//!      [`Condvar`](concurrency::Condvar) over an intrusive wait queue
//!    - A [`ShutdownSignal`](concurrency::ShutdownSignal) for interruptible sleeps
//!
//! 2. **Shared list** ([`SharedList`]):
//!    - Tail append that is safe to run alongside readers
//!    - Random removal with a configurable [`RemovalBound`]
//!
//! 3. **Monitor** ([`AccessMonitor`]):
//!    - Admission counters under one mutex, one condition per role
//!    - Exclusion and wake-up rules as data ([`ExclusionPolicy`], [`WakePolicy`])
//!    - RAII guards ([`ReadGuard`], [`WriteGuard`], [`EraseGuard`]) that
//!      release admission on drop
//!
//! 4. **Workers** ([`workers`]):
//!    - Reader, writer and eraser loops
//!    - [`Simulation`] spawning the classic 12/4/2 population
//!
//! ## Example
//!
//! ```rust
//! use listguard::{AccessMonitor, SharedList};
//!
//! let monitor = AccessMonitor::new(SharedList::new());
//!
//! let mut writer = monitor.enter_write()?;
//! writer.append(5)?;
//! assert_eq!(writer.to_vec(), vec![5]);
//! writer.exit()?;
//!
//! let reader = monitor.enter_read()?;
//! assert_eq!(reader.snapshot_string(), "[5]");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod collections;
pub mod concurrency;
pub mod error;
pub mod monitor;
pub mod workers;

pub use collections::{RemovalBound, SharedList};
pub use error::{ConfigError, ListError, MonitorError, SimulationError};
pub use monitor::{
    AccessMonitor, ActiveCounts, AdmissionStats, EraseGuard, ExclusionPolicy, MonitorSnapshot, ReadGuard, Role,
    WakePolicy, WriteGuard,
};
pub use workers::{Simulation, SimulationConfig, SimulationReport, WorkerConfig, WorkerReport};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // A guard is a monitor reference plus a role and a flag.
    assert!(mem::size_of::<ReadGuard<'static>>() <= mem::size_of::<usize>() * 2);
};
