//! Concurrency building blocks used by the access monitor.
//!
//! Important: these primitives only block and wake threads. What is being
//! protected, and under which rules, is decided by [`crate::monitor`].

pub mod sync;

pub use sync::{Condvar, Mutex, MutexGuard, ShutdownSignal};
