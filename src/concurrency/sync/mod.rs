//! Blocking synchronization primitives.
//!
//! All of them park threads on the same intrusive [`WaitQueue`]: a spinlock
//! protected FIFO of stack-pinned nodes. A parked thread returns only after a
//! waker unlinked its node (or it unlinked itself on timeout), so spurious
//! unparks are harmless.

pub mod condvar;
pub mod mutex;
pub mod shutdown;
pub mod wait_queue;

pub use condvar::{Condvar, WaitTimeoutResult};
pub use mutex::{Mutex, MutexGuard};
pub use shutdown::ShutdownSignal;
pub use wait_queue::{WaitNode, WaitQueue};

#[cfg(test)]
mod tests;
