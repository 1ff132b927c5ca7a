//! One-shot shutdown signal with interruptible sleeps.

use super::wait_queue::{WaitNode, WaitQueue};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A flag that flips once from "running" to "shutting down" and wakes every
/// thread sleeping on it.
///
/// The flag is checked under the wait queue's lock before a sleeper enqueues
/// itself, and [`trigger`](Self::trigger) drains the queue under the same
/// lock after setting it, so a sleeper either sees the flag or gets woken.
pub struct ShutdownSignal {
    triggered: AtomicBool,
    sleepers: WaitQueue,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub const fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            sleepers: WaitQueue::new(),
        }
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Flips the signal and wakes all sleepers. Returns `false` if it had
    /// already been triggered.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sleepers.wake_all();
        true
    }

    /// Sleeps for `duration` unless the signal fires first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if interrupted
    /// (or already triggered on entry).
    pub fn sleep(&self, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            self.wait();
            return false;
        };

        let node = WaitNode::new();
        let node_ptr = NonNull::from(&node);

        unsafe {
            self.sleepers.lock();
            if self.triggered.load(Ordering::Acquire) {
                self.sleepers.unlock();
                return false;
            }
            self.sleepers.push_locked(node_ptr);
            self.sleepers.unlock();
        }

        !node.park_until(&self.sleepers, deadline)
    }

    /// Blocks until the signal is triggered.
    pub fn wait(&self) {
        let node = WaitNode::new();
        let node_ptr = NonNull::from(&node);

        unsafe {
            self.sleepers.lock();
            if self.triggered.load(Ordering::Acquire) {
                self.sleepers.unlock();
                return;
            }
            self.sleepers.push_locked(node_ptr);
            self.sleepers.unlock();
        }

        node.park();
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish_non_exhaustive()
    }
}
