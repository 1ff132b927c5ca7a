//! Condition variable over the intrusive wait queue.

use super::mutex::MutexGuard;
use super::wait_queue::{WaitNode, WaitQueue};
use std::ptr::NonNull;
use std::time::{Duration, Instant};

/// Outcome of a bounded condvar wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    /// `true` if the deadline passed without a notification.
    pub fn timed_out(&self) -> bool {
        self.0
    }
}

/// A Condition Variable that works with [`Mutex`](super::Mutex).
///
/// Waiters are queued in arrival order, but a woken waiter still has to
/// re-acquire the mutex, so no fairness is implied. Notifications sent while
/// nobody waits are lost, as with pthread condition variables.
pub struct Condvar {
    queue: WaitQueue,
}

impl Condvar {
    /// Creates a condvar with no waiters.
    pub const fn new() -> Self {
        Self {
            queue: WaitQueue::new(),
        }
    }

    /// Blocks the current thread until this condition variable is notified.
    ///
    /// The `guard` is consumed (lock released), the thread blocks, and then
    /// the lock is re-acquired and a new guard returned.
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex;

        let node = WaitNode::new();
        let node_ptr = NonNull::from(&node);

        // Enqueued before the mutex is released, so a notifier that takes the
        // mutex after us is guaranteed to see this node.
        unsafe {
            self.queue.lock();
            self.queue.push_locked(node_ptr);
            self.queue.unlock();
        }

        drop(guard);
        node.park();
        mutex.lock()
    }

    /// Like [`wait`](Self::wait) but gives up at `deadline`.
    pub fn wait_until<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Instant,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        let mutex = guard.mutex;

        let node = WaitNode::new();
        let node_ptr = NonNull::from(&node);

        unsafe {
            self.queue.lock();
            self.queue.push_locked(node_ptr);
            self.queue.unlock();
        }

        drop(guard);
        let notified = node.park_until(&self.queue, deadline);
        (mutex.lock(), WaitTimeoutResult(!notified))
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(guard, deadline),
            None => (self.wait(guard), WaitTimeoutResult(false)),
        }
    }

    /// Wakes up one blocked thread on this condvar.
    pub fn notify_one(&self) -> bool {
        self.queue.wake_one()
    }

    /// Wakes up all blocked threads on this condvar.
    pub fn notify_all(&self) -> usize {
        self.queue.wake_all()
    }

    /// Number of threads currently blocked here.
    pub fn waiters(&self) -> usize {
        self.queue.waiter_count()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: Condvar is thread-safe.
unsafe impl Sync for Condvar {}
unsafe impl Send for Condvar {}
