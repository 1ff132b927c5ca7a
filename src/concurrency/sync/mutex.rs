//! Parking mutex: spins briefly, then queues and parks.

use super::wait_queue::{WaitNode, WaitQueue};
use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};

const UNLOCKED: u8 = 0;
const LOCKED: u8 = 1;
const CONTENDED: u8 = 2;

/// A blocking mutex with a spin phase followed by parking on an intrusive
/// wait queue.
///
/// There is no poisoning: a panic while the guard is held simply unlocks.
///
/// # States
/// - 0: Unlocked
/// - 1: Locked, no waiters (likely)
/// - 2: Locked, waiters may exist (contended)
pub struct Mutex<T: ?Sized> {
    state: AtomicU8,
    queue: WaitQueue,
    data: UnsafeCell<T>,
}

// Safety: Mutex provides exclusive access.
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates an unlocked mutex holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU8::new(UNLOCKED),
            queue: WaitQueue::new(),
            data: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the lock, spinning briefly and then parking.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return MutexGuard { mutex: self };
        }
        self.lock_slow()
    }

    /// Acquires the lock only if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| MutexGuard { mutex: self })
    }

    #[cold]
    fn lock_slow(&self) -> MutexGuard<'_, T> {
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if self.state.load(Ordering::Relaxed) == UNLOCKED {
                if let Some(guard) = self.try_lock() {
                    return guard;
                }
            }
            backoff.snooze();
        }

        loop {
            let node = WaitNode::new();
            let node_ptr = NonNull::from(&node);

            unsafe {
                self.queue.lock();

                // Marking contended under the queue lock; if the previous
                // state was unlocked we now own it.
                if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                    self.queue.unlock();
                    return MutexGuard { mutex: self };
                }

                self.queue.push_locked(node_ptr);
                self.queue.unlock();
            }

            node.park();
        }
    }

    fn unlock(&self) {
        if self
            .state
            .compare_exchange(LOCKED, UNLOCKED, Ordering::Release, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
        self.unlock_slow();
    }

    #[cold]
    fn unlock_slow(&self) {
        let wakeup = unsafe {
            self.queue.lock();
            self.state.store(UNLOCKED, Ordering::Release);
            let wakeup = self.queue.pop_locked();
            self.queue.unlock();
            wakeup
        };
        if let Some(w) = wakeup {
            w.unpark();
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

/// Holds the lock; unlocks on drop.
pub struct MutexGuard<'a, T: ?Sized> {
    pub(super) mutex: &'a Mutex<T>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
