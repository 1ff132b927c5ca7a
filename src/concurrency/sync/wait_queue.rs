//! Intrusive FIFO of parked threads.

use crossbeam_utils::Backoff;
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomPinned;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};
use std::time::Instant;

/// A node in the intrusive wait queue.
/// Must be pinned to the stack of the waiting thread.
///
/// A node leaves the queue in exactly one of two ways: a waker pops it and
/// sets `notified` while holding the queue lock, or its owner unlinks it
/// after a timeout (also under the queue lock). The owner never returns
/// while the node is still linked.
pub struct WaitNode {
    thread: Thread,
    next: Cell<Option<NonNull<WaitNode>>>,
    prev: Cell<Option<NonNull<WaitNode>>>,
    notified: AtomicBool,
    _pin: PhantomPinned,
}

impl WaitNode {
    /// Creates an unlinked node for the current thread.
    pub fn new() -> Self {
        Self {
            thread: thread::current(),
            next: Cell::new(None),
            prev: Cell::new(None),
            notified: AtomicBool::new(false),
            _pin: PhantomPinned,
        }
    }

    /// Returns `true` once a waker has removed this node from its queue.
    #[inline]
    pub fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    /// Parks the current thread until this node is notified.
    pub fn park(&self) {
        while !self.is_notified() {
            thread::park();
        }
    }

    /// Parks until notified or `deadline` passes.
    ///
    /// Returns `true` if the node was notified. On timeout the node is
    /// unlinked from `queue` before returning, unless a waker got to it
    /// first, in which case the notification is reported instead.
    pub fn park_until(&self, queue: &WaitQueue, deadline: Instant) -> bool {
        loop {
            if self.is_notified() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }

        queue.lock();
        // Re-checked under the queue lock: a waker sets the flag only while
        // holding it, so the answer here is final.
        let notified = self.notified.load(Ordering::Relaxed);
        if !notified {
            unsafe { queue.unlink_locked(NonNull::from(self)) };
        }
        queue.unlock();
        notified
    }
}

impl Default for WaitNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A parked thread that has been removed from its queue and still needs an
/// unpark. Produced under the queue lock, consumed after releasing it.
#[must_use]
pub struct Wakeup(Thread);

impl Wakeup {
    /// Unparks the woken thread.
    #[inline]
    pub fn unpark(self) {
        self.0.unpark();
    }
}

/// A FIFO queue of waiting threads.
///
/// Uses a simple spinlock to protect the linked list operations.
/// Since operations are just pointer swaps, contention is minimal.
pub struct WaitQueue {
    head: UnsafeCell<Option<NonNull<WaitNode>>>,
    tail: UnsafeCell<Option<NonNull<WaitNode>>>,
    lock: AtomicBool,
}

impl WaitQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            head: UnsafeCell::new(None),
            tail: UnsafeCell::new(None),
            lock: AtomicBool::new(false),
        }
    }

    /// Takes the queue spinlock.
    pub fn lock(&self) {
        let backoff = Backoff::new();
        while self.lock.swap(true, Ordering::Acquire) {
            backoff.spin();
        }
    }

    /// Releases the queue spinlock.
    pub fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    /// Adds a node to the back of the queue (caller must hold lock).
    ///
    /// # Safety
    /// Caller must hold the lock. The node must stay valid and pinned until
    /// it is either notified or unlinked by its owner.
    pub unsafe fn push_locked(&self, node: NonNull<WaitNode>) {
        let tail_ptr = self.tail.get();
        let head_ptr = self.head.get();

        let n = node.as_ref();
        n.next.set(None);
        n.prev.set(*tail_ptr);
        n.notified.store(false, Ordering::Relaxed);

        if let Some(t) = *tail_ptr {
            t.as_ref().next.set(Some(node));
        } else {
            *head_ptr = Some(node);
        }
        *tail_ptr = Some(node);
    }

    /// Removes the head node, marks it notified and returns its thread.
    ///
    /// # Safety
    /// Caller must hold the lock.
    pub unsafe fn pop_locked(&self) -> Option<Wakeup> {
        let head_ptr = self.head.get();
        let tail_ptr = self.tail.get();

        let head = (*head_ptr)?;
        let n = head.as_ref();
        *head_ptr = n.next.get();
        match *head_ptr {
            Some(next) => next.as_ref().prev.set(None),
            None => *tail_ptr = None,
        }

        // The owner may return and drop the node as soon as it observes the
        // flag, so the thread handle is taken first.
        let thread = n.thread.clone();
        n.notified.store(true, Ordering::Release);
        Some(Wakeup(thread))
    }

    /// Unlinks a node that timed out.
    ///
    /// # Safety
    /// Caller must hold the lock and `node` must currently be linked here.
    unsafe fn unlink_locked(&self, node: NonNull<WaitNode>) {
        let n = node.as_ref();
        let prev = n.prev.get();
        let next = n.next.get();

        match prev {
            Some(p) => p.as_ref().next.set(next),
            None => *self.head.get() = next,
        }
        match next {
            Some(nx) => nx.as_ref().prev.set(prev),
            None => *self.tail.get() = prev,
        }
        n.next.set(None);
        n.prev.set(None);
    }

    /// Wakes at most one waiter.
    pub fn wake_one(&self) -> bool {
        self.lock();
        let wakeup = unsafe { self.pop_locked() };
        self.unlock();
        match wakeup {
            Some(w) => {
                w.unpark();
                true
            }
            None => false,
        }
    }

    /// Wakes every waiter currently queued and returns how many there were.
    pub fn wake_all(&self) -> usize {
        let mut wakeups = Vec::new();
        self.lock();
        while let Some(w) = unsafe { self.pop_locked() } {
            wakeups.push(w);
        }
        self.unlock();
        let count = wakeups.len();
        for w in wakeups {
            w.unpark();
        }
        count
    }

    /// Number of queued waiters. Walks the queue; diagnostics only.
    pub fn waiter_count(&self) -> usize {
        self.lock();
        let mut count = 0;
        let mut cursor = unsafe { *self.head.get() };
        while let Some(node) = cursor {
            count += 1;
            cursor = unsafe { node.as_ref().next.get() };
        }
        self.unlock();
        count
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Sync for WaitQueue {}
unsafe impl Send for WaitQueue {}
