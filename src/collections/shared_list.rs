//! `SharedList` - a singly linked list of integers with tail append and
//! random removal.
//!
//! Safety model:
//! - Links are atomic pointers. An append publishes the new node with a
//!   release store before bumping `len`, so a traversal that loaded `len`
//!   with acquire ordering can walk `len` nodes without ever reaching a
//!   half-initialized one.
//! - One appender may therefore run concurrently with any number of
//!   traversals. Removal unlinks and frees nodes and must run alone.
//! - Outside the crate only `&mut self` can mutate, so every public `&self`
//!   method is safe. The crate-internal shared mutators are `unsafe` and
//!   are only reached through admission guards, which supply the exclusion.

use crate::error::ListError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::alloc::{self, Layout};
use std::fmt;
use std::num::NonZeroUsize;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// How `remove_random` picks the position to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalBound {
    /// Draw the position from `0..n` regardless of the list's length and
    /// clamp it to the last node.
    ///
    /// When `n` exceeds the length, every overshooting draw lands on the
    /// tail, so the tail is removed far more often than other nodes. When
    /// the length exceeds `n`, nodes at position `n` and beyond are never
    /// chosen and removal concentrates near the head.
    Fixed(NonZeroUsize),
    /// Draw uniformly over the live length.
    LiveLength,
}

impl RemovalBound {
    /// Bound used by the classic simulation: one more than the default
    /// number of readers.
    pub const DEFAULT_FIXED: usize = 13;

    /// `Fixed(n)`, or `None` for `n == 0`.
    pub fn fixed(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Self::Fixed)
    }

    /// Picks a position for a list of `len > 0` elements, already clamped.
    pub fn pick<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> usize {
        debug_assert!(len > 0);
        let drawn = match *self {
            Self::Fixed(n) => rng.gen_range(0..n.get()),
            Self::LiveLength => rng.gen_range(0..len),
        };
        drawn.min(len - 1)
    }
}

impl Default for RemovalBound {
    fn default() -> Self {
        Self::Fixed(NonZeroUsize::new(Self::DEFAULT_FIXED).unwrap_or(NonZeroUsize::MIN))
    }
}

impl fmt::Display for RemovalBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "fixed({n})"),
            Self::LiveLength => f.write_str("live"),
        }
    }
}

struct Node {
    value: i32,
    next: AtomicPtr<Node>,
}

impl Node {
    /// Allocates a detached node, reporting allocator failure instead of
    /// aborting.
    fn alloc(value: i32) -> Option<NonNull<Node>> {
        let layout = Layout::new::<Node>();
        // SAFETY: `Node` is not zero-sized.
        let raw = unsafe { alloc::alloc(layout) }.cast::<Node>();
        let node = NonNull::new(raw)?;
        // SAFETY: freshly allocated with the layout of `Node`.
        unsafe {
            node.as_ptr().write(Node {
                value,
                next: AtomicPtr::new(ptr::null_mut()),
            });
        }
        Some(node)
    }

    /// # Safety
    /// `node` must come from [`Node::alloc`] and be unreachable from any list.
    unsafe fn free(node: *mut Node) {
        // Same global allocator and layout as `alloc`.
        drop(Box::from_raw(node));
    }
}

/// An ordered list of `i32` with O(1) tail append.
pub struct SharedList {
    head: AtomicPtr<Node>,
    tail: AtomicPtr<Node>,
    len: AtomicUsize,
    capacity: Option<usize>,
}

// SAFETY: the list owns its nodes; cross-thread mutation goes through the
// `unsafe` shared mutators whose contracts require external exclusion.
unsafe impl Send for SharedList {}
unsafe impl Sync for SharedList {}

impl SharedList {
    /// Creates an empty list with no length limit.
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            capacity: None,
        }
    }

    /// Creates an empty list whose appends fail with
    /// [`ListError::AllocationFailure`] once it holds `capacity` elements.
    pub const fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            capacity: Some(capacity),
        }
    }

    /// Returns the number of elements in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured length limit, if any.
    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity
    }

    /// Inserts `value` at the tail.
    pub fn append(&mut self, value: i32) -> Result<(), ListError> {
        // SAFETY: `&mut self` excludes every other access.
        unsafe { self.append_shared(value) }
    }

    /// Removes one element at a position chosen by `bound`, or returns `None`
    /// if the list is empty. A non-empty list always loses exactly one
    /// element.
    pub fn remove_random<R: Rng + ?Sized>(&mut self, bound: RemovalBound, rng: &mut R) -> Option<i32> {
        // SAFETY: `&mut self` excludes every other access.
        unsafe { self.remove_random_shared(bound, rng) }
    }

    /// Returns an element chosen uniformly at random, or `None` if the list
    /// is empty.
    pub fn peek_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i32> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.iter().nth(rng.gen_range(0..len))
    }

    /// Iterates the elements from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            current: self.head.load(Ordering::Acquire),
            remaining: self.len(),
            _list: self,
        }
    }

    /// Copies the elements out, head first.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    /// Renders the elements as `[a, b, c]`. Observability only.
    pub fn snapshot_string(&self) -> String {
        let mut out = String::with_capacity(2 + self.len() * 4);
        out.push('[');
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&value.to_string());
        }
        out.push(']');
        out
    }

    /// Appends through a shared reference.
    ///
    /// # Safety
    /// No other append or removal may run concurrently. Concurrent
    /// traversals are allowed.
    pub(crate) unsafe fn append_shared(&self, value: i32) -> Result<(), ListError> {
        let len = self.len.load(Ordering::Relaxed);
        if self.capacity.is_some_and(|cap| len >= cap) {
            return Err(ListError::AllocationFailure { len });
        }
        let node = Node::alloc(value).ok_or(ListError::AllocationFailure { len })?.as_ptr();

        let tail = self.tail.load(Ordering::Relaxed);
        if tail.is_null() {
            self.head.store(node, Ordering::Release);
        } else {
            (*tail).next.store(node, Ordering::Release);
        }
        self.tail.store(node, Ordering::Relaxed);
        self.len.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Removes through a shared reference.
    ///
    /// # Safety
    /// No other access of any kind may run concurrently.
    pub(crate) unsafe fn remove_random_shared<R: Rng + ?Sized>(
        &self,
        bound: RemovalBound,
        rng: &mut R,
    ) -> Option<i32> {
        let len = self.len.load(Ordering::Acquire);
        if len == 0 {
            return None;
        }
        let position = bound.pick(len, rng);

        let mut previous: *mut Node = ptr::null_mut();
        let mut current = self.head.load(Ordering::Acquire);
        for _ in 0..position {
            previous = current;
            current = (*current).next.load(Ordering::Acquire);
        }

        let next = (*current).next.load(Ordering::Relaxed);
        if previous.is_null() {
            self.head.store(next, Ordering::Release);
        } else {
            (*previous).next.store(next, Ordering::Release);
        }
        if current == self.tail.load(Ordering::Relaxed) {
            self.tail.store(previous, Ordering::Relaxed);
        }
        self.len.fetch_sub(1, Ordering::Release);

        let value = (*current).value;
        Node::free(current);
        Some(value)
    }
}

impl Default for SharedList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SharedList {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            // SAFETY: exclusive access; every reachable node came from `Node::alloc`.
            unsafe {
                let next = (*current).next.load(Ordering::Relaxed);
                Node::free(current);
                current = next;
            }
        }
    }
}

impl fmt::Debug for SharedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for SharedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.snapshot_string())
    }
}

impl Extend<i32> for SharedList {
    /// Appends every value, stopping silently at the capacity limit.
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        for value in iter {
            if self.append(value).is_err() {
                break;
            }
        }
    }
}

impl FromIterator<i32> for SharedList {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

/// Iterator over a [`SharedList`], head first.
///
/// Yields at most the number of elements the list held when the iterator was
/// created; nodes appended afterwards are not visited.
pub struct Iter<'a> {
    current: *mut Node,
    remaining: usize,
    _list: &'a SharedList,
}

impl Iterator for Iter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 || self.current.is_null() {
            return None;
        }
        // SAFETY: `remaining` counts nodes published before `len` was read,
        // and nothing frees nodes while a shared borrow of the list is live.
        let node = unsafe { &*self.current };
        self.current = node.next.load(Ordering::Acquire);
        self.remaining -= 1;
        Some(node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<'a> IntoIterator for &'a SharedList {
    type Item = i32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
