//! RAII admission guards.
//!
//! A guard is the proof that its holder was admitted under a role, and it
//! exposes only the list operations that role's exclusion makes sound.
//! Dropping a guard exits the monitor; [`exit`](ReadGuard::exit) does the
//! same but reports bookkeeping errors to the caller.

use super::snapshot::MonitorSnapshot;
use super::{AccessMonitor, ActiveCounts, Role};
use crate::collections::RemovalBound;
use crate::error::{ListError, MonitorError};
use rand::Rng;
use std::fmt;

struct Admission<'a> {
    monitor: &'a AccessMonitor,
    role: Role,
    released: bool,
}

impl<'a> Admission<'a> {
    fn new(monitor: &'a AccessMonitor, role: Role) -> Self {
        Self {
            monitor,
            role,
            released: false,
        }
    }

    fn release(&mut self) -> Result<(), MonitorError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.monitor.release(self.role)
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(role = %self.role, %err, "release on drop failed");
        }
    }
}

/// Methods every guard has: read-only list access, counters and exit.
macro_rules! common_guard_methods {
    ($guard:ident) => {
        impl<'a> $guard<'a> {
            pub(super) fn new(monitor: &'a AccessMonitor) -> Self {
                Self {
                    admission: Admission::new(monitor, Self::ROLE),
                }
            }

            /// The role this guard was admitted under.
            pub fn role(&self) -> Role {
                Self::ROLE
            }

            /// The monitor that granted this admission.
            pub fn monitor(&self) -> &'a AccessMonitor {
                self.admission.monitor
            }

            /// Lock-free view of the monitor's counters.
            pub fn counts(&self) -> ActiveCounts {
                self.admission.monitor.counts()
            }

            /// Number of elements in the list.
            pub fn len(&self) -> usize {
                self.admission.monitor.list().len()
            }

            /// Whether the list has no elements.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// The list contents, head first.
            pub fn to_vec(&self) -> Vec<i32> {
                self.admission.monitor.list().to_vec()
            }

            /// The list rendered as `[a, b, c]`.
            pub fn snapshot_string(&self) -> String {
                self.admission.monitor.list().snapshot_string()
            }

            /// Counters and list contents. The counters include this guard's
            /// own admission.
            pub fn snapshot(&self) -> MonitorSnapshot {
                MonitorSnapshot {
                    active: self.counts(),
                    list: self.to_vec(),
                    closed: self.admission.monitor.is_closed(),
                }
            }

            /// Exits the monitor. Never blocks beyond taking the monitor
            /// lock; may wake waiting requests.
            pub fn exit(mut self) -> Result<(), MonitorError> {
                self.admission.release()
            }
        }

        impl fmt::Debug for $guard<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($guard))
                    .field("released", &self.admission.released)
                    .finish_non_exhaustive()
            }
        }
    };
}

/// Read admission. Erasers are excluded while it is held.
#[must_use = "dropping the guard exits the monitor immediately"]
pub struct ReadGuard<'a> {
    admission: Admission<'a>,
}

impl ReadGuard<'_> {
    const ROLE: Role = Role::Reader;

    /// An element chosen uniformly at random, or `None` if the list is empty.
    pub fn peek_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i32> {
        self.admission.monitor.list().peek_random(rng)
    }
}

common_guard_methods!(ReadGuard);

/// Write admission. Other writers and erasers are excluded while it is held;
/// readers may still be active.
#[must_use = "dropping the guard exits the monitor immediately"]
pub struct WriteGuard<'a> {
    admission: Admission<'a>,
}

impl WriteGuard<'_> {
    const ROLE: Role = Role::Writer;

    /// Inserts `value` at the tail.
    pub fn append(&mut self, value: i32) -> Result<(), ListError> {
        // SAFETY: write admission excludes every other appender and every
        // eraser, and `&mut self` keeps this guard from appending twice at
        // once. Concurrent readers are fine for the list.
        unsafe { self.admission.monitor.list().append_shared(value) }
    }

    /// An element chosen uniformly at random, or `None` if the list is empty.
    pub fn peek_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i32> {
        self.admission.monitor.list().peek_random(rng)
    }
}

common_guard_methods!(WriteGuard);

/// Erase admission. Nobody else holds admission while it is held.
#[must_use = "dropping the guard exits the monitor immediately"]
pub struct EraseGuard<'a> {
    admission: Admission<'a>,
}

impl EraseGuard<'_> {
    const ROLE: Role = Role::Eraser;

    /// Removes one element at a position chosen by `bound`, or returns
    /// `None` if the list is empty.
    pub fn remove_random<R: Rng + ?Sized>(&mut self, bound: RemovalBound, rng: &mut R) -> Option<i32> {
        // SAFETY: erase admission excludes every other admission, and
        // `&mut self` rules out overlapping calls through this guard.
        unsafe { self.admission.monitor.list().remove_random_shared(bound, rng) }
    }
}

common_guard_methods!(EraseGuard);
