//! Admission and wake-up rules, kept as plain tables so they can be audited
//! and tested without running any threads.

use super::snapshot::ActiveCounts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A class of worker with its own admission predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Looks at the list without changing it.
    Reader,
    /// Appends at the tail.
    Writer,
    /// Unlinks and frees a node.
    Eraser,
}

impl Role {
    /// Every role, in table order.
    pub const ALL: [Role; 3] = [Role::Reader, Role::Writer, Role::Eraser];

    /// Position of this role in the policy tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Role::Reader => 0,
            Role::Writer => 1,
            Role::Eraser => 2,
        }
    }

    /// Lower-case role name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Eraser => "eraser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which active roles block an admission request.
///
/// `excludes(requester, holder)` is `true` when a request by `requester` has
/// to wait while any `holder` is active. Only the two built-in tables exist:
/// the list relies on erasers excluding everyone and writers excluding each
/// other, and both tables keep that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExclusionPolicy {
    table: [[bool; 3]; 3],
}

impl ExclusionPolicy {
    /// Erasers exclude everyone; writers exclude writers and erasers;
    /// readers exclude only erasers. A reader and a writer may be active at
    /// the same time, since an append never touches nodes a reader can
    /// already reach.
    pub const STANDARD: Self = Self {
        table: [
            //            reader  writer  eraser
            /* reader */ [false, false, true],
            /* writer */ [false, true, true],
            /* eraser */ [true, true, true],
        ],
    };

    /// Like [`STANDARD`](Self::STANDARD) but readers and writers also exclude
    /// each other.
    pub const STRICT: Self = Self {
        table: [
            //            reader  writer  eraser
            /* reader */ [false, true, true],
            /* writer */ [true, true, true],
            /* eraser */ [true, true, true],
        ],
    };

    /// Whether `requester` must wait while `holder` is active.
    #[inline]
    pub const fn excludes(&self, requester: Role, holder: Role) -> bool {
        self.table[requester.index()][holder.index()]
    }

    /// Whether `requester` is blocked by the given active counts.
    pub fn blocks(&self, requester: Role, active: &ActiveCounts) -> bool {
        Role::ALL
            .iter()
            .any(|&holder| self.excludes(requester, holder) && active.get(holder) > 0)
    }

    /// Whether `a` and `b` can hold admission at the same time.
    pub const fn compatible(&self, a: Role, b: Role) -> bool {
        !self.excludes(a, b) && !self.excludes(b, a)
    }

    /// Checks that `active` is a state this policy can produce.
    pub fn check(&self, active: &ActiveCounts) -> Result<(), String> {
        for a in Role::ALL {
            for b in Role::ALL {
                let overlap = if a == b {
                    active.get(a) > 1
                } else {
                    active.get(a) > 0 && active.get(b) > 0
                };
                if overlap && !self.compatible(a, b) {
                    return Err(format!("{a} and {b} active together ({active})"));
                }
            }
        }
        Ok(())
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// How many waiters a notification releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notify {
    /// Release a single waiter.
    One,
    /// Release every waiter.
    All,
}

/// One notification sent when a role releases admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wake {
    /// The condition whose waiters are notified, named by the role waiting
    /// on it.
    pub condition: Role,
    /// How many of its waiters to release.
    pub notify: Notify,
    /// Skip the notification unless a `condition` request would now be
    /// admitted.
    pub only_if_admissible: bool,
}

impl Wake {
    const fn one(condition: Role) -> Self {
        Self {
            condition,
            notify: Notify::One,
            only_if_admissible: false,
        }
    }

    const fn all(condition: Role) -> Self {
        Self {
            condition,
            notify: Notify::All,
            only_if_admissible: false,
        }
    }
}

/// Which wake-up table the monitor uses on release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakePolicy {
    /// The classic table. An eraser release never notifies waiting erasers
    /// and a reader release never notifies them either, so with two or more
    /// erasers and no writer activity an eraser can wait forever.
    Faithful,
    /// The classic table plus the missing eraser notifications.
    #[default]
    Hardened,
}

const FAITHFUL_READER: &[Wake] = &[Wake::one(Role::Writer)];
const FAITHFUL_ERASER: &[Wake] = &[Wake::all(Role::Reader), Wake::all(Role::Writer)];

const HARDENED_READER: &[Wake] = &[
    Wake::one(Role::Writer),
    Wake {
        condition: Role::Eraser,
        notify: Notify::One,
        only_if_admissible: true,
    },
];
const HARDENED_ERASER: &[Wake] = &[
    Wake::all(Role::Reader),
    Wake::all(Role::Writer),
    Wake::all(Role::Eraser),
];

const WRITER: &[Wake] = &[Wake::all(Role::Reader), Wake::all(Role::Writer), Wake::all(Role::Eraser)];

impl WakePolicy {
    /// Notifications to send after `role` released admission, in order.
    pub const fn on_release(self, role: Role) -> &'static [Wake] {
        match (self, role) {
            (WakePolicy::Faithful, Role::Reader) => FAITHFUL_READER,
            (WakePolicy::Hardened, Role::Reader) => HARDENED_READER,
            (_, Role::Writer) => WRITER,
            (WakePolicy::Faithful, Role::Eraser) => FAITHFUL_ERASER,
            (WakePolicy::Hardened, Role::Eraser) => HARDENED_ERASER,
        }
    }

    /// Whether a release of `role` ever notifies `condition`.
    pub fn notifies(self, role: Role, condition: Role) -> bool {
        self.on_release(role).iter().any(|w| w.condition == condition)
    }
}

impl fmt::Display for WakePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WakePolicy::Faithful => "faithful",
            WakePolicy::Hardened => "hardened",
        })
    }
}
