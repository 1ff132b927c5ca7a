//! Observability types.

use super::policy::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of workers holding admission, per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveCounts {
    /// Readers holding admission.
    pub readers: usize,
    /// Writers holding admission.
    pub writers: usize,
    /// Erasers holding admission.
    pub erasers: usize,
}

impl ActiveCounts {
    /// Counter for `role`.
    #[inline]
    pub const fn get(&self, role: Role) -> usize {
        match role {
            Role::Reader => self.readers,
            Role::Writer => self.writers,
            Role::Eraser => self.erasers,
        }
    }

    /// Mutable counter for `role`.
    #[inline]
    pub fn get_mut(&mut self, role: Role) -> &mut usize {
        match role {
            Role::Reader => &mut self.readers,
            Role::Writer => &mut self.writers,
            Role::Eraser => &mut self.erasers,
        }
    }

    /// Sum over all roles.
    pub const fn total(&self) -> usize {
        self.readers + self.writers + self.erasers
    }
}

impl fmt::Display for ActiveCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "readers={}, writers={}, erasers={}",
            self.readers, self.writers, self.erasers
        )
    }
}

/// Admission totals since the monitor was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStats {
    /// Admissions granted, indexed by [`Role::index`].
    pub granted: [u64; 3],
    /// Requests that had to wait at least once before being granted or
    /// giving up.
    pub blocked: [u64; 3],
}

impl AdmissionStats {
    /// Admissions granted to `role`.
    pub fn granted(&self, role: Role) -> u64 {
        self.granted[role.index()]
    }

    /// Requests of `role` that had to wait.
    pub fn blocked(&self, role: Role) -> u64 {
        self.blocked[role.index()]
    }
}

/// Counts and list contents taken together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Admissions held when the snapshot was taken.
    pub active: ActiveCounts,
    /// List contents, head first.
    pub list: Vec<i32>,
    /// Whether the monitor was closed.
    pub closed: bool,
}
