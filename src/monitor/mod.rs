//! The readers/writers/erasers access monitor.
//!
//! One [`Mutex`] protects the admission counters, and one [`Condvar`] per
//! role queues the requests of that role. The lock is held only while a
//! predicate is checked or a counter changes; the list itself is touched
//! after the lock is released, under the exclusion the admission grants.
//!
//! | Role   | Waits while                    | On release notifies        |
//! |--------|--------------------------------|----------------------------|
//! | reader | eraser active                  | one writer                 |
//! | writer | writer or eraser active        | all readers, writers, erasers |
//! | eraser | anyone active                  | all readers and writers    |
//!
//! The release column is the [`WakePolicy::Faithful`] table.
//! [`WakePolicy::Hardened`] additionally wakes erasers; see [`WakePolicy`].

pub mod guard;
pub mod policy;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use guard::{EraseGuard, ReadGuard, WriteGuard};
pub use policy::{ExclusionPolicy, Notify, Role, Wake, WakePolicy};
pub use snapshot::{ActiveCounts, AdmissionStats, MonitorSnapshot};

use crate::collections::SharedList;
use crate::concurrency::{Condvar, Mutex, MutexGuard, ShutdownSignal};
use crate::error::MonitorError;
use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct AdmissionState {
    active: ActiveCounts,
    closed: bool,
    poisoned: Option<String>,
}

/// Who is asking for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requester {
    Worker,
    /// Diagnostics; still admitted after `close`.
    Observer,
}

impl AdmissionState {
    fn ensure_open(&self, requester: Requester) -> Result<(), MonitorError> {
        if let Some(detail) = &self.poisoned {
            return Err(MonitorError::violation(detail.clone()));
        }
        if self.closed && requester == Requester::Worker {
            return Err(MonitorError::Cancelled);
        }
        Ok(())
    }
}

/// Arbitrates access to one [`SharedList`] between readers, writers and
/// erasers.
///
/// Share it by reference or `Arc`; there is no global instance.
pub struct AccessMonitor {
    state: Mutex<AdmissionState>,
    conditions: [Condvar; 3],
    /// Copy of the counters readable without the lock.
    observed: [CachePadded<AtomicUsize>; 3],
    granted: [AtomicU64; 3],
    blocked: [AtomicU64; 3],
    exclusion: ExclusionPolicy,
    wake: WakePolicy,
    shutdown: ShutdownSignal,
    list: SharedList,
}

impl AccessMonitor {
    /// Creates a monitor guarding `list` with the standard exclusion table
    /// and the hardened wake table.
    pub fn new(list: SharedList) -> Self {
        Self::with_policy(list, ExclusionPolicy::STANDARD, WakePolicy::default())
    }

    /// Creates a monitor with explicit exclusion and wake tables.
    pub fn with_policy(list: SharedList, exclusion: ExclusionPolicy, wake: WakePolicy) -> Self {
        Self {
            state: Mutex::new(AdmissionState::default()),
            conditions: [Condvar::new(), Condvar::new(), Condvar::new()],
            observed: Default::default(),
            granted: Default::default(),
            blocked: Default::default(),
            exclusion,
            wake,
            shutdown: ShutdownSignal::new(),
            list,
        }
    }

    /// The exclusion table in use.
    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        self.exclusion
    }

    /// The wake-up table in use.
    pub fn wake_policy(&self) -> WakePolicy {
        self.wake
    }

    /// Blocks until read admission is granted.
    pub fn enter_read(&self) -> Result<ReadGuard<'_>, MonitorError> {
        self.admit(Role::Reader, None, Requester::Worker)?;
        Ok(ReadGuard::new(self))
    }

    /// Blocks until write admission is granted.
    pub fn enter_write(&self) -> Result<WriteGuard<'_>, MonitorError> {
        self.admit(Role::Writer, None, Requester::Worker)?;
        Ok(WriteGuard::new(self))
    }

    /// Blocks until erase admission is granted.
    pub fn enter_erase(&self) -> Result<EraseGuard<'_>, MonitorError> {
        self.admit(Role::Eraser, None, Requester::Worker)?;
        Ok(EraseGuard::new(self))
    }

    /// Like [`enter_read`](Self::enter_read), giving up after `timeout`.
    pub fn enter_read_timeout(&self, timeout: Duration) -> Result<ReadGuard<'_>, MonitorError> {
        self.admit(Role::Reader, Some(timeout), Requester::Worker)?;
        Ok(ReadGuard::new(self))
    }

    /// Like [`enter_write`](Self::enter_write), giving up after `timeout`.
    pub fn enter_write_timeout(&self, timeout: Duration) -> Result<WriteGuard<'_>, MonitorError> {
        self.admit(Role::Writer, Some(timeout), Requester::Worker)?;
        Ok(WriteGuard::new(self))
    }

    /// Like [`enter_erase`](Self::enter_erase), giving up after `timeout`.
    pub fn enter_erase_timeout(&self, timeout: Duration) -> Result<EraseGuard<'_>, MonitorError> {
        self.admit(Role::Eraser, Some(timeout), Requester::Worker)?;
        Ok(EraseGuard::new(self))
    }

    /// Grants read admission only if no wait is needed.
    pub fn try_enter_read(&self) -> Result<Option<ReadGuard<'_>>, MonitorError> {
        Ok(self.try_admit(Role::Reader)?.then(|| ReadGuard::new(self)))
    }

    /// Grants write admission only if no wait is needed.
    pub fn try_enter_write(&self) -> Result<Option<WriteGuard<'_>>, MonitorError> {
        Ok(self.try_admit(Role::Writer)?.then(|| WriteGuard::new(self)))
    }

    /// Grants erase admission only if no wait is needed.
    pub fn try_enter_erase(&self) -> Result<Option<EraseGuard<'_>>, MonitorError> {
        Ok(self.try_admit(Role::Eraser)?.then(|| EraseGuard::new(self)))
    }

    /// Refuses all further admissions and wakes every blocked request, which
    /// then fails with [`MonitorError::Cancelled`]. Admissions already held
    /// stay valid and release normally. Also triggers the monitor's
    /// [`ShutdownSignal`].
    ///
    /// Returns `false` if the monitor was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        let newly = !state.closed;
        state.closed = true;
        self.notify_everyone();
        drop(state);
        self.shutdown.trigger();
        if newly {
            tracing::debug!("monitor closed");
        }
        newly
    }

    /// Whether [`close`](Self::close) was called or the monitor was poisoned.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Fires when the monitor is closed; workers sleep on it between cycles.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Current counters, read without taking the lock. Best effort: the
    /// three values may come from different instants.
    pub fn counts(&self) -> ActiveCounts {
        ActiveCounts {
            readers: self.observed[Role::Reader.index()].load(Ordering::Relaxed),
            writers: self.observed[Role::Writer.index()].load(Ordering::Relaxed),
            erasers: self.observed[Role::Eraser.index()].load(Ordering::Relaxed),
        }
    }

    /// Counters read under the lock.
    pub fn counts_exact(&self) -> ActiveCounts {
        self.state.lock().active
    }

    /// Number of requests currently blocked waiting for `role` admission.
    pub fn waiting(&self, role: Role) -> usize {
        self.condition(role).waiters()
    }

    /// Per-role admission totals.
    pub fn stats(&self) -> AdmissionStats {
        let load = |counters: &[AtomicU64; 3]| {
            [
                counters[0].load(Ordering::Relaxed),
                counters[1].load(Ordering::Relaxed),
                counters[2].load(Ordering::Relaxed),
            ]
        };
        AdmissionStats {
            granted: load(&self.granted),
            blocked: load(&self.blocked),
        }
    }

    /// Counts plus list contents.
    ///
    /// The list is rendered under read admission, so this waits while an
    /// eraser is active. Unlike the `enter_*` calls it keeps working after
    /// [`close`](Self::close); it fails only on a protocol violation.
    pub fn snapshot(&self) -> Result<MonitorSnapshot, MonitorError> {
        self.admit(Role::Reader, None, Requester::Observer)?;
        let guard = ReadGuard::new(self);
        let mut snapshot = guard.snapshot();
        guard.exit()?;
        // Report the state as others see it, without this observer.
        snapshot.active.readers = snapshot.active.readers.saturating_sub(1);
        Ok(snapshot)
    }

    /// Direct access to the list, proven exclusive by `&mut self`.
    pub fn list_mut(&mut self) -> &mut SharedList {
        &mut self.list
    }

    /// Consumes the monitor and returns the list.
    pub fn into_list(self) -> SharedList {
        self.list
    }

    pub(crate) fn list(&self) -> &SharedList {
        &self.list
    }

    fn condition(&self, role: Role) -> &Condvar {
        &self.conditions[role.index()]
    }

    fn try_admit(&self, role: Role) -> Result<bool, MonitorError> {
        match self.admit(role, Some(Duration::ZERO), Requester::Worker) {
            Ok(()) => Ok(true),
            Err(MonitorError::TimedOut { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Waits until `role` is admissible, then takes admission.
    ///
    /// `timeout` of `None` waits forever.
    fn admit(&self, role: Role, timeout: Option<Duration>, requester: Requester) -> Result<(), MonitorError> {
        let started = Instant::now();
        let deadline = timeout.and_then(|t| started.checked_add(t));
        let mut waited = false;

        let mut state = self.state.lock();
        loop {
            state.ensure_open(requester)?;
            if !self.exclusion.blocks(role, &state.active) {
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(MonitorError::TimedOut {
                    role,
                    waited: started.elapsed(),
                });
            }
            if !waited {
                waited = true;
                self.blocked[role.index()].fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%role, active = %state.active, "admission blocked");
            }
            state = match deadline {
                None => self.condition(role).wait(state),
                Some(deadline) => self.condition(role).wait_until(state, deadline).0,
            };
        }

        *state.active.get_mut(role) += 1;
        if let Err(detail) = self.exclusion.check(&state.active) {
            return Err(self.poison(state, detail));
        }
        self.publish(&state.active);
        self.granted[role.index()].fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%role, active = %state.active, "admission granted");
        Ok(())
    }

    /// Gives back one `role` admission and sends the wake-ups of the
    /// configured table. Never blocks beyond taking the lock.
    pub(crate) fn release(&self, role: Role) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        let counter = state.active.get_mut(role);
        match counter.checked_sub(1) {
            Some(n) => *counter = n,
            None => {
                let detail = format!("{role} released without holding admission");
                return Err(self.poison(state, detail));
            }
        }
        self.publish(&state.active);

        for wake in self.wake.on_release(role) {
            if wake.only_if_admissible && self.exclusion.blocks(wake.condition, &state.active) {
                continue;
            }
            let condvar = self.condition(wake.condition);
            match wake.notify {
                Notify::One => {
                    condvar.notify_one();
                }
                Notify::All => {
                    condvar.notify_all();
                }
            }
        }
        tracing::trace!(%role, active = %state.active, "admission released");
        Ok(())
    }

    /// Marks the bookkeeping as corrupted, wakes everyone so no request
    /// stays blocked on it, and shuts the monitor down.
    fn poison(&self, mut state: MutexGuard<'_, AdmissionState>, detail: String) -> MonitorError {
        tracing::error!(%detail, "admission protocol violated; monitor disabled");
        state.poisoned = Some(detail.clone());
        state.closed = true;
        self.notify_everyone();
        drop(state);
        self.shutdown.trigger();
        MonitorError::violation(detail)
    }

    fn notify_everyone(&self) {
        for condvar in &self.conditions {
            condvar.notify_all();
        }
    }

    fn publish(&self, active: &ActiveCounts) {
        for role in Role::ALL {
            self.observed[role.index()].store(active.get(role), Ordering::Relaxed);
        }
    }
}

impl Default for AccessMonitor {
    fn default() -> Self {
        Self::new(SharedList::new())
    }
}

impl fmt::Debug for AccessMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessMonitor")
            .field("active", &self.counts())
            .field("exclusion", &self.exclusion)
            .field("wake", &self.wake)
            .field("list_len", &self.list.len())
            .finish_non_exhaustive()
    }
}
