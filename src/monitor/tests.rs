use super::*;
use crate::collections::RemovalBound;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::thread;
use std::time::Duration;

const SHORT: Duration = Duration::from_millis(50);

fn wait_for_waiters(monitor: &AccessMonitor, role: Role, n: usize) {
    while monitor.waiting(role) < n {
        thread::yield_now();
    }
}

#[test]
fn test_counts_follow_guards() {
    let monitor = AccessMonitor::default();
    let r1 = monitor.enter_read().unwrap();
    let r2 = monitor.enter_read().unwrap();
    assert_eq!(monitor.counts(), ActiveCounts { readers: 2, writers: 0, erasers: 0 });

    let w = monitor.enter_write().unwrap();
    assert_eq!(monitor.counts_exact(), ActiveCounts { readers: 2, writers: 1, erasers: 0 });

    drop(r1);
    r2.exit().unwrap();
    w.exit().unwrap();
    assert_eq!(monitor.counts(), ActiveCounts::default());
}

#[test]
fn test_try_enter_respects_exclusion() {
    let monitor = AccessMonitor::default();

    let erase = monitor.try_enter_erase().unwrap().unwrap();
    assert!(monitor.try_enter_read().unwrap().is_none());
    assert!(monitor.try_enter_write().unwrap().is_none());
    assert!(monitor.try_enter_erase().unwrap().is_none());
    drop(erase);

    let write = monitor.try_enter_write().unwrap().unwrap();
    assert!(monitor.try_enter_write().unwrap().is_none());
    assert!(monitor.try_enter_erase().unwrap().is_none());
    let read = monitor.try_enter_read().unwrap().unwrap();
    drop((read, write));

    // Refused non-blocking requests never waited.
    assert_eq!(monitor.stats().granted(Role::Writer), 1);
    assert_eq!(monitor.stats().blocked(Role::Writer), 0);
}

#[test]
fn test_blocked_counts_requests_that_waited() {
    let monitor = AccessMonitor::default();
    let monitor = &monitor;
    let write = monitor.enter_write().unwrap();

    thread::scope(|s| {
        let h = s.spawn(move || monitor.enter_write().map(drop));
        wait_for_waiters(monitor, Role::Writer, 1);
        write.exit().unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
    });

    let _ = monitor.enter_erase_timeout(Duration::ZERO).unwrap();
    let stats = monitor.stats();
    assert_eq!(stats.granted(Role::Writer), 2);
    assert_eq!(stats.blocked(Role::Writer), 1);
    assert_eq!(stats.blocked(Role::Eraser), 0);
}

#[test]
fn test_enter_timeout_reports_role() {
    let monitor = AccessMonitor::default();
    let _read = monitor.enter_read().unwrap();
    match monitor.enter_erase_timeout(SHORT) {
        Err(MonitorError::TimedOut { role, waited }) => {
            assert_eq!(role, Role::Eraser);
            assert!(waited >= SHORT);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(monitor.waiting(Role::Eraser), 0);
    assert_eq!(monitor.counts().erasers, 0);
}

#[test]
fn test_release_without_admission_poisons() {
    let monitor = AccessMonitor::default();
    let err = monitor.release(Role::Writer).unwrap_err();
    assert!(matches!(err, MonitorError::ProtocolViolation { .. }));

    assert!(matches!(monitor.enter_read(), Err(MonitorError::ProtocolViolation { .. })));
    assert!(matches!(monitor.try_enter_erase(), Err(MonitorError::ProtocolViolation { .. })));
    assert!(monitor.is_closed());
    assert!(monitor.shutdown_signal().is_triggered());
}

#[test]
fn test_poison_wakes_blocked_requests() {
    let monitor = AccessMonitor::default();
    let monitor = &monitor;
    let erase = monitor.enter_erase().unwrap();

    thread::scope(|s| {
        let h = s.spawn(move || monitor.enter_read().map(drop));
        wait_for_waiters(monitor, Role::Reader, 1);
        let _ = monitor.release(Role::Writer);
        assert!(matches!(h.join().unwrap(), Err(MonitorError::ProtocolViolation { .. })));
    });

    // The eraser still releases cleanly.
    erase.exit().unwrap();
}

#[test]
fn test_close_cancels_blocked_and_future_requests() {
    let monitor = AccessMonitor::default();
    let monitor = &monitor;
    let erase = monitor.enter_erase().unwrap();

    thread::scope(|s| {
        let reader = s.spawn(move || monitor.enter_read().map(drop));
        let writer = s.spawn(move || monitor.enter_write().map(drop));
        wait_for_waiters(monitor, Role::Reader, 1);
        wait_for_waiters(monitor, Role::Writer, 1);

        assert!(monitor.close());
        assert_eq!(reader.join().unwrap(), Err(MonitorError::Cancelled));
        assert_eq!(writer.join().unwrap(), Err(MonitorError::Cancelled));
    });

    assert!(!monitor.close());
    assert_eq!(monitor.enter_write().unwrap_err(), MonitorError::Cancelled);
    erase.exit().unwrap();
    assert_eq!(monitor.counts(), ActiveCounts::default());

    let snap = monitor.snapshot().unwrap();
    assert!(snap.closed);
    assert_eq!(snap.active, ActiveCounts::default());
}

#[test]
fn test_guards_expose_role_operations() {
    let monitor = AccessMonitor::default();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let mut w = monitor.enter_write().unwrap();
    assert_eq!(w.role(), Role::Writer);
    w.append(1).unwrap();
    w.append(2).unwrap();
    assert_eq!(w.snapshot_string(), "[1, 2]");
    w.exit().unwrap();

    let r = monitor.enter_read().unwrap();
    assert!(matches!(r.peek_random(&mut rng), Some(1 | 2)));
    assert_eq!(r.len(), 2);
    drop(r);

    let mut e = monitor.enter_erase().unwrap();
    let removed = e.remove_random(RemovalBound::LiveLength, &mut rng).unwrap();
    assert!(removed == 1 || removed == 2);
    assert_eq!(e.len(), 1);
    let snap = e.snapshot();
    assert_eq!(snap.active, ActiveCounts { readers: 0, writers: 0, erasers: 1 });
    assert!(!snap.closed);
    e.exit().unwrap();

    let snap = monitor.snapshot().unwrap();
    assert_eq!(snap.list.len(), 1);
    assert_eq!(snap.active, ActiveCounts::default());
}

#[test]
fn test_snapshot_reports_other_holders_only() {
    let monitor = AccessMonitor::new(SharedList::new());
    assert_eq!(monitor.snapshot().unwrap().active.total(), 0);

    let r = monitor.enter_read().unwrap();
    let w = monitor.enter_write().unwrap();
    let snap = monitor.snapshot().unwrap();
    assert_eq!(snap.active, ActiveCounts { readers: 1, writers: 1, erasers: 0 });
    drop((r, w));

    assert_eq!(monitor.snapshot().unwrap().active.total(), 0);
    assert_eq!(monitor.counts(), ActiveCounts::default());
}

#[test]
fn test_write_guard_sees_its_own_append() {
    let monitor = AccessMonitor::default();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut w = monitor.enter_write().unwrap();
    assert_eq!(w.peek_random(&mut rng), None);
    w.append(42).unwrap();
    assert_eq!(w.peek_random(&mut rng), Some(42));
    assert!(!w.is_empty());
    w.exit().unwrap();
}

#[test]
fn test_write_guard_surfaces_allocation_failure() {
    let monitor = AccessMonitor::new(SharedList::with_capacity_limit(1));
    let mut w = monitor.enter_write().unwrap();
    w.append(7).unwrap();
    assert_eq!(w.append(8), Err(crate::error::ListError::AllocationFailure { len: 1 }));
    drop(w);
    assert_eq!(monitor.into_list().to_vec(), vec![7]);
}

#[test]
fn test_strict_policy_excludes_readers_from_writers() {
    let monitor = AccessMonitor::with_policy(
        SharedList::new(),
        ExclusionPolicy::STRICT,
        WakePolicy::Hardened,
    );
    let monitor = &monitor;
    let write = monitor.enter_write().unwrap();
    assert!(monitor.try_enter_read().unwrap().is_none());

    thread::scope(|s| {
        let h = s.spawn(move || monitor.enter_read().map(|g| g.counts()));
        wait_for_waiters(monitor, Role::Reader, 1);
        write.exit().unwrap();
        let seen = h.join().unwrap().unwrap();
        assert_eq!(seen.writers, 0);
    });
}

#[test]
fn test_hardened_read_release_wakes_eraser() {
    let monitor = AccessMonitor::default();
    let monitor = &monitor;
    let read = monitor.enter_read().unwrap();

    thread::scope(|s| {
        let h = s.spawn(move || monitor.enter_erase_timeout(Duration::from_secs(10)).map(drop));
        wait_for_waiters(monitor, Role::Eraser, 1);
        read.exit().unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
    });
}

#[test]
fn test_faithful_read_release_leaves_eraser_waiting() {
    let monitor = AccessMonitor::with_policy(
        SharedList::new(),
        ExclusionPolicy::STANDARD,
        WakePolicy::Faithful,
    );
    let monitor = &monitor;
    let read = monitor.enter_read().unwrap();

    thread::scope(|s| {
        let h = s.spawn(move || monitor.enter_erase().map(drop));
        wait_for_waiters(monitor, Role::Eraser, 1);
        read.exit().unwrap();

        // Admissible now, but nobody told it.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(monitor.waiting(Role::Eraser), 1);
        assert_eq!(monitor.counts().erasers, 0);

        monitor.close();
        assert_eq!(h.join().unwrap(), Err(MonitorError::Cancelled));
    });
}
