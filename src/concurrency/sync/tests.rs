use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_mutex_lock() {
    let mutex = Mutex::new(0u32);

    {
        let mut guard = mutex.lock();
        *guard += 1;
    } // guard dropped, unlocked

    assert!(mutex.try_lock().is_some());
    assert_eq!(*mutex.lock(), 1);
}

#[test]
fn test_mutex_try_lock_while_held() {
    let mutex = Mutex::new(());
    let guard = mutex.lock();
    assert!(mutex.try_lock().is_none());
    drop(guard);
    assert!(mutex.try_lock().is_some());
}

#[test]
fn test_mutex_contention() {
    let mutex = Mutex::new(0usize);
    let mutex = &mutex;

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(move || {
                for _ in 0..1_000 {
                    *mutex.lock() += 1;
                }
            });
        }
    });

    assert_eq!(*mutex.lock(), 8_000);
}

#[test]
fn test_mutex_blocks_until_release() {
    let mutex = Mutex::new(());
    let mutex = &mutex;
    let released = AtomicBool::new(false);
    let released = &released;

    thread::scope(|s| {
        let guard = mutex.lock();
        s.spawn(move || {
            let _g = mutex.lock();
            assert!(released.load(Ordering::SeqCst));
        });
        thread::sleep(Duration::from_millis(50));
        released.store(true, Ordering::SeqCst);
        drop(guard);
    });
}

#[test]
fn test_condvar() {
    let mutex = Mutex::new(false);
    let condvar = Condvar::new();

    let mutex = &mutex;
    let condvar = &condvar;

    thread::scope(|s| {
        s.spawn(move || {
            let mut guard = mutex.lock();
            while !*guard {
                guard = condvar.wait(guard);
            }
        });

        thread::sleep(Duration::from_millis(20));
        *mutex.lock() = true;
        condvar.notify_one();
    });
}

#[test]
fn test_condvar_notify_all() {
    let mutex = Arc::new(Mutex::new(false));
    let cond = Arc::new(Condvar::new());
    let woken = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        for _ in 0..5 {
            let m = mutex.clone();
            let c = cond.clone();
            let w = woken.clone();
            s.spawn(move || {
                let mut guard = m.lock();
                while !*guard {
                    guard = c.wait(guard);
                }
                w.fetch_add(1, Ordering::SeqCst);
            });
        }

        while cond.waiters() < 5 {
            thread::yield_now();
        }
        *mutex.lock() = true;
        assert_eq!(cond.notify_all(), 5);
    });

    assert_eq!(woken.load(Ordering::SeqCst), 5);
}

#[test]
fn test_condvar_notify_without_waiters_is_lost() {
    let mutex = Mutex::new(());
    let cond = Condvar::new();

    assert!(!cond.notify_one());
    assert_eq!(cond.notify_all(), 0);

    let (_guard, result) = cond.wait_timeout(mutex.lock(), Duration::from_millis(20));
    assert!(result.timed_out());
}

#[test]
fn test_condvar_wait_timeout_unlinks_node() {
    let mutex = Mutex::new(());
    let cond = Condvar::new();

    let started = Instant::now();
    let (guard, result) = cond.wait_timeout(mutex.lock(), Duration::from_millis(30));
    assert!(result.timed_out());
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(cond.waiters(), 0);
    drop(guard);
}

#[test]
fn test_condvar_timed_waiter_can_be_notified() {
    let mutex = Mutex::new(false);
    let cond = Condvar::new();
    let mutex = &mutex;
    let cond = &cond;

    thread::scope(|s| {
        let h = s.spawn(move || {
            let mut guard = mutex.lock();
            let deadline = Instant::now() + Duration::from_secs(5);
            while !*guard {
                let (g, result) = cond.wait_until(guard, deadline);
                guard = g;
                if result.timed_out() {
                    return false;
                }
            }
            true
        });

        while cond.waiters() == 0 {
            thread::yield_now();
        }
        *mutex.lock() = true;
        cond.notify_one();
        assert!(h.join().unwrap());
    });
}

#[test]
fn test_wait_queue_wake_order_is_fifo() {
    let queue = WaitQueue::new();
    let queue = &queue;
    let order = Mutex::new(Vec::new());
    let order = &order;

    thread::scope(|s| {
        for id in 0..3 {
            s.spawn(move || {
                let node = WaitNode::new();
                unsafe {
                    queue.lock();
                    queue.push_locked(std::ptr::NonNull::from(&node));
                    queue.unlock();
                }
                node.park();
                order.lock().push(id);
            });
            while queue.waiter_count() <= id {
                thread::yield_now();
            }
        }

        for expected in 1..=3 {
            assert!(queue.wake_one());
            while order.lock().len() < expected {
                thread::yield_now();
            }
        }
    });

    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert_eq!(queue.waiter_count(), 0);
}

#[test]
fn test_shutdown_interrupts_sleep() {
    let signal = ShutdownSignal::new();
    let signal = &signal;

    thread::scope(|s| {
        let h = s.spawn(move || {
            let started = Instant::now();
            let completed = signal.sleep(Duration::from_secs(30));
            (completed, started.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        assert!(signal.trigger());
        let (completed, elapsed) = h.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(30));
    });

    assert!(!signal.trigger());
    assert!(!signal.sleep(Duration::from_secs(30)));
}

#[test]
fn test_shutdown_sleep_runs_to_completion() {
    let signal = ShutdownSignal::new();
    assert!(signal.sleep(Duration::from_millis(10)));
    assert!(signal.sleep(Duration::ZERO));
    assert!(!signal.is_triggered());
}
