/*!
 * Mutex Tests
 * Mutual exclusion, release guard and cancellation behavior
 */

use pretty_assertions::assert_eq;
use queued_sync::core::sync::thread;
use queued_sync::{Mutex, SyncError, Synchronizer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread as std_thread;
use std::time::{Duration, Instant};

#[test]
fn test_two_threads_thousand_increments() {
    let mutex = Arc::new(Mutex::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let mutex = mutex.clone();
            let counter = counter.clone();
            std_thread::spawn(move || {
                for _ in 0..1000 {
                    mutex.lock().unwrap();
                    let value = counter.load(Ordering::Relaxed);
                    std::hint::spin_loop();
                    counter.store(value + 1, Ordering::Relaxed);
                    mutex.unlock().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), 2000);
    assert!(!mutex.is_locked());
}

#[test]
fn test_never_two_inside() {
    let mutex = Arc::new(Mutex::new());
    let inside = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mutex = mutex.clone();
            let inside = inside.clone();
            std_thread::spawn(move || {
                for _ in 0..200 {
                    let _guard = mutex.guard().unwrap();
                    assert!(
                        !inside.swap(true, Ordering::SeqCst),
                        "two threads in critical section"
                    );
                    std_thread::yield_now();
                    inside.store(false, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_release_without_acquire_is_illegal() {
    let mutex = Mutex::new();
    let err = mutex.unlock().unwrap_err();
    assert!(matches!(err, SyncError::IllegalState(_)));
    assert!(err.is_programming_error());

    // Still usable afterwards
    mutex.lock().unwrap();
    mutex.unlock().unwrap();
}

#[test]
fn test_timed_out_waiter_does_not_strand_successor() {
    let mutex = Arc::new(Mutex::new());
    mutex.lock().unwrap();

    let timed = {
        let mutex = mutex.clone();
        std_thread::spawn(move || mutex.try_lock_for(Duration::from_millis(300)))
    };
    while mutex.queue_length() < 1 {
        std_thread::yield_now();
    }

    let patient = {
        let mutex = mutex.clone();
        std_thread::spawn(move || {
            mutex.lock().unwrap();
            mutex.unlock().unwrap();
            Instant::now()
        })
    };
    while mutex.queue_length() < 2 && !timed.is_finished() {
        std_thread::yield_now();
    }

    assert_eq!(timed.join().unwrap(), Err(SyncError::Timeout));
    let released_at = Instant::now();
    mutex.unlock().unwrap();

    let acquired_at = patient.join().unwrap();
    assert!(acquired_at.duration_since(released_at) < Duration::from_secs(1));
    assert!(!mutex.has_queued_threads());
}

#[test]
fn test_timed_out_waiter_then_new_thread_acquires() {
    let mutex = Arc::new(Mutex::new());
    mutex.lock().unwrap();

    let mutex_clone = mutex.clone();
    let result = std_thread::spawn(move || mutex_clone.try_lock_for(Duration::from_millis(20)))
        .join()
        .unwrap();
    assert_eq!(result, Err(SyncError::Timeout));
    mutex.unlock().unwrap();

    let mutex_clone = mutex.clone();
    let acquired = std_thread::spawn(move || {
        let ok = mutex_clone.try_lock();
        if ok {
            mutex_clone.unlock().unwrap();
        }
        ok
    })
    .join()
    .unwrap();
    assert!(acquired);
}

#[test]
fn test_lock_interruptibly_aborts() {
    let mutex = Arc::new(Mutex::new());
    mutex.lock().unwrap();

    let (tx, rx) = mpsc::channel();
    let mutex_clone = mutex.clone();
    let waiter = std_thread::spawn(move || {
        tx.send(thread::current()).unwrap();
        mutex_clone.lock_interruptibly()
    });

    let handle = rx.recv().unwrap();
    while !mutex.core().is_queued(&handle) {
        std_thread::yield_now();
    }
    handle.interrupt();

    let err = waiter.join().unwrap().unwrap_err();
    assert_eq!(err, SyncError::Interrupted);
    assert!(err.is_cancellation());
    assert_eq!(mutex.queue_length(), 0);
    mutex.unlock().unwrap();
}

#[test]
fn test_uninterruptible_lock_reasserts_interrupt() {
    let mutex = Arc::new(Mutex::new());
    mutex.lock().unwrap();

    let (tx, rx) = mpsc::channel();
    let mutex_clone = mutex.clone();
    let waiter = std_thread::spawn(move || {
        tx.send(thread::current()).unwrap();
        mutex_clone.lock().unwrap();
        let flagged = thread::current().is_interrupted();
        mutex_clone.unlock().unwrap();
        flagged
    });

    let handle = rx.recv().unwrap();
    while !mutex.core().is_queued(&handle) {
        std_thread::yield_now();
    }
    handle.interrupt();
    std_thread::sleep(Duration::from_millis(20));
    mutex.unlock().unwrap();

    assert!(waiter.join().unwrap());
}

#[test]
fn test_interrupted_before_call_fails_fast() {
    let mutex = Mutex::new();
    thread::current().interrupt();
    assert_eq!(mutex.lock_interruptibly(), Err(SyncError::Interrupted));
    assert!(!thread::current().is_interrupted());
    assert!(!mutex.is_locked());
}

#[test]
fn test_generic_synchronizer_surface() {
    fn exercise<S: Synchronizer>(sync: &S) {
        assert!(sync.try_acquire(1).unwrap());
        assert!(sync.is_held_exclusively());
        assert_eq!(sync.queue_length(), 0);
        assert!(!sync.has_queued_threads());
        sync.release(1).unwrap();
        assert!(!sync.is_held_exclusively());
        sync.try_acquire_timed(1, Duration::from_millis(5)).unwrap();
        sync.release(1).unwrap();
    }

    exercise(&Mutex::new());
    exercise(&Mutex::new_fair());
    exercise(&queued_sync::ReentrantLock::new());
}
