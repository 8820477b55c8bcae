/*!
 * Semaphore Tests
 * Bounded concurrency and permit arithmetic
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use queued_sync::{Semaphore, SyncError, Synchronizer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_three_permits_five_threads() {
    let sem = Arc::new(Semaphore::new(3));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let (sem, active, peak) = (sem.clone(), active.clone(), peak.clone());
            thread::spawn(move || {
                for _ in 0..20 {
                    sem.acquire_one().unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(now <= 3, "{now} threads inside a 3-permit semaphore");
                    thread::sleep(Duration::from_micros(200));
                    active.fetch_sub(1, Ordering::SeqCst);
                    sem.release_one().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(sem.available_permits(), 3);
}

#[test]
fn test_timed_acquire_and_release_by_other_thread() {
    let sem = Arc::new(Semaphore::new(0));

    assert_eq!(
        sem.try_acquire_for(1, Duration::from_millis(10)),
        Err(SyncError::Timeout)
    );

    let sem_clone = sem.clone();
    let waiter = thread::spawn(move || sem_clone.try_acquire_for(2, Duration::from_secs(2)));
    while !sem.has_queued_threads() {
        thread::yield_now();
    }
    sem.release(1).unwrap();
    sem.release(1).unwrap();

    waiter.join().unwrap().unwrap();
    assert_eq!(sem.available_permits(), 0);
}

#[test]
fn test_large_request_waits_for_enough_permits() {
    let sem = Arc::new(Semaphore::new(1));

    let sem_clone = sem.clone();
    let big = thread::spawn(move || sem_clone.acquire(3));
    while sem.queue_length() < 1 {
        thread::yield_now();
    }

    sem.release(1).unwrap();
    thread::sleep(Duration::from_millis(10));
    assert!(!big.is_finished());

    sem.release(1).unwrap();
    big.join().unwrap().unwrap();
    assert_eq!(sem.available_permits(), 0);
}

#[test]
fn test_fair_semaphore_does_not_barge() {
    let sem = Arc::new(Semaphore::new_fair(0));

    let sem_clone = sem.clone();
    let queued = thread::spawn(move || sem_clone.acquire(2));
    while !sem.has_queued_threads() {
        thread::yield_now();
    }

    // One permit is not enough for the queued thread, and a fair semaphore
    // must not hand it to a newcomer either
    sem.release(1).unwrap();
    assert!(!sem.try_acquire(1).unwrap());

    sem.release(1).unwrap();
    queued.join().unwrap().unwrap();
}

#[test]
fn test_acquire_interruptibly() {
    let sem = Arc::new(Semaphore::new(0));
    let (tx, rx) = std::sync::mpsc::channel();

    let sem_clone = sem.clone();
    let waiter = thread::spawn(move || {
        tx.send(queued_sync::core::sync::thread::current()).unwrap();
        sem_clone.acquire_interruptibly(1)
    });

    let handle = rx.recv().unwrap();
    while !sem.core().is_queued(&handle) {
        thread::yield_now();
    }
    handle.interrupt();

    assert_eq!(waiter.join().unwrap(), Err(SyncError::Interrupted));
    assert!(!sem.has_queued_threads());
    assert!(!Synchronizer::is_held_exclusively(&*sem));
}

#[test]
fn test_timed_out_waiter_does_not_strand_successor() {
    let sem = Arc::new(Semaphore::new(0));

    let sem_clone = sem.clone();
    let timed = thread::spawn(move || sem_clone.try_acquire_for(1, Duration::from_millis(100)));
    while sem.queue_length() < 1 {
        thread::yield_now();
    }

    let sem_clone = sem.clone();
    let blocking = thread::spawn(move || sem_clone.acquire(1));
    while sem.queue_length() < 2 {
        thread::yield_now();
    }

    // The first waiter gives up while the second is parked behind it
    assert_eq!(timed.join().unwrap(), Err(SyncError::Timeout));
    sem.release(1).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !blocking.is_finished() {
        assert!(
            std::time::Instant::now() < deadline,
            "shared waiter stranded behind a cancelled node"
        );
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(blocking.join().unwrap(), Ok(()));
    assert_eq!(sem.available_permits(), 0);
    assert!(!sem.has_queued_threads());
}

#[derive(Debug, Clone)]
enum Op {
    TryAcquire(i32),
    Release(i32),
    Drain,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6i32).prop_map(Op::TryAcquire),
        (0..6i32).prop_map(Op::Release),
        Just(Op::Drain),
    ]
}

proptest! {
    #[test]
    fn prop_permits_match_model(
        initial in 0..10i32,
        ops in prop::collection::vec(op_strategy(), 0..64),
    ) {
        let sem = Semaphore::new(initial);
        let mut model = initial;

        for op in ops {
            match op {
                Op::TryAcquire(n) => {
                    let got = sem.try_acquire(n).unwrap();
                    prop_assert_eq!(got, model >= n);
                    if got {
                        model -= n;
                    }
                }
                Op::Release(n) => {
                    sem.release(n).unwrap();
                    model += n;
                }
                Op::Drain => {
                    prop_assert_eq!(sem.drain_permits(), model);
                    model = 0;
                }
            }
            prop_assert_eq!(sem.available_permits(), model);
            prop_assert!(sem.available_permits() >= 0);
        }
    }
}
