/*!
 * Countdown Latch Tests
 */

use pretty_assertions::assert_eq;
use queued_sync::{CountdownLatch, SyncError, Synchronizer};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_wait_blocks_until_three_count_downs() {
    let latch = Arc::new(CountdownLatch::new(3).unwrap());
    let done = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let (latch, done) = (latch.clone(), done.clone());
            thread::spawn(move || {
                let delay = rand::thread_rng().gen_range(1..20);
                thread::sleep(Duration::from_millis(delay));
                done.fetch_add(1, Ordering::SeqCst);
                latch.count_down();
            })
        })
        .collect();

    latch.wait().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 3);
    assert_eq!(latch.count(), 0);

    // A fourth count_down is a no-op
    latch.count_down();
    assert_eq!(latch.count(), 0);
    latch.wait().unwrap();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_many_waiters_released_together() {
    let latch = Arc::new(CountdownLatch::new(2).unwrap());

    let waiters: Vec<_> = (0..6)
        .map(|_| {
            let latch = latch.clone();
            thread::spawn(move || latch.wait_timeout(Duration::from_secs(5)))
        })
        .collect();

    while latch.queue_length() < 6 {
        thread::yield_now();
    }
    latch.count_down();
    assert_eq!(latch.count(), 1);
    latch.count_down();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Ok(true));
    }
    assert!(!latch.has_queued_threads());
}

#[test]
fn test_release_counts_down_n_times() {
    let latch = CountdownLatch::new(5).unwrap();
    Synchronizer::release(&latch, 3).unwrap();
    assert_eq!(latch.count(), 2);
    assert!(!Synchronizer::try_acquire(&latch, 1).unwrap());

    Synchronizer::release(&latch, 10).unwrap();
    assert_eq!(latch.count(), 0);
    assert!(Synchronizer::try_acquire(&latch, 1).unwrap());
    Synchronizer::acquire(&latch, 1).unwrap();
}

#[test]
fn test_timed_acquire_times_out() {
    let latch = CountdownLatch::new(1).unwrap();
    assert_eq!(
        Synchronizer::try_acquire_timed(&latch, 1, Duration::from_millis(10)),
        Err(SyncError::Timeout)
    );
    assert!(!latch.wait_timeout(Duration::from_millis(10)).unwrap());
}
