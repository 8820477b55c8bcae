/*!
 * Randomized Stress Tests
 * Mixed blocking, timed and non-blocking acquires under contention
 */

use pretty_assertions::assert_eq;
use queued_sync::{ReentrantLock, Semaphore, StrategyType, SyncConfig, SyncError};
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREADS: usize = 6;
const ITERATIONS: usize = 300;

fn hammer_lock(lock: Arc<ReentrantLock>) -> (i64, usize) {
    let counter = Arc::new(AtomicI64::new(0));
    let timeouts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (lock, counter, timeouts) = (lock.clone(), counter.clone(), timeouts.clone());
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut done = 0;
                while done < ITERATIONS {
                    let acquired = match rng.gen_range(0..3) {
                        0 => lock.lock().is_ok(),
                        1 => lock.try_lock().unwrap(),
                        _ => match lock.try_lock_for(Duration::from_micros(rng.gen_range(1..500))) {
                            Ok(()) => true,
                            Err(SyncError::Timeout) => {
                                timeouts.fetch_add(1, Ordering::Relaxed);
                                false
                            }
                            Err(err) => panic!("unexpected error: {err}"),
                        },
                    };
                    if !acquired {
                        continue;
                    }

                    // Occasionally re-enter
                    let depth = rng.gen_range(1..=3);
                    for _ in 1..depth {
                        lock.lock().unwrap();
                    }
                    let value = counter.load(Ordering::Relaxed);
                    if rng.gen_bool(0.1) {
                        thread::yield_now();
                    }
                    counter.store(value + 1, Ordering::Relaxed);
                    for _ in 0..depth {
                        lock.unlock().unwrap();
                    }
                    done += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    (counter.load(Ordering::Relaxed), timeouts.load(Ordering::Relaxed))
}

#[test]
fn test_reentrant_stress_every_strategy() {
    for strategy in [StrategyType::Futex, StrategyType::Condvar, StrategyType::SpinWait] {
        for fair in [false, true] {
            let config = SyncConfig::with_strategy(strategy);
            let lock = Arc::new(ReentrantLock::with_config(fair, &config));
            let (count, _timeouts) = hammer_lock(lock.clone());

            assert_eq!(count, (THREADS * ITERATIONS) as i64, "{strategy:?} fair={fair}");
            assert!(!lock.is_locked());
            assert!(!lock.has_queued_threads());
        }
    }
}

#[test]
fn test_semaphore_stress_conserves_permits() {
    const PERMITS: i32 = 4;
    let sem = Arc::new(Semaphore::new(PERMITS));
    let inside = Arc::new(AtomicI64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (sem, inside) = (sem.clone(), inside.clone());
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..ITERATIONS {
                    let want = rng.gen_range(1..=2);
                    let got = match rng.gen_range(0..2) {
                        0 => sem.acquire(want).is_ok(),
                        _ => sem
                            .try_acquire_for(want, Duration::from_micros(rng.gen_range(1..300)))
                            .is_ok(),
                    };
                    if !got {
                        continue;
                    }
                    let now = inside.fetch_add(want as i64, Ordering::SeqCst) + want as i64;
                    assert!(now <= PERMITS as i64);
                    inside.fetch_sub(want as i64, Ordering::SeqCst);
                    sem.release(want).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(sem.available_permits(), PERMITS);
    assert!(!sem.has_queued_threads());
}
