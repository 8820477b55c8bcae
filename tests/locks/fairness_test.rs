/*!
 * Fairness Tests
 * FIFO hand-off order for fair locks and semaphores
 */

use pretty_assertions::assert_eq;
use queued_sync::{Mutex, ReentrantLock, Semaphore, StrategyType, SyncConfig};
use serial_test::serial;
use std::sync::Arc;
use std::thread;

/// Queue threads 1..=n one at a time behind a held lock, then release it
fn acquisition_order<L, F>(
    lock: Arc<L>,
    n: usize,
    queued: F,
    take: fn(&L),
    give: fn(&L),
) -> Vec<usize>
where
    L: Send + Sync + 'static,
    F: Fn(&L) -> usize,
{
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    take(&lock);

    let mut handles = Vec::new();
    for id in 1..=n {
        let (lock_clone, order) = (lock.clone(), order.clone());
        handles.push(thread::spawn(move || {
            take(&lock_clone);
            order.lock().push(id);
            give(&lock_clone);
        }));
        while queued(&lock) < id {
            thread::yield_now();
        }
    }

    give(&lock);
    for handle in handles {
        handle.join().unwrap();
    }
    let result = order.lock().clone();
    result
}

#[test]
#[serial]
fn test_fair_reentrant_lock_fifo() {
    let order = acquisition_order(
        Arc::new(ReentrantLock::new_fair()),
        5,
        |l| l.queue_length(),
        |l| l.lock().unwrap(),
        |l| l.unlock().unwrap(),
    );
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
}

#[test]
#[serial]
fn test_fair_mutex_fifo_every_strategy() {
    for strategy in [StrategyType::Futex, StrategyType::Condvar, StrategyType::SpinWait] {
        let config = SyncConfig::with_strategy(strategy);
        let order = acquisition_order(
            Arc::new(Mutex::with_config(true, &config)),
            5,
            |m| m.queue_length(),
            |m| m.lock().unwrap(),
            |m| m.unlock().unwrap(),
        );
        assert_eq!(order, vec![1, 2, 3, 4, 5], "strategy {strategy:?}");
    }
}

#[test]
#[serial]
fn test_fair_semaphore_fifo() {
    let order = acquisition_order(
        Arc::new(Semaphore::new_fair(1)),
        5,
        |s| s.queue_length(),
        |s| s.acquire_one().unwrap(),
        |s| s.release_one().unwrap(),
    );
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
}
