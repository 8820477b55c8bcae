/*!
 * Condition Tests
 * Monitor-style coordination on Mutex and ReentrantLock
 */

use pretty_assertions::assert_eq;
use queued_sync::core::sync::locks::MutexPolicy;
use queued_sync::core::sync::thread;
use queued_sync::{Condition, Mutex, ReentrantLock, SyncError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread as std_thread;
use std::time::Duration;

/// Bounded buffer guarded by a Mutex with not-full / not-empty conditions
struct BoundedBuffer {
    lock: Mutex,
    not_full: Condition<MutexPolicy>,
    not_empty: Condition<MutexPolicy>,
    items: parking_lot::Mutex<VecDeque<u32>>,
    capacity: usize,
}

impl BoundedBuffer {
    fn new(capacity: usize) -> Self {
        let lock = Mutex::new();
        let not_full = lock.new_condition();
        let not_empty = lock.new_condition();
        Self {
            lock,
            not_full,
            not_empty,
            items: parking_lot::Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    fn put(&self, item: u32) {
        let _guard = self.lock.guard().unwrap();
        while self.items.lock().len() == self.capacity {
            self.not_full.wait().unwrap();
        }
        self.items.lock().push_back(item);
        self.not_empty.signal().unwrap();
    }

    fn take(&self) -> u32 {
        let _guard = self.lock.guard().unwrap();
        loop {
            if let Some(item) = self.items.lock().pop_front() {
                self.not_full.signal().unwrap();
                return item;
            }
            self.not_empty.wait().unwrap();
        }
    }
}

#[test]
fn test_producer_consumer() {
    let buffer = Arc::new(BoundedBuffer::new(2));

    let producer = {
        let buffer = buffer.clone();
        std_thread::spawn(move || {
            for i in 0..200 {
                buffer.put(i);
            }
        })
    };

    let consumer = {
        let buffer = buffer.clone();
        std_thread::spawn(move || (0..200).map(|_| buffer.take()).collect::<Vec<_>>())
    };

    producer.join().unwrap();
    let received = consumer.join().unwrap();
    assert_eq!(received, (0..200).collect::<Vec<_>>());
}

#[test]
fn test_signal_all_wakes_every_waiter() {
    let lock = Arc::new(ReentrantLock::new());
    let cond = Arc::new(lock.new_condition());
    let woken = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let (lock, cond, woken) = (lock.clone(), cond.clone(), woken.clone());
            std_thread::spawn(move || {
                lock.lock().unwrap();
                cond.wait().unwrap();
                woken.fetch_add(1, Ordering::SeqCst);
                lock.unlock().unwrap();
            })
        })
        .collect();

    loop {
        lock.lock().unwrap();
        if cond.wait_queue_length().unwrap() == 4 {
            break;
        }
        lock.unlock().unwrap();
        std_thread::yield_now();
    }
    cond.signal_all().unwrap();
    assert!(!cond.has_waiters().unwrap());
    lock.unlock().unwrap();

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 4);
}

#[test]
fn test_wait_restores_reentrant_holds() {
    let lock = Arc::new(ReentrantLock::new());
    let cond = Arc::new(lock.new_condition());

    let (lock2, cond2) = (lock.clone(), cond.clone());
    let waiter = std_thread::spawn(move || {
        for _ in 0..3 {
            lock2.lock().unwrap();
        }
        cond2.wait().unwrap();
        let holds = lock2.hold_count();
        for _ in 0..3 {
            lock2.unlock().unwrap();
        }
        holds
    });

    loop {
        lock.lock().unwrap();
        if cond.has_waiters().unwrap() {
            break;
        }
        lock.unlock().unwrap();
        std_thread::yield_now();
    }
    // The waiter gave up all three holds
    assert_eq!(lock.hold_count(), 1);
    cond.signal().unwrap();
    lock.unlock().unwrap();

    assert_eq!(waiter.join().unwrap(), 3);
}

#[test]
fn test_interrupt_after_signal_reasserts_flag() {
    let lock = Arc::new(ReentrantLock::new());
    let cond = Arc::new(lock.new_condition());

    let (tx, rx) = mpsc::channel();
    let (lock2, cond2) = (lock.clone(), cond.clone());
    let waiter = std_thread::spawn(move || {
        tx.send(thread::current()).unwrap();
        lock2.lock().unwrap();
        let result = cond2.wait();
        let flagged = thread::current().clear_interrupt();
        lock2.unlock().unwrap();
        (result, flagged)
    });
    let handle = rx.recv().unwrap();

    loop {
        lock.lock().unwrap();
        if cond.has_waiters().unwrap() {
            break;
        }
        lock.unlock().unwrap();
        std_thread::yield_now();
    }
    // Signal first, then interrupt while the waiter is still blocked on the lock
    cond.signal().unwrap();
    handle.interrupt();
    std_thread::sleep(Duration::from_millis(20));
    lock.unlock().unwrap();

    let (result, flagged) = waiter.join().unwrap();
    assert_eq!(result, Ok(()));
    assert!(flagged);
}

#[test]
fn test_wait_timeout_reports_signal() {
    let lock = Arc::new(Mutex::new());
    let cond = Arc::new(lock.new_condition());

    let (lock2, cond2) = (lock.clone(), cond.clone());
    let waiter = std_thread::spawn(move || {
        let _guard = lock2.guard().unwrap();
        cond2.wait_timeout(Duration::from_secs(5))
    });

    loop {
        let _guard = lock.guard().unwrap();
        if cond.has_waiters().unwrap() {
            cond.signal().unwrap();
            break;
        }
    }

    assert_eq!(waiter.join().unwrap(), Ok(true));
}

#[test]
fn test_wait_without_lock_leaves_condition_unchanged() {
    let lock = Mutex::new();
    let cond = lock.new_condition();

    assert!(matches!(cond.wait_uninterruptibly(), Err(SyncError::IllegalState(_))));
    assert!(matches!(
        cond.wait_timeout(Duration::from_millis(1)),
        Err(SyncError::IllegalState(_))
    ));

    lock.lock().unwrap();
    assert_eq!(cond.wait_queue_length().unwrap(), 0);
    lock.unlock().unwrap();
}
