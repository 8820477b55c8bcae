/*!
 * Read-Write Lock Tests
 * Shared readers, exclusive writers, downgrading and writer preference
 */

use pretty_assertions::assert_eq;
use queued_sync::{CountdownLatch, ReadWriteLock, SyncError};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_readers_hold_together() {
    const READERS: i32 = 4;
    let lock = Arc::new(ReadWriteLock::new());
    let all_inside = Arc::new(CountdownLatch::new(READERS).unwrap());

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let (lock, all_inside) = (lock.clone(), all_inside.clone());
            thread::spawn(move || {
                let _guard = lock.read_guard().unwrap();
                all_inside.count_down();
                // Only opens if every reader is inside at once
                all_inside.wait_timeout(Duration::from_secs(2)).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(lock.read_lock_count(), 0);
}

#[test]
fn test_writer_excludes_readers_and_writers() {
    let lock = Arc::new(ReadWriteLock::new());
    let writing = Arc::new(AtomicBool::new(false));
    let reading = Arc::new(AtomicI32::new(0));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let (lock, writing, reading) = (lock.clone(), writing.clone(), reading.clone());
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..200 {
                    if i % 2 == 0 || rng.gen_bool(0.3) {
                        let _guard = lock.write_guard().unwrap();
                        assert!(!writing.swap(true, Ordering::SeqCst), "two writers inside");
                        assert_eq!(reading.load(Ordering::SeqCst), 0, "reader inside with writer");
                        thread::yield_now();
                        writing.store(false, Ordering::SeqCst);
                    } else {
                        let _guard = lock.read_guard().unwrap();
                        reading.fetch_add(1, Ordering::SeqCst);
                        assert!(!writing.load(Ordering::SeqCst), "writer inside with reader");
                        thread::yield_now();
                        reading.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!lock.is_write_locked());
    assert_eq!(lock.read_lock_count(), 0);
    assert!(!lock.has_queued_threads());
}

#[test]
fn test_queued_writer_holds_off_new_readers() {
    for lock in [ReadWriteLock::new(), ReadWriteLock::new_fair()] {
        let lock = Arc::new(lock);
        lock.read_lock().unwrap();

        let lock_clone = lock.clone();
        let writer = thread::spawn(move || {
            lock_clone.try_write_lock_for(Duration::from_secs(2))?;
            lock_clone.write_unlock()
        });
        while lock.queue_length() < 1 {
            thread::yield_now();
        }

        // A fresh reader yields to the writer; a reentrant read does not
        let lock_clone = lock.clone();
        assert!(!thread::spawn(move || lock_clone.try_read_lock().unwrap())
            .join()
            .unwrap());
        assert!(lock.try_read_lock().unwrap());
        assert_eq!(lock.read_hold_count(), 2);

        lock.read_unlock().unwrap();
        lock.read_unlock().unwrap();
        assert_eq!(writer.join().unwrap(), Ok(()), "fair={}", lock.is_fair());
    }
}

#[test]
fn test_downgrade_admits_queued_readers() {
    const READERS: i32 = 3;
    let lock = Arc::new(ReadWriteLock::new());
    let entered = Arc::new(CountdownLatch::new(READERS).unwrap());
    lock.write_lock().unwrap();

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let (lock, entered) = (lock.clone(), entered.clone());
            thread::spawn(move || {
                lock.read_lock().unwrap();
                entered.count_down();
                lock.read_unlock().unwrap();
            })
        })
        .collect();
    while lock.queue_length() < READERS as usize {
        thread::yield_now();
    }

    lock.read_lock().unwrap();
    lock.write_unlock().unwrap();
    assert!(!lock.is_write_locked_by_current_thread());

    // Queued readers cascade in while we still hold our read
    assert!(entered.wait_timeout(Duration::from_secs(2)).unwrap());
    let lock_clone = lock.clone();
    assert!(!thread::spawn(move || lock_clone.try_write_lock().unwrap())
        .join()
        .unwrap());

    lock.read_unlock().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(lock.try_write_lock().unwrap());
    lock.write_unlock().unwrap();
}

#[test]
fn test_write_unlock_by_reader_is_illegal() {
    let lock = ReadWriteLock::new();
    lock.read_lock().unwrap();
    assert!(matches!(lock.write_unlock(), Err(SyncError::IllegalState(_))));
    assert_eq!(lock.read_hold_count(), 1);
    lock.read_unlock().unwrap();
}
