/*!
 * Read-Write Lock
 *
 * Reentrant reader/writer lock on one state word: the low 16 bits count
 * write holds, the bits above count read holds across all threads.
 *
 * ```text
 *  31 30            16 15             0
 * ┌──┬────────────────┬────────────────┐
 * │0 │  read holds    │  write holds   │
 * └──┴────────────────┴────────────────┘
 * ```
 *
 * Writers acquire in exclusive mode, readers in shared mode, so a release
 * by the last reader wakes a queued writer and a writer's release cascades
 * through every reader queued behind it.
 *
 * The writer may take read holds and then drop the write hold (downgrade).
 * A reader can never upgrade: a write acquire while holding a read hold
 * blocks forever, the same as for any other reader.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::condition::Condition;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::policy::AcquirePolicy;
use crate::core::sync::state::SyncState;
use crate::core::sync::synchronizer::SynchronizerCore;
use crate::core::sync::thread::{self, ThreadId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

const SHARED_SHIFT: u32 = 16;
const SHARED_UNIT: i32 = 1 << SHARED_SHIFT;
/// Keeps the packed state non-negative
const MAX_READ_HOLDS: i32 = (1 << 15) - 1;
const MAX_WRITE_HOLDS: i32 = (1 << SHARED_SHIFT) - 1;

#[inline]
fn read_holds(state: i32) -> i32 {
    state >> SHARED_SHIFT
}

#[inline]
fn write_holds(state: i32) -> i32 {
    state & MAX_WRITE_HOLDS
}

/// Acquire rules for [`ReadWriteLock`]
pub struct ReadWritePolicy {
    fair: bool,
    /// Read holds per thread; the packed state only has the total
    readers: Mutex<HashMap<ThreadId, i32>>,
}

impl ReadWritePolicy {
    fn new(fair: bool) -> Self {
        Self {
            fair,
            readers: Mutex::new(HashMap::new()),
        }
    }

    fn reads_held_by(&self, id: ThreadId) -> i32 {
        self.readers.lock().get(&id).copied().unwrap_or(0)
    }

    /// Whether a new reader should queue instead of barging
    ///
    /// Non-fair readers only yield to a writer at the front of the queue.
    fn reader_should_block(&self, sync: &SyncState) -> bool {
        if self.fair {
            sync.has_queued_predecessors()
        } else {
            sync.first_queued_is_exclusive()
        }
    }
}

impl AcquirePolicy for ReadWritePolicy {
    fn try_acquire(&self, sync: &SyncState, acquires: i32) -> SyncResult<bool> {
        let state = sync.state();
        if state != 0 {
            // Readers present (possibly our own), or another writer
            if write_holds(state) == 0 || !sync.is_owned_by_current() {
                return Ok(false);
            }
            let holds = write_holds(state);
            if acquires > MAX_WRITE_HOLDS - holds {
                return Err(SyncError::Overflow(format!(
                    "maximum write lock count exceeded ({holds} + {acquires})"
                )));
            }
            sync.set_state(state + acquires);
            return Ok(true);
        }

        if self.fair && sync.has_queued_predecessors() {
            return Ok(false);
        }
        if sync.compare_and_set_state(0, acquires) {
            sync.set_owner_current();
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, sync: &SyncState, releases: i32) -> SyncResult<bool> {
        if !sync.is_owned_by_current() {
            return Err(SyncError::not_owner());
        }
        let state = sync.state();
        let holds = write_holds(state);
        if releases > holds {
            return Err(SyncError::IllegalState(format!(
                "releasing {releases} write holds but only {holds} held"
            )));
        }

        let next = state - releases;
        let free = write_holds(next) == 0;
        if free {
            sync.set_owner(None);
        }
        sync.set_state(next);
        Ok(free)
    }

    fn try_acquire_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<i32> {
        let me = thread::current_id();
        loop {
            let state = sync.state();
            if write_holds(state) != 0 {
                if sync.owner() != Some(me) {
                    return Ok(-1);
                }
                // The writer itself may always read (downgrade path)
            } else if self.reader_should_block(sync) && self.reads_held_by(me) == 0 {
                return Ok(-1);
            }

            if read_holds(state) == MAX_READ_HOLDS {
                return Err(SyncError::Overflow(format!(
                    "maximum read lock count exceeded ({MAX_READ_HOLDS})"
                )));
            }
            if sync.compare_and_set_state(state, state + SHARED_UNIT) {
                *self.readers.lock().entry(me).or_insert(0) += 1;
                return Ok(1);
            }
        }
    }

    fn try_release_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<bool> {
        let me = thread::current_id();
        {
            let mut readers = self.readers.lock();
            match readers.get(&me).copied().unwrap_or(0) {
                0 => {
                    return Err(SyncError::IllegalState(
                        "read lock not held by current thread".into(),
                    ))
                }
                1 => {
                    readers.remove(&me);
                }
                _ => {
                    if let Some(holds) = readers.get_mut(&me) {
                        *holds -= 1;
                    }
                }
            }
        }

        loop {
            let state = sync.state();
            let next = state - SHARED_UNIT;
            if sync.compare_and_set_state(state, next) {
                return Ok(next == 0);
            }
        }
    }

    fn is_held_exclusively(&self, sync: &SyncState) -> bool {
        write_holds(sync.state()) != 0 && sync.is_owned_by_current()
    }

    fn name(&self) -> &'static str {
        if self.fair {
            "rwlock(fair)"
        } else {
            "rwlock"
        }
    }
}

impl fmt::Debug for ReadWritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWritePolicy")
            .field("fair", &self.fair)
            .field("reader_threads", &self.readers.lock().len())
            .finish()
    }
}

/// Reentrant read-write lock with optional fairness and downgrading
///
/// # Example
///
/// ```
/// use queued_sync::ReadWriteLock;
///
/// let lock = ReadWriteLock::new();
/// lock.write_lock().unwrap();
/// // Downgrade: take a read hold before giving up the write hold
/// lock.read_lock().unwrap();
/// lock.write_unlock().unwrap();
/// assert!(!lock.is_write_locked());
/// assert_eq!(lock.read_lock_count(), 1);
/// lock.read_unlock().unwrap();
/// ```
pub struct ReadWriteLock {
    core: Arc<SynchronizerCore<ReadWritePolicy>>,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self::with_config(false, &SyncConfig::default())
    }

    pub fn new_fair() -> Self {
        Self::with_config(true, &SyncConfig::default())
    }

    pub fn with_config(fair: bool, config: &SyncConfig) -> Self {
        Self {
            core: Arc::new(SynchronizerCore::with_config(
                ReadWritePolicy::new(fair),
                0,
                config,
            )),
        }
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    /// Take a read hold, blocking while another thread writes
    pub fn read_lock(&self) -> SyncResult<()> {
        self.core.acquire_shared(1)
    }

    pub fn read_lock_interruptibly(&self) -> SyncResult<()> {
        self.core.acquire_shared_interruptibly(1)
    }

    pub fn try_read_lock(&self) -> SyncResult<bool> {
        self.core.try_acquire_shared(1)
    }

    pub fn try_read_lock_for(&self, timeout: Duration) -> SyncResult<()> {
        self.core.try_acquire_shared_for(1, timeout)
    }

    /// Drop one of the calling thread's read holds
    pub fn read_unlock(&self) -> SyncResult<()> {
        self.core.release_shared(1).map(|_| ())
    }

    pub fn read_guard(&self) -> SyncResult<ReadGuard<'_>> {
        self.read_lock()?;
        Ok(ReadGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    // =========================================================================
    // WRITE SIDE
    // =========================================================================

    /// Take a write hold, blocking while anyone else reads or writes
    pub fn write_lock(&self) -> SyncResult<()> {
        self.core.acquire(1)
    }

    pub fn write_lock_interruptibly(&self) -> SyncResult<()> {
        self.core.acquire_interruptibly(1)
    }

    pub fn try_write_lock(&self) -> SyncResult<bool> {
        self.core.try_acquire(1)
    }

    pub fn try_write_lock_for(&self, timeout: Duration) -> SyncResult<()> {
        self.core.try_acquire_for(1, timeout)
    }

    pub fn write_unlock(&self) -> SyncResult<()> {
        self.core.release(1).map(|_| ())
    }

    pub fn write_guard(&self) -> SyncResult<WriteGuard<'_>> {
        self.write_lock()?;
        Ok(WriteGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Condition bound to the write lock
    ///
    /// Waiting while also holding read holds is `IllegalState`.
    pub fn new_write_condition(&self) -> Condition<ReadWritePolicy> {
        Condition::new(self.core.clone())
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Read holds across all threads
    pub fn read_lock_count(&self) -> i32 {
        read_holds(self.core.state())
    }

    /// Read holds of the calling thread
    pub fn read_hold_count(&self) -> i32 {
        self.core.policy().reads_held_by(thread::current_id())
    }

    /// Write holds of the calling thread (0 if it is not the writer)
    pub fn write_hold_count(&self) -> i32 {
        if self.core.is_held_exclusively() {
            write_holds(self.core.state())
        } else {
            0
        }
    }

    pub fn is_write_locked(&self) -> bool {
        write_holds(self.core.state()) != 0
    }

    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.core.is_held_exclusively()
    }

    pub fn is_fair(&self) -> bool {
        self.core.policy().fair
    }

    /// Current writer, if any (racy snapshot)
    pub fn owner(&self) -> Option<ThreadId> {
        self.core.sync_state().owner()
    }

    pub fn queue_length(&self) -> usize {
        self.core.queue_length()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.core.has_queued_threads()
    }

    pub fn core(&self) -> &SynchronizerCore<ReadWritePolicy> {
        &self.core
    }
}

impl Default for ReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadWriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteLock")
            .field("readers", &self.read_lock_count())
            .field("writer", &self.owner())
            .field("fair", &self.is_fair())
            .field("queued", &self.queue_length())
            .finish()
    }
}

/// RAII read hold returned by [`ReadWriteLock::read_guard`]
pub struct ReadGuard<'a> {
    lock: &'a ReadWriteLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.read_unlock() {
            tracing::error!(error = %err, "read guard failed to unlock");
        }
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard")
            .field("holds", &self.lock.read_hold_count())
            .finish()
    }
}

/// RAII write hold returned by [`ReadWriteLock::write_guard`]
pub struct WriteGuard<'a> {
    lock: &'a ReadWriteLock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> WriteGuard<'a> {
    /// Trade the write hold for a read hold
    ///
    /// The read hold is taken first, so no other writer can get in between.
    pub fn downgrade(self) -> SyncResult<ReadGuard<'a>> {
        let lock = self.lock;
        lock.read_lock()?;
        let read = ReadGuard {
            lock,
            _not_send: PhantomData,
        };
        std::mem::forget(self);
        lock.write_unlock()?;
        Ok(read)
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.write_unlock() {
            tracing::error!(error = %err, "write guard failed to unlock");
        }
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard")
            .field("holds", &self.lock.write_hold_count())
            .finish()
    }
}
