/*!
 * Reentrant Lock
 *
 * Exclusive lock the owning thread may take repeatedly. State is the hold
 * count; the lock is free again only when every hold has been released.
 */

use super::traits::{check_count, Synchronizer};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::condition::Condition;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::policy::AcquirePolicy;
use crate::core::sync::state::SyncState;
use crate::core::sync::synchronizer::SynchronizerCore;
use crate::core::sync::thread::{ThreadHandle, ThreadId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Acquire rules for [`ReentrantLock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReentrantPolicy {
    fair: bool,
}

impl AcquirePolicy for ReentrantPolicy {
    fn try_acquire(&self, sync: &SyncState, acquires: i32) -> SyncResult<bool> {
        let holds = sync.state();
        if holds == 0 {
            if self.fair && sync.has_queued_predecessors() {
                return Ok(false);
            }
            if sync.compare_and_set_state(0, acquires) {
                sync.set_owner_current();
                return Ok(true);
            }
            return Ok(false);
        }

        if sync.is_owned_by_current() {
            // Only the owner writes here, so a plain store is enough
            let next = holds.checked_add(acquires).ok_or_else(|| {
                SyncError::Overflow(format!("maximum lock count exceeded ({holds} + {acquires})"))
            })?;
            sync.set_state(next);
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, sync: &SyncState, releases: i32) -> SyncResult<bool> {
        if !sync.is_owned_by_current() {
            return Err(SyncError::not_owner());
        }
        let holds = sync.state();
        if releases > holds {
            return Err(SyncError::IllegalState(format!(
                "releasing {releases} holds but only {holds} held"
            )));
        }

        let remaining = holds - releases;
        let free = remaining == 0;
        if free {
            sync.set_owner(None);
        }
        sync.set_state(remaining);
        Ok(free)
    }

    fn is_held_exclusively(&self, sync: &SyncState) -> bool {
        sync.is_owned_by_current()
    }

    fn name(&self) -> &'static str {
        if self.fair {
            "reentrant(fair)"
        } else {
            "reentrant"
        }
    }
}

/// Reentrant mutual-exclusion lock with optional fairness and conditions
///
/// # Example
///
/// ```
/// use queued_sync::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// lock.lock().unwrap();
/// lock.lock().unwrap();
/// assert_eq!(lock.hold_count(), 2);
/// lock.unlock().unwrap();
/// lock.unlock().unwrap();
/// assert!(!lock.is_locked());
/// ```
pub struct ReentrantLock {
    core: Arc<SynchronizerCore<ReentrantPolicy>>,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self::with_config(false, &SyncConfig::default())
    }

    pub fn new_fair() -> Self {
        Self::with_config(true, &SyncConfig::default())
    }

    pub fn with_config(fair: bool, config: &SyncConfig) -> Self {
        Self {
            core: Arc::new(SynchronizerCore::with_config(
                ReentrantPolicy { fair },
                0,
                config,
            )),
        }
    }

    /// Take one hold, blocking if another thread owns the lock
    pub fn lock(&self) -> SyncResult<()> {
        self.core.acquire(1)
    }

    pub fn lock_interruptibly(&self) -> SyncResult<()> {
        self.core.acquire_interruptibly(1)
    }

    /// Take one hold if possible right now
    pub fn try_lock(&self) -> SyncResult<bool> {
        self.core.try_acquire(1)
    }

    pub fn try_lock_for(&self, timeout: Duration) -> SyncResult<()> {
        self.core.try_acquire_for(1, timeout)
    }

    /// Drop one hold
    pub fn unlock(&self) -> SyncResult<()> {
        self.core.release(1).map(|_| ())
    }

    pub fn guard(&self) -> SyncResult<ReentrantLockGuard<'_>> {
        self.lock()?;
        Ok(ReentrantLockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    pub fn new_condition(&self) -> Condition<ReentrantPolicy> {
        Condition::new(self.core.clone())
    }

    /// Holds owned by the calling thread (0 if it is not the owner)
    pub fn hold_count(&self) -> i32 {
        if self.core.is_held_exclusively() {
            self.core.state()
        } else {
            0
        }
    }

    pub fn is_locked(&self) -> bool {
        self.core.state() != 0
    }

    pub fn is_fair(&self) -> bool {
        self.core.policy().fair
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.core.is_held_exclusively()
    }

    /// Current owner, if any (racy snapshot)
    pub fn owner(&self) -> Option<ThreadId> {
        self.core.sync_state().owner()
    }

    pub fn queue_length(&self) -> usize {
        self.core.queue_length()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.core.has_queued_threads()
    }

    pub fn has_queued_thread(&self, thread: &ThreadHandle) -> bool {
        self.core.is_queued(thread)
    }

    pub fn core(&self) -> &SynchronizerCore<ReentrantPolicy> {
        &self.core
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("holds", &self.core.state())
            .field("owner", &self.owner())
            .field("fair", &self.is_fair())
            .field("queued", &self.queue_length())
            .finish()
    }
}

impl Synchronizer for ReentrantLock {
    fn acquire(&self, n: i32) -> SyncResult<()> {
        check_count(n, 1, "holds")?;
        self.core.acquire(n)
    }

    fn acquire_interruptibly(&self, n: i32) -> SyncResult<()> {
        check_count(n, 1, "holds")?;
        self.core.acquire_interruptibly(n)
    }

    fn try_acquire(&self, n: i32) -> SyncResult<bool> {
        check_count(n, 1, "holds")?;
        self.core.try_acquire(n)
    }

    fn try_acquire_timed(&self, n: i32, timeout: Duration) -> SyncResult<()> {
        check_count(n, 1, "holds")?;
        self.core.try_acquire_for(n, timeout)
    }

    fn release(&self, n: i32) -> SyncResult<()> {
        check_count(n, 1, "holds")?;
        self.core.release(n).map(|_| ())
    }

    fn is_held_exclusively(&self) -> bool {
        self.is_held_by_current_thread()
    }

    fn queue_length(&self) -> usize {
        ReentrantLock::queue_length(self)
    }

    fn has_queued_threads(&self) -> bool {
        ReentrantLock::has_queued_threads(self)
    }
}

/// RAII guard returned by [`ReentrantLock::guard`]; drops one hold
pub struct ReentrantLockGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            tracing::error!(error = %err, "reentrant lock guard failed to unlock");
        }
    }
}

impl fmt::Debug for ReentrantLockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLockGuard")
            .field("holds", &self.lock.hold_count())
            .finish()
    }
}
