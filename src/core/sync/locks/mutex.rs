/*!
 * Mutex
 *
 * Non-reentrant exclusive lock. State is 0 (free) or 1 (held); the owner is
 * recorded so only the holder may unlock.
 */

use super::traits::Synchronizer;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::condition::Condition;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::policy::AcquirePolicy;
use crate::core::sync::state::SyncState;
use crate::core::sync::synchronizer::SynchronizerCore;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Acquire rules for [`Mutex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexPolicy {
    fair: bool,
}

impl AcquirePolicy for MutexPolicy {
    fn try_acquire(&self, sync: &SyncState, _arg: i32) -> SyncResult<bool> {
        if self.fair && sync.has_queued_predecessors() {
            return Ok(false);
        }
        if sync.compare_and_set_state(0, 1) {
            sync.set_owner_current();
            return Ok(true);
        }
        Ok(false)
    }

    fn try_release(&self, sync: &SyncState, _arg: i32) -> SyncResult<bool> {
        if sync.state() == 0 {
            return Err(SyncError::IllegalState("mutex is not locked".into()));
        }
        if !sync.is_owned_by_current() {
            return Err(SyncError::not_owner());
        }
        sync.set_owner(None);
        sync.set_state(0);
        Ok(true)
    }

    fn is_held_exclusively(&self, sync: &SyncState) -> bool {
        sync.state() == 1 && sync.is_owned_by_current()
    }

    fn name(&self) -> &'static str {
        if self.fair {
            "mutex(fair)"
        } else {
            "mutex"
        }
    }
}

/// Mutual-exclusion lock that does not guard data
///
/// Locking twice from the same thread deadlocks; use
/// [`ReentrantLock`](super::ReentrantLock) for that.
///
/// # Example
///
/// ```
/// use queued_sync::Mutex;
///
/// let mutex = Mutex::new();
/// {
///     let _guard = mutex.guard().unwrap();
///     assert!(mutex.is_locked());
/// }
/// assert!(!mutex.is_locked());
/// ```
pub struct Mutex {
    core: Arc<SynchronizerCore<MutexPolicy>>,
}

impl Mutex {
    /// Non-fair mutex with default configuration
    pub fn new() -> Self {
        Self::with_config(false, &SyncConfig::default())
    }

    /// FIFO-fair mutex: never barges ahead of queued threads
    pub fn new_fair() -> Self {
        Self::with_config(true, &SyncConfig::default())
    }

    pub fn with_config(fair: bool, config: &SyncConfig) -> Self {
        Self {
            core: Arc::new(SynchronizerCore::with_config(
                MutexPolicy { fair },
                0,
                config,
            )),
        }
    }

    /// Block until locked; interrupts are re-asserted on return
    pub fn lock(&self) -> SyncResult<()> {
        self.core.acquire(1)
    }

    pub fn lock_interruptibly(&self) -> SyncResult<()> {
        self.core.acquire_interruptibly(1)
    }

    /// Lock only if free right now
    ///
    /// A fair mutex also refuses when other threads are queued.
    pub fn try_lock(&self) -> bool {
        matches!(self.core.try_acquire(1), Ok(true))
    }

    pub fn try_lock_for(&self, timeout: Duration) -> SyncResult<()> {
        self.core.try_acquire_for(1, timeout)
    }

    /// Unlock; fails with `IllegalState` unless the caller holds the lock
    pub fn unlock(&self) -> SyncResult<()> {
        self.core.release(1).map(|_| ())
    }

    /// Lock and return a guard that unlocks on drop
    pub fn guard(&self) -> SyncResult<MutexGuard<'_>> {
        self.lock()?;
        Ok(MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// New condition bound to this mutex
    pub fn new_condition(&self) -> Condition<MutexPolicy> {
        Condition::new(self.core.clone())
    }

    pub fn is_locked(&self) -> bool {
        self.core.state() != 0
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.core.is_held_exclusively()
    }

    pub fn is_fair(&self) -> bool {
        self.core.policy().fair
    }

    pub fn queue_length(&self) -> usize {
        self.core.queue_length()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.core.has_queued_threads()
    }

    /// Underlying synchronizer, for introspection
    pub fn core(&self) -> &SynchronizerCore<MutexPolicy> {
        &self.core
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .field("fair", &self.is_fair())
            .field("owner", &self.core.sync_state().owner())
            .field("queued", &self.queue_length())
            .finish()
    }
}

fn check_single(n: i32) -> SyncResult<()> {
    if n != 1 {
        return Err(SyncError::InvalidArgument(format!(
            "a mutex is acquired and released one hold at a time, got {n}"
        )));
    }
    Ok(())
}

impl Synchronizer for Mutex {
    fn acquire(&self, n: i32) -> SyncResult<()> {
        check_single(n)?;
        self.lock()
    }

    fn acquire_interruptibly(&self, n: i32) -> SyncResult<()> {
        check_single(n)?;
        self.lock_interruptibly()
    }

    fn try_acquire(&self, n: i32) -> SyncResult<bool> {
        check_single(n)?;
        self.core.try_acquire(1)
    }

    fn try_acquire_timed(&self, n: i32, timeout: Duration) -> SyncResult<()> {
        check_single(n)?;
        self.try_lock_for(timeout)
    }

    fn release(&self, n: i32) -> SyncResult<()> {
        check_single(n)?;
        self.unlock()
    }

    fn is_held_exclusively(&self) -> bool {
        self.is_held_by_current_thread()
    }

    fn queue_length(&self) -> usize {
        Mutex::queue_length(self)
    }

    fn has_queued_threads(&self) -> bool {
        Mutex::has_queued_threads(self)
    }
}

/// RAII guard returned by [`Mutex::guard`]
///
/// Not `Send`: the unlock must happen on the locking thread.
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.unlock() {
            tracing::error!(error = %err, "mutex guard failed to unlock");
        }
    }
}

impl fmt::Debug for MutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}
