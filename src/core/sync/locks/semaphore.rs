/*!
 * Counting Semaphore
 *
 * Shared-mode synchronizer whose state is the number of available permits.
 * Acquires CAS the count down and queue when it would go negative; releases
 * CAS it up and wake queued acquirers, several at a time if enough permits
 * came back.
 */

use super::traits::{check_count, Synchronizer};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::config::SyncConfig;
use crate::core::sync::policy::AcquirePolicy;
use crate::core::sync::state::SyncState;
use crate::core::sync::synchronizer::SynchronizerCore;
use std::fmt;
use std::time::Duration;

/// Acquire rules for [`Semaphore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphorePolicy {
    fair: bool,
}

impl AcquirePolicy for SemaphorePolicy {
    fn try_acquire_shared(&self, sync: &SyncState, acquires: i32) -> SyncResult<i32> {
        loop {
            if self.fair && sync.has_queued_predecessors() {
                return Ok(-1);
            }
            let available = sync.state();
            let remaining = available.saturating_sub(acquires);
            if remaining < 0 || sync.compare_and_set_state(available, remaining) {
                return Ok(remaining);
            }
        }
    }

    fn try_release_shared(&self, sync: &SyncState, releases: i32) -> SyncResult<bool> {
        loop {
            let current = sync.state();
            let next = current.checked_add(releases).ok_or_else(|| {
                SyncError::Overflow(format!(
                    "maximum permit count exceeded ({current} + {releases})"
                ))
            })?;
            if sync.compare_and_set_state(current, next) {
                return Ok(true);
            }
        }
    }

    fn name(&self) -> &'static str {
        if self.fair {
            "semaphore(fair)"
        } else {
            "semaphore"
        }
    }
}

/// Counting semaphore
///
/// The initial count may be negative, in which case releases must happen
/// before any acquire can succeed.
///
/// # Example
///
/// ```
/// use queued_sync::Semaphore;
///
/// let pool = Semaphore::new(2);
/// pool.acquire(2).unwrap();
/// assert!(!pool.try_acquire(1).unwrap());
/// pool.release(1).unwrap();
/// assert_eq!(pool.available_permits(), 1);
/// ```
pub struct Semaphore {
    core: SynchronizerCore<SemaphorePolicy>,
}

impl Semaphore {
    pub fn new(permits: i32) -> Self {
        Self::with_config(permits, false, &SyncConfig::default())
    }

    /// FIFO-fair semaphore: acquirers never overtake queued threads
    pub fn new_fair(permits: i32) -> Self {
        Self::with_config(permits, true, &SyncConfig::default())
    }

    pub fn with_config(permits: i32, fair: bool, config: &SyncConfig) -> Self {
        Self {
            core: SynchronizerCore::with_config(SemaphorePolicy { fair }, permits, config),
        }
    }

    /// Take `permits`, blocking until enough are available
    pub fn acquire(&self, permits: i32) -> SyncResult<()> {
        check_count(permits, 0, "permits")?;
        self.core.acquire_shared(permits)
    }

    pub fn acquire_interruptibly(&self, permits: i32) -> SyncResult<()> {
        check_count(permits, 0, "permits")?;
        self.core.acquire_shared_interruptibly(permits)
    }

    /// Take `permits` only if available right now
    ///
    /// A fair semaphore also refuses while other threads are queued.
    pub fn try_acquire(&self, permits: i32) -> SyncResult<bool> {
        check_count(permits, 0, "permits")?;
        self.core.try_acquire_shared(permits)
    }

    pub fn try_acquire_for(&self, permits: i32, timeout: Duration) -> SyncResult<()> {
        check_count(permits, 0, "permits")?;
        self.core.try_acquire_shared_for(permits, timeout)
    }

    /// Return `permits`; any thread may release, not only an acquirer
    pub fn release(&self, permits: i32) -> SyncResult<()> {
        check_count(permits, 0, "permits")?;
        self.core.release_shared(permits).map(|_| ())
    }

    #[inline]
    pub fn acquire_one(&self) -> SyncResult<()> {
        self.acquire(1)
    }

    #[inline]
    pub fn release_one(&self) -> SyncResult<()> {
        self.release(1)
    }

    pub fn available_permits(&self) -> i32 {
        self.core.state()
    }

    /// Take every available permit, returning how many were taken
    pub fn drain_permits(&self) -> i32 {
        let sync = self.core.sync_state();
        loop {
            let current = sync.state();
            if current == 0 || sync.compare_and_set_state(current, 0) {
                return current;
            }
        }
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

    pub fn core(&self) -> &SynchronizerCore<SemaphorePolicy> {
        &self.core
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available_permits())
            .field("fair", &self.is_fair())
            .field("queued", &self.queue_length())
            .finish()
    }
}

impl Synchronizer for Semaphore {
    fn acquire(&self, n: i32) -> SyncResult<()> {
        Semaphore::acquire(self, n)
    }

    fn acquire_interruptibly(&self, n: i32) -> SyncResult<()> {
        Semaphore::acquire_interruptibly(self, n)
    }

    fn try_acquire(&self, n: i32) -> SyncResult<bool> {
        Semaphore::try_acquire(self, n)
    }

    fn try_acquire_timed(&self, n: i32, timeout: Duration) -> SyncResult<()> {
        self.try_acquire_for(n, timeout)
    }

    fn release(&self, n: i32) -> SyncResult<()> {
        Semaphore::release(self, n)
    }

    fn is_held_exclusively(&self) -> bool {
        false
    }

    fn queue_length(&self) -> usize {
        Semaphore::queue_length(self)
    }

    fn has_queued_threads(&self) -> bool {
        Semaphore::has_queued_threads(self)
    }
}
