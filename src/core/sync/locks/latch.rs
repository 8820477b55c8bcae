/*!
 * Countdown Latch
 *
 * One-shot gate: waiters block until `count_down` has been called as many
 * times as the initial count. Once open it stays open.
 */

use super::traits::{check_count, Synchronizer};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::config::SyncConfig;
use crate::core::sync::policy::AcquirePolicy;
use crate::core::sync::state::SyncState;
use crate::core::sync::synchronizer::SynchronizerCore;
use std::fmt;
use std::time::Duration;

/// Acquire rules for [`CountdownLatch`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LatchPolicy;

impl AcquirePolicy for LatchPolicy {
    fn try_acquire_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<i32> {
        Ok(if sync.state() == 0 { 1 } else { -1 })
    }

    fn try_release_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<bool> {
        loop {
            let count = sync.state();
            if count == 0 {
                return Ok(false);
            }
            let next = count - 1;
            if sync.compare_and_set_state(count, next) {
                return Ok(next == 0);
            }
        }
    }

    fn name(&self) -> &'static str {
        "latch"
    }
}

/// Countdown latch
///
/// # Example
///
/// ```
/// use queued_sync::CountdownLatch;
/// use std::sync::Arc;
///
/// let latch = Arc::new(CountdownLatch::new(2).unwrap());
/// let workers: Vec<_> = (0..2)
///     .map(|_| {
///         let latch = latch.clone();
///         std::thread::spawn(move || latch.count_down())
///     })
///     .collect();
///
/// latch.wait().unwrap();
/// assert_eq!(latch.count(), 0);
/// # for w in workers { w.join().unwrap(); }
/// ```
pub struct CountdownLatch {
    core: SynchronizerCore<LatchPolicy>,
}

impl CountdownLatch {
    /// Latch that opens after `count` calls to `count_down`
    pub fn new(count: i32) -> SyncResult<Self> {
        Self::with_config(count, &SyncConfig::default())
    }

    pub fn with_config(count: i32, config: &SyncConfig) -> SyncResult<Self> {
        check_count(count, 0, "latch count")?;
        Ok(Self {
            core: SynchronizerCore::with_config(LatchPolicy, count, config),
        })
    }

    /// Decrement the count, opening the latch when it reaches zero
    ///
    /// No-op once the latch is open.
    pub fn count_down(&self) {
        if let Err(err) = self.core.release_shared(1) {
            tracing::error!(error = %err, "latch count_down failed");
        }
    }

    /// Block until the latch opens, aborting with `Interrupted`
    pub fn wait(&self) -> SyncResult<()> {
        self.core.acquire_shared_interruptibly(1)
    }

    /// Block until the latch opens or `timeout` elapses
    ///
    /// Returns `Ok(false)` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        match self.core.try_acquire_shared_for(1, timeout) {
            Ok(()) => Ok(true),
            Err(SyncError::Timeout) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remaining count
    pub fn count(&self) -> i32 {
        self.core.state()
    }

    pub fn queue_length(&self) -> usize {
        self.core.queue_length()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.core.has_queued_threads()
    }

    pub fn core(&self) -> &SynchronizerCore<LatchPolicy> {
        &self.core
    }
}

impl fmt::Debug for CountdownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownLatch")
            .field("count", &self.count())
            .field("queued", &self.queue_length())
            .finish()
    }
}

/// Acquire means "wait for the latch", release(n) counts down `n` times
impl Synchronizer for CountdownLatch {
    fn acquire(&self, n: i32) -> SyncResult<()> {
        check_count(n, 0, "latch acquires")?;
        self.core.acquire_shared(1)
    }

    fn acquire_interruptibly(&self, n: i32) -> SyncResult<()> {
        check_count(n, 0, "latch acquires")?;
        self.wait()
    }

    fn try_acquire(&self, n: i32) -> SyncResult<bool> {
        check_count(n, 0, "latch acquires")?;
        self.core.try_acquire_shared(1)
    }

    fn try_acquire_timed(&self, n: i32, timeout: Duration) -> SyncResult<()> {
        check_count(n, 0, "latch acquires")?;
        self.core.try_acquire_shared_for(1, timeout)
    }

    fn release(&self, n: i32) -> SyncResult<()> {
        check_count(n, 0, "count downs")?;
        for _ in 0..n {
            self.count_down();
        }
        Ok(())
    }

    fn is_held_exclusively(&self) -> bool {
        false
    }

    fn queue_length(&self) -> usize {
        CountdownLatch::queue_length(self)
    }

    fn has_queued_threads(&self) -> bool {
        CountdownLatch::has_queued_threads(self)
    }
}
