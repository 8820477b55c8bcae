/*!
 * Synchronizer Trait
 * Common surface of every concrete synchronizer
 */

use crate::core::errors::{SyncError, SyncResult};
use std::time::Duration;

/// Uniform acquire/release interface
///
/// Lets callers and tests drive any synchronizer generically. `n` is the
/// number of holds/permits; locks only accept `n >= 1`, counting
/// synchronizers also accept zero.
pub trait Synchronizer: Send + Sync {
    /// Block until acquired, ignoring interrupts
    fn acquire(&self, n: i32) -> SyncResult<()>;

    /// Block until acquired, aborting with `Interrupted`
    fn acquire_interruptibly(&self, n: i32) -> SyncResult<()>;

    /// Single non-blocking attempt
    fn try_acquire(&self, n: i32) -> SyncResult<bool>;

    /// Block for at most `timeout`, failing with `Timeout`
    fn try_acquire_timed(&self, n: i32, timeout: Duration) -> SyncResult<()>;

    /// Give back `n`; never blocks
    fn release(&self, n: i32) -> SyncResult<()>;

    fn is_held_exclusively(&self) -> bool;

    fn queue_length(&self) -> usize;

    fn has_queued_threads(&self) -> bool;
}

/// Reject counts below `min`
#[inline]
pub(crate) fn check_count(n: i32, min: i32, what: &str) -> SyncResult<()> {
    if n < min {
        return Err(SyncError::InvalidArgument(format!(
            "{what} must be at least {min}, got {n}"
        )));
    }
    Ok(())
}
