/*!
 * Acquisition Policy
 *
 * The pluggable half of a synchronizer: a handful of non-blocking functions
 * that give the state word its meaning. The queueing and parking half lives
 * in `SynchronizerCore` and is shared by every policy.
 */

use super::state::SyncState;
use crate::core::errors::{SyncError, SyncResult};

/// Non-blocking acquire/release rules for one kind of synchronizer
///
/// Implement the exclusive pair, the shared pair, or both. Unimplemented
/// modes report `SyncError::Unsupported`.
///
/// All methods must be non-blocking and may be called concurrently from
/// any thread. Transient CAS failures are retried inside the method, never
/// reported.
pub trait AcquirePolicy: Send + Sync {
    /// Try to take exclusive ownership
    fn try_acquire(&self, sync: &SyncState, arg: i32) -> SyncResult<bool> {
        let _ = (sync, arg);
        Err(SyncError::unsupported("exclusive"))
    }

    /// Give back exclusive ownership
    ///
    /// Returns true when the resource is fully free and a queued thread
    /// should be woken.
    fn try_release(&self, sync: &SyncState, arg: i32) -> SyncResult<bool> {
        let _ = (sync, arg);
        Err(SyncError::unsupported("exclusive"))
    }

    /// Try to acquire in shared mode
    ///
    /// Negative on failure. Zero means success with nothing left for other
    /// shared acquirers; positive means later shared acquirers may succeed
    /// too.
    fn try_acquire_shared(&self, sync: &SyncState, arg: i32) -> SyncResult<i32> {
        let _ = (sync, arg);
        Err(SyncError::unsupported("shared"))
    }

    /// Release in shared mode, returning whether waiters should be woken
    fn try_release_shared(&self, sync: &SyncState, arg: i32) -> SyncResult<bool> {
        let _ = (sync, arg);
        Err(SyncError::unsupported("shared"))
    }

    /// Whether the calling thread holds the synchronizer exclusively
    fn is_held_exclusively(&self, sync: &SyncState) -> bool {
        let _ = sync;
        false
    }

    /// Policy name for tracing
    fn name(&self) -> &'static str;
}
