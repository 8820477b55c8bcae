/*!
 * Error Types
 * Synchronizer error taxonomy with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for synchronizer operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Synchronizer errors with serialization support
///
/// `IllegalState`, `Overflow` and `InvalidArgument` are programming errors.
/// `Timeout` and `Interrupted` are ordinary outcomes of a blocking call that
/// the caller is expected to branch on.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Illegal synchronizer state: {0}")]
    #[diagnostic(
        code(sync::illegal_state),
        help("Only the owning thread may release, and never more than it acquired.")
    )]
    IllegalState(String),

    #[error("Synchronizer count overflow: {0}")]
    #[diagnostic(
        code(sync::overflow),
        help("Hold or permit count would exceed i32::MAX. This is a programming error.")
    )]
    Overflow(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(sync::invalid_argument), help("Counts and permits must be non-negative."))]
    InvalidArgument(String),

    #[error("Acquire timed out")]
    #[diagnostic(code(sync::timeout))]
    Timeout,

    #[error("Acquire was interrupted")]
    #[diagnostic(
        code(sync::interrupted),
        help("Another thread called interrupt() on this thread while it was blocked.")
    )]
    Interrupted,

    #[error("Operation not supported in {0} mode")]
    #[diagnostic(code(sync::unsupported))]
    Unsupported(String),

    #[error("Barrier is broken")]
    #[diagnostic(
        code(sync::broken_barrier),
        help("A waiter timed out or was interrupted, or the barrier was reset. Call reset() to reuse it.")
    )]
    BrokenBarrier,
}

impl SyncError {
    pub(crate) fn not_owner() -> Self {
        SyncError::IllegalState("current thread does not own the synchronizer".into())
    }

    pub(crate) fn unsupported(mode: &str) -> Self {
        SyncError::Unsupported(mode.into())
    }

    /// Timeout or interruption: the blocked call was cancelled, queue left intact
    #[inline]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SyncError::Timeout | SyncError::Interrupted)
    }

    /// Misuse of the synchronizer that should abort or propagate
    #[inline]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            SyncError::IllegalState(_)
                | SyncError::Overflow(_)
                | SyncError::InvalidArgument(_)
                | SyncError::Unsupported(_)
        )
    }
}
