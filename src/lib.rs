/*!
 * Queued Synchronizers
 * Blocking locks, read-write locks, semaphores, latches and barriers on a
 * shared queued core
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::sync::{
    AcquirePolicy, Condition, CountdownLatch, CyclicBarrier, Mutex, MutexGuard, ReadGuard,
    ReadWriteLock, ReentrantLock, ReentrantLockGuard, Semaphore, StrategyType, SyncConfig,
    SyncState, Synchronizer, SynchronizerCore, ThreadHandle, ThreadId, WriteGuard,
};
pub use monitoring::init_tracing;
