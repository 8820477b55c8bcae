/*!
 * Concrete Synchronizers
 *
 * Each type supplies only the small acquire/release policy that gives the
 * state word its meaning; queueing and parking come from `SynchronizerCore`:
 * - Mutex (0 = free, 1 = held)
 * - ReentrantLock (hold count)
 * - Semaphore (available permits)
 * - CountdownLatch (remaining count)
 * - ReadWriteLock (read holds << 16 | write holds)
 * - CyclicBarrier (composed from ReentrantLock + Condition)
 */

mod barrier;
mod latch;
mod mutex;
mod reentrant;
mod rwlock;
mod semaphore;
mod traits;

// Re-export public API
pub use barrier::CyclicBarrier;
pub use latch::{CountdownLatch, LatchPolicy};
pub use mutex::{Mutex, MutexGuard, MutexPolicy};
pub use reentrant::{ReentrantLock, ReentrantLockGuard, ReentrantPolicy};
pub use rwlock::{ReadGuard, ReadWriteLock, ReadWritePolicy, WriteGuard};
pub use semaphore::{Semaphore, SemaphorePolicy};
pub use traits::Synchronizer;
