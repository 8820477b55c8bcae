/*!
 * Queued Synchronizers
 *
 * A framework for building blocking synchronization primitives from one
 * atomic integer and a FIFO queue of parked threads:
 * - `AtomicState` / `SyncState`: the state word, owner and queue
 * - `WaitQueue`: CLH-style intrusive queue with cancellation
 * - `SynchronizerCore`: exclusive and shared acquire/release state machine
 * - `AcquirePolicy`: the per-synchronizer rules plugged into the core
 * - `Condition`: monitor-style wait/signal on exclusive synchronizers
 *
 * # Architecture
 *
 * ```text
 * Mutex / ReentrantLock / ReadWriteLock / Semaphore / CountdownLatch
 *            │ policy (try_acquire / try_release)
 *            ▼
 *     SynchronizerCore ──▶ SyncState (AtomicState + owner)
 *            │                   │
 *            ▼                   ▼
 *     ParkStrategyImpl       WaitQueue ──▶ WaitNode ──▶ ThreadHandle
 * ```
 *
 * # Performance
 *
 * - Uncontended acquire/release is one CAS, no allocation
 * - A node is allocated only when the fast path fails
 * - Park strategy is enum-dispatched (no vtable on the contended path)
 */

mod condition;
mod config;
mod park;
mod policy;
mod queue;
mod state;
mod synchronizer;

pub mod locks;
pub mod thread;

pub use condition::Condition;
pub use config::{StrategyType, SyncConfig};
pub use policy::AcquirePolicy;
pub use queue::{Mode, NodeStatus, WaitNode, WaitQueue};
pub use state::{AtomicState, SyncState};
pub use synchronizer::SynchronizerCore;
pub use thread::{ThreadHandle, ThreadId};

// Re-export specific strategies for advanced users
pub use park::{CondvarPark, FutexPark, ParkStrategy, Parker, SpinPark};

pub use locks::{
    CountdownLatch, CyclicBarrier, Mutex, MutexGuard, ReadGuard, ReadWriteLock, ReentrantLock,
    ReentrantLockGuard, Semaphore, Synchronizer, WriteGuard,
};
