/*!
 * Cyclic Barrier
 *
 * A reusable rendezvous for a fixed number of parties, built from a
 * `ReentrantLock` and one `Condition`. Each trip starts a new generation;
 * a timeout, interrupt, reset or panicking barrier action breaks the current
 * generation and releases everyone waiting on it with `BrokenBarrier`.
 */

use super::reentrant::{ReentrantLock, ReentrantPolicy};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::condition::Condition;
use crate::core::sync::thread;
use arc_swap::ArcSwap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type BarrierAction = Box<dyn Fn() + Send + Sync>;

/// One use of the barrier
#[derive(Debug, Default)]
struct Generation {
    broken: AtomicBool,
}

impl Generation {
    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }
}

/// Cyclic barrier
///
/// # Example
///
/// ```
/// use queued_sync::CyclicBarrier;
/// use std::sync::Arc;
///
/// let barrier = Arc::new(CyclicBarrier::new(3).unwrap());
/// let handles: Vec<_> = (0..3)
///     .map(|_| {
///         let barrier = barrier.clone();
///         std::thread::spawn(move || barrier.wait().unwrap())
///     })
///     .collect();
///
/// let mut indices: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
/// indices.sort();
/// assert_eq!(indices, vec![0, 1, 2]);
/// ```
pub struct CyclicBarrier {
    parties: usize,
    lock: ReentrantLock,
    trip: Condition<ReentrantPolicy>,
    action: Option<BarrierAction>,
    generation: ArcSwap<Generation>,
    /// Parties still to arrive in this generation; written under `lock`
    count: AtomicUsize,
}

impl CyclicBarrier {
    pub fn new(parties: usize) -> SyncResult<Self> {
        Self::build(parties, None)
    }

    /// Barrier whose `action` runs on the last arriving thread, before the
    /// others are released
    pub fn with_action<F>(parties: usize, action: F) -> SyncResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(parties, Some(Box::new(action)))
    }

    fn build(parties: usize, action: Option<BarrierAction>) -> SyncResult<Self> {
        if parties == 0 {
            return Err(SyncError::InvalidArgument(
                "a barrier needs at least one party".into(),
            ));
        }
        let lock = ReentrantLock::new();
        let trip = lock.new_condition();
        Ok(Self {
            parties,
            lock,
            trip,
            action,
            generation: ArcSwap::from_pointee(Generation::default()),
            count: AtomicUsize::new(parties),
        })
    }

    /// Wait for every party to arrive
    ///
    /// Returns the arrival index: `parties - 1` for the first to arrive,
    /// `0` for the last.
    pub fn wait(&self) -> SyncResult<usize> {
        self.do_wait(None)
    }

    /// Like [`wait`](Self::wait), breaking the barrier after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<usize> {
        self.do_wait(Some(timeout))
    }

    fn do_wait(&self, timeout: Option<Duration>) -> SyncResult<usize> {
        let _guard = self.lock.guard()?;
        let generation = self.generation.load_full();

        if generation.is_broken() {
            return Err(SyncError::BrokenBarrier);
        }
        let me = thread::current();
        if me.clear_interrupt() {
            self.break_barrier()?;
            return Err(SyncError::Interrupted);
        }

        let index = self.count.load(Ordering::Acquire) - 1;
        self.count.store(index, Ordering::Release);

        if index == 0 {
            if let Some(action) = &self.action {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| action())) {
                    self.break_barrier()?;
                    panic::resume_unwind(payload);
                }
            }
            self.next_generation()?;
            return Ok(0);
        }

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            let waited = match deadline {
                None => self.trip.wait().map(|_| true),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        Ok(false)
                    } else {
                        self.trip.wait_timeout(remaining)
                    }
                }
            };

            let signalled = match waited {
                Ok(signalled) => signalled,
                Err(SyncError::Interrupted) => {
                    if self.is_current(&generation) && !generation.is_broken() {
                        self.break_barrier()?;
                        debug!(thread = %me.id(), "barrier wait interrupted");
                        return Err(SyncError::Interrupted);
                    }
                    // The generation already ended; keep the interrupt for later
                    me.interrupt();
                    true
                }
                Err(err) => return Err(err),
            };

            if generation.is_broken() {
                return Err(SyncError::BrokenBarrier);
            }
            if !self.is_current(&generation) {
                return Ok(index);
            }
            if !signalled && deadline.is_some() {
                self.break_barrier()?;
                debug!(thread = %me.id(), "barrier wait timed out");
                return Err(SyncError::Timeout);
            }
        }
    }

    fn is_current(&self, generation: &Arc<Generation>) -> bool {
        Arc::ptr_eq(&self.generation.load(), generation)
    }

    /// Wake everyone into a fresh generation; caller holds `lock`
    fn next_generation(&self) -> SyncResult<()> {
        self.trip.signal_all()?;
        self.count.store(self.parties, Ordering::Release);
        self.generation.store(Arc::new(Generation::default()));
        Ok(())
    }

    /// Break the current generation; caller holds `lock`
    fn break_barrier(&self) -> SyncResult<()> {
        self.generation.load().broken.store(true, Ordering::Release);
        self.count.store(self.parties, Ordering::Release);
        self.trip.signal_all()
    }

    /// Break the current generation and start a new one
    ///
    /// Threads waiting at the time get `BrokenBarrier`.
    pub fn reset(&self) -> SyncResult<()> {
        let _guard = self.lock.guard()?;
        self.break_barrier()?;
        self.next_generation()
    }

    pub fn is_broken(&self) -> bool {
        self.generation.load().is_broken()
    }

    /// Parties currently waiting
    pub fn number_waiting(&self) -> usize {
        self.parties - self.count.load(Ordering::Acquire)
    }

    pub fn parties(&self) -> usize {
        self.parties
    }
}

impl fmt::Debug for CyclicBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclicBarrier")
            .field("parties", &self.parties)
            .field("waiting", &self.number_waiting())
            .field("broken", &self.is_broken())
            .finish()
    }
}
