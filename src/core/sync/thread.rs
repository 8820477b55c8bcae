/*!
 * Thread Handles
 *
 * Per-thread identity, parking and interruption for the queued synchronizers.
 *
 * Every OS thread that touches a synchronizer lazily gets a `ThreadHandle`
 * through a thread-local. The handle carries:
 * - A process-unique `ThreadId` used for exclusive-owner tracking
 * - A single-permit `Parker` (an unpark before park is never lost)
 * - An interrupt flag that aborts interruptible and timed acquires
 */

use super::park::{ParkStrategyImpl, Parker};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Next thread id to hand out (0 is reserved for "no owner")
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: ThreadHandle = ThreadHandle::new();
}

/// Process-unique thread identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    #[inline]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id, never zero
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

pub(crate) struct ThreadInner {
    id: ThreadId,
    name: Option<String>,
    parker: Parker,
    interrupted: AtomicBool,
}

/// Handle to a thread that may block in a synchronizer
///
/// Cheap to clone. Handles are obtained with [`current`] and may be sent to
/// other threads to `unpark` or `interrupt` the original thread.
#[derive(Clone)]
pub struct ThreadHandle {
    inner: Arc<ThreadInner>,
}

impl ThreadHandle {
    fn new() -> Self {
        let id = ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(ThreadInner {
                id,
                name: std::thread::current().name().map(str::to_owned),
                parker: Parker::new(),
                interrupted: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ThreadInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ThreadInner> {
        &self.inner
    }

    /// Unique id of this thread
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.inner.id
    }

    /// OS thread name at the time the handle was created
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Make the thread's permit available, waking it if parked
    #[inline]
    pub fn unpark(&self) {
        self.inner.parker.unpark();
    }

    /// Interrupt the thread
    ///
    /// Sets the interrupt flag and unparks. An interruptible or timed acquire
    /// in progress aborts with `SyncError::Interrupted`; an uninterruptible
    /// acquire keeps waiting and re-asserts the flag once it succeeds.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
        self.unpark();
    }

    /// Check the interrupt flag without clearing it
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }

    /// Clear the interrupt flag, returning whether it was set
    #[inline]
    pub fn clear_interrupt(&self) -> bool {
        self.inner.interrupted.swap(false, Ordering::AcqRel)
    }

    /// Park the calling thread, which must be the thread this handle names
    ///
    /// Returns whether a permit was consumed. Callers re-check their
    /// condition either way.
    pub(crate) fn park(&self, strategy: &ParkStrategyImpl, deadline: Option<Instant>) -> bool {
        debug_assert_eq!(self.id(), current_id(), "park called for another thread");
        strategy.park(&self.inner.parker, deadline)
    }

    /// True if both handles name the same thread
    #[inline]
    pub fn ptr_eq(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl PartialEq for ThreadHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ThreadHandle {}

/// Handle for the calling thread
pub fn current() -> ThreadHandle {
    CURRENT.with(|t| t.clone())
}

/// Id of the calling thread without cloning its handle
#[inline]
pub fn current_id() -> ThreadId {
    CURRENT.with(|t| t.id())
}
