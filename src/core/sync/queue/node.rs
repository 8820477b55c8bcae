/*!
 * Wait Nodes
 *
 * One node per blocked thread (plus the head sentinel). Links are
 * `ArcSwapOption`s so every update is an atomic store or compare-and-swap,
 * and a node lives as long as anything still links to it.
 */

use crate::core::sync::thread::{ThreadHandle, ThreadId, ThreadInner};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Acquisition mode of a queued thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// At most one holder (mutex-like)
    Exclusive,
    /// Several holders bounded by a count (semaphore-like)
    Shared,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }
}

/// Wait status of a node
///
/// Negative values mean "the successor needs attention", positive means
/// cancelled, zero is the initial state.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Initial = 0,
    /// The thread gave up (timeout/interrupt/error); never reacquires
    Cancelled = 1,
    /// Successor is parked or about to park and must be woken on release
    Signal = -1,
    /// Node sits on a condition list, not on the sync queue
    Condition = -2,
    /// A shared release must keep propagating past this head
    Propagate = -3,
}

impl NodeStatus {
    #[inline]
    pub(crate) const fn raw(self) -> i32 {
        self as i32
    }

    #[inline]
    pub(crate) fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Cancelled,
            -1 => Self::Signal,
            -2 => Self::Condition,
            -3 => Self::Propagate,
            _ => Self::Initial,
        }
    }
}

/// A queued thread record
pub struct WaitNode {
    pub(crate) prev: ArcSwapOption<WaitNode>,
    pub(crate) next: ArcSwapOption<WaitNode>,
    status: AtomicI32,
    waiter: ArcSwapOption<ThreadInner>,
    mode: Mode,
}

impl WaitNode {
    /// Node for `waiter`, not yet linked anywhere
    pub(crate) fn new(mode: Mode, waiter: &ThreadHandle) -> Arc<Self> {
        Self::with_status(mode, waiter, NodeStatus::Initial)
    }

    pub(crate) fn with_status(mode: Mode, waiter: &ThreadHandle, status: NodeStatus) -> Arc<Self> {
        Arc::new(Self {
            prev: ArcSwapOption::empty(),
            next: ArcSwapOption::empty(),
            status: AtomicI32::new(status.raw()),
            waiter: ArcSwapOption::from(Some(waiter.inner().clone())),
            mode,
        })
    }

    /// Head sentinel with no thread attached
    pub(crate) fn sentinel() -> Arc<Self> {
        Arc::new(Self {
            prev: ArcSwapOption::empty(),
            next: ArcSwapOption::empty(),
            status: AtomicI32::new(NodeStatus::Initial.raw()),
            waiter: ArcSwapOption::empty(),
            mode: Mode::Exclusive,
        })
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.mode == Mode::Shared
    }

    #[inline]
    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_raw(self.raw_status())
    }

    #[inline]
    pub(crate) fn raw_status(&self) -> i32 {
        self.status.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.raw_status() > 0
    }

    #[inline]
    pub(crate) fn set_status(&self, status: NodeStatus) {
        self.status.store(status.raw(), Ordering::Release);
    }

    #[inline]
    pub(crate) fn compare_and_set_status(&self, expected: i32, new: NodeStatus) -> bool {
        self.status
            .compare_exchange(expected, new.raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn predecessor(&self) -> Option<Arc<WaitNode>> {
        self.prev.load_full()
    }

    #[inline]
    pub(crate) fn successor(&self) -> Option<Arc<WaitNode>> {
        self.next.load_full()
    }

    /// Thread blocked on this node, if any
    pub fn waiter(&self) -> Option<ThreadHandle> {
        self.waiter.load_full().map(ThreadHandle::from_inner)
    }

    #[inline]
    pub(crate) fn has_waiter(&self) -> bool {
        self.waiter.load().is_some()
    }

    pub(crate) fn waiter_id(&self) -> Option<ThreadId> {
        self.waiter().map(|w| w.id())
    }

    /// Detach the thread; the node then only stands for a queue position
    #[inline]
    pub(crate) fn clear_waiter(&self) {
        self.waiter.store(None);
    }

    pub(crate) fn unpark_waiter(&self) {
        if let Some(waiter) = self.waiter() {
            tracing::trace!(thread = %waiter.id(), "unpark");
            waiter.unpark();
        }
    }
}

impl fmt::Debug for WaitNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitNode")
            .field("mode", &self.mode)
            .field("status", &self.status())
            .field("waiter", &self.waiter_id())
            .finish()
    }
}

/// Pointer equality on optional node links
#[inline]
pub(crate) fn same_node(a: &Option<Arc<WaitNode>>, b: &Option<Arc<WaitNode>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// CAS an optional link, reporting success
#[inline]
pub(crate) fn cas_link(
    slot: &ArcSwapOption<WaitNode>,
    current: &Option<Arc<WaitNode>>,
    new: Option<Arc<WaitNode>>,
) -> bool {
    let previous = slot.compare_and_swap(current, new);
    same_node(&previous, current)
}
