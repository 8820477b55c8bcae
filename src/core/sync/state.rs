/*!
 * Synchronizer State
 *
 * The single atomic integer whose meaning each policy defines, plus the
 * exclusive-owner slot and the wait queue. This is everything an
 * acquisition policy is allowed to see.
 */

use super::queue::WaitQueue;
use super::thread::{self, ThreadId};
use crate::core::limits::NO_OWNER;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

/// Atomic synchronizer state word
///
/// A successful `compare_and_set` is a release store and every `get` is an
/// acquire load; that pairing is the only cross-thread visibility guarantee
/// the synchronizers rely on.
#[derive(Debug, Default)]
pub struct AtomicState {
    value: AtomicI32,
}

impl AtomicState {
    pub const fn new(initial: i32) -> Self {
        Self {
            value: AtomicI32::new(initial),
        }
    }

    #[inline(always)]
    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    /// Unconditional store; only for callers that already own the state
    #[inline(always)]
    pub fn set(&self, new: i32) {
        self.value.store(new, Ordering::Release);
    }

    #[inline(always)]
    pub fn compare_and_set(&self, expected: i32, new: i32) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// State, owner and queue of one synchronizer instance
#[derive(Debug)]
pub struct SyncState {
    state: AtomicState,
    owner: AtomicU64,
    queue: WaitQueue,
}

impl SyncState {
    pub fn new(initial: i32) -> Self {
        Self {
            state: AtomicState::new(initial),
            owner: AtomicU64::new(NO_OWNER),
            queue: WaitQueue::new(),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> i32 {
        self.state.get()
    }

    #[inline(always)]
    pub fn set_state(&self, new: i32) {
        self.state.set(new);
    }

    #[inline(always)]
    pub fn compare_and_set_state(&self, expected: i32, new: i32) -> bool {
        self.state.compare_and_set(expected, new)
    }

    /// Thread currently holding exclusive ownership
    pub fn owner(&self) -> Option<ThreadId> {
        match self.owner.load(Ordering::Acquire) {
            NO_OWNER => None,
            raw => Some(ThreadId::from_raw(raw)),
        }
    }

    pub fn set_owner(&self, owner: Option<ThreadId>) {
        let raw = owner.map_or(NO_OWNER, |id| id.as_u64());
        self.owner.store(raw, Ordering::Release);
    }

    /// Record the calling thread as exclusive owner
    #[inline]
    pub fn set_owner_current(&self) {
        self.set_owner(Some(thread::current_id()));
    }

    #[inline]
    pub fn is_owned_by_current(&self) -> bool {
        self.owner() == Some(thread::current_id())
    }

    /// See [`WaitQueue::has_queued_predecessors`]
    #[inline]
    pub fn has_queued_predecessors(&self) -> bool {
        self.queue.has_queued_predecessors()
    }

    /// See [`WaitQueue::first_queued_is_exclusive`]
    #[inline]
    pub fn first_queued_is_exclusive(&self) -> bool {
        self.queue.first_queued_is_exclusive()
    }

    #[inline]
    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }
}
