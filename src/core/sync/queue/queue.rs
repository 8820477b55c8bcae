/*!
 * Wait Queue
 *
 * Intrusive FIFO of blocked threads in the CLH style: a head sentinel stands
 * for "whoever may currently retry", new waiters are CAS-appended at the
 * tail, and each waiter parks only after asking its predecessor to signal it.
 *
 * # Invariants
 *
 * - `prev` links are set before a node becomes reachable from `tail`, so a
 *   walk from tail to head over `prev` is always safe
 * - `next` links are hints; they may be stale or missing, and wakeup falls
 *   back to a tail scan when they are
 * - Cancelled nodes may linger in the `prev` chain until a successor or a
 *   later cancellation splices past them
 * - Head and tail are never empty; the sentinel is created with the queue
 */

use super::node::{cas_link, Mode, NodeStatus, WaitNode};
use crate::core::sync::thread::{self, ThreadHandle, ThreadId};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::trace;

/// Lock-free FIFO wait queue with a head sentinel
pub struct WaitQueue {
    head: ArcSwap<WaitNode>,
    tail: ArcSwap<WaitNode>,
}

impl WaitQueue {
    /// Create an empty queue (head == tail == sentinel)
    pub fn new() -> Self {
        let sentinel = WaitNode::sentinel();
        Self {
            head: ArcSwap::new(sentinel.clone()),
            tail: ArcSwap::new(sentinel),
        }
    }

    #[inline]
    pub(crate) fn head(&self) -> Arc<WaitNode> {
        self.head.load_full()
    }

    #[inline]
    pub(crate) fn tail(&self) -> Arc<WaitNode> {
        self.tail.load_full()
    }

    #[inline]
    pub(crate) fn is_head(&self, node: &Arc<WaitNode>) -> bool {
        Arc::ptr_eq(&self.head.load(), node)
    }

    #[inline]
    fn is_tail(&self, node: &Arc<WaitNode>) -> bool {
        Arc::ptr_eq(&self.tail.load(), node)
    }

    fn compare_and_set_tail(&self, expected: &Arc<WaitNode>, new: Arc<WaitNode>) -> bool {
        let previous = self.tail.compare_and_swap(expected, new);
        Arc::ptr_eq(&previous, expected)
    }

    /// Append `node` at the tail, returning its predecessor
    ///
    /// Retries until the tail CAS wins; contention is bounded by the number
    /// of threads.
    pub fn enqueue(&self, node: &Arc<WaitNode>) -> Arc<WaitNode> {
        loop {
            let tail = self.tail();
            node.prev.store(Some(tail.clone()));
            if self.compare_and_set_tail(&tail, node.clone()) {
                tail.next.store(Some(node.clone()));
                trace!(mode = ?node.mode(), thread = ?node.waiter_id(), "enqueued");
                return tail;
            }
        }
    }

    /// Create and append a node for the calling thread
    pub(crate) fn add_waiter(&self, mode: Mode, me: &ThreadHandle) -> Arc<WaitNode> {
        let node = WaitNode::new(mode, me);
        self.enqueue(&node);
        node
    }

    /// Make `node` the new head sentinel
    ///
    /// Only called by the thread that just acquired through `node`. The old
    /// head's `next` must be cleared by the caller.
    pub(crate) fn set_head(&self, node: &Arc<WaitNode>) {
        self.head.store(node.clone());
        node.clear_waiter();
        node.prev.store(None);
    }

    /// Decide whether the thread on `node` may park
    ///
    /// Returns true only when `pred` has promised to signal. Otherwise skips
    /// cancelled predecessors or requests the signal, and returns false so
    /// the caller retries its acquire once more before parking.
    pub fn should_park(&self, pred: &Arc<WaitNode>, node: &Arc<WaitNode>) -> bool {
        let ws = pred.raw_status();
        if ws == NodeStatus::Signal.raw() {
            return true;
        }

        if ws > 0 {
            let mut live = pred.clone();
            while let Some(before) = live.predecessor() {
                node.prev.store(Some(before.clone()));
                live = before;
                if !live.is_cancelled() {
                    break;
                }
            }
            live.next.store(Some(node.clone()));
        } else {
            // Initial or Propagate; may fail, the caller just loops
            pred.compare_and_set_status(ws, NodeStatus::Signal);
        }
        false
    }

    /// Cancel an acquire in progress and splice `node` out of the queue
    ///
    /// Wakes the successor when `node` may have been the one due to be
    /// signalled, so a cancellation never strands a later waiter.
    pub fn cancel(&self, node: &Arc<WaitNode>) {
        node.clear_waiter();

        let Some(mut pred) = node.predecessor() else {
            return;
        };
        while pred.is_cancelled() {
            match pred.predecessor() {
                Some(before) => {
                    node.prev.store(Some(before.clone()));
                    pred = before;
                }
                None => break,
            }
        }

        let pred_next = pred.successor();
        node.set_status(NodeStatus::Cancelled);
        trace!(mode = ?node.mode(), "cancelled queued node");

        if self.is_tail(node) && self.compare_and_set_tail(node, pred.clone()) {
            cas_link(&pred.next, &pred_next, None);
            return;
        }

        let ws = pred.raw_status();
        let pred_will_signal = !self.is_head(&pred)
            && (ws == NodeStatus::Signal.raw()
                || (ws <= 0 && pred.compare_and_set_status(ws, NodeStatus::Signal)))
            && pred.has_waiter();

        if pred_will_signal {
            if let Some(next) = node.successor() {
                if !next.is_cancelled() {
                    cas_link(&pred.next, &pred_next, Some(next));
                }
            }
        } else {
            self.wake_successor(node);
        }

        node.next.store(None);
    }

    /// Unpark the nearest live waiter after `node`
    ///
    /// Trusts `node.next` only if it is present and live; otherwise scans
    /// from the tail backward, which tolerates a stale forward link.
    pub fn wake_successor(&self, node: &Arc<WaitNode>) {
        let ws = node.raw_status();
        if ws < 0 {
            node.compare_and_set_status(ws, NodeStatus::Initial);
        }

        let mut successor = node.successor().filter(|s| !s.is_cancelled());
        if successor.is_none() {
            let mut cursor = Some(self.tail());
            while let Some(current) = cursor {
                if Arc::ptr_eq(&current, node) {
                    break;
                }
                if current.raw_status() <= 0 && current.has_waiter() {
                    successor = Some(current.clone());
                }
                cursor = current.predecessor();
            }
        }

        if let Some(successor) = successor {
            successor.unpark_waiter();
        }
    }

    /// Release path for shared mode
    ///
    /// Signals the head's successor, or marks the head `Propagate` so the
    /// next shared acquirer keeps waking its own successors. Loops while the
    /// head moves underneath.
    pub(crate) fn propagate_release(&self) {
        loop {
            let head = self.head();
            if !self.is_tail(&head) {
                let ws = head.raw_status();
                if ws == NodeStatus::Signal.raw() {
                    if !head.compare_and_set_status(ws, NodeStatus::Initial) {
                        continue;
                    }
                    self.wake_successor(&head);
                } else if ws == 0 && !head.compare_and_set_status(0, NodeStatus::Propagate) {
                    continue;
                }
            }
            if self.is_head(&head) {
                break;
            }
        }
    }

    /// Any live thread waiting (racy snapshot)
    ///
    /// Walks from the tail rather than comparing head and tail, since a
    /// cancelled node can briefly be left as tail.
    pub fn has_queued_threads(&self) -> bool {
        !Arc::ptr_eq(&self.head.load(), &self.tail.load())
            && self.waiters_from_tail().next().is_some()
    }

    /// The thread next in line is waiting in exclusive mode
    ///
    /// Non-fair read locks back off when this is true so a stream of readers
    /// cannot starve a queued writer indefinitely.
    pub fn first_queued_is_exclusive(&self) -> bool {
        let head = self.head();
        let first = head.successor().or_else(|| {
            // head.next not linked yet; find the oldest waiter from the tail
            let mut first = None;
            let mut cursor = Some(self.tail());
            while let Some(node) = cursor {
                if Arc::ptr_eq(&node, &head) {
                    break;
                }
                if node.has_waiter() {
                    first = Some(node.clone());
                }
                cursor = node.predecessor();
            }
            first
        });
        first.is_some_and(|node| !node.is_shared() && node.has_waiter())
    }

    /// Some other thread has been waiting longer than the caller
    ///
    /// Fair policies refuse to barge when this is true.
    pub fn has_queued_predecessors(&self) -> bool {
        let tail = self.tail();
        let head = self.head();
        if Arc::ptr_eq(&head, &tail) {
            return false;
        }
        match head.successor() {
            None => true,
            Some(first) => first.waiter_id() != Some(thread::current_id()),
        }
    }

    /// Walk from tail to head, yielding live waiter ids (newest first)
    fn waiters_from_tail(&self) -> impl Iterator<Item = ThreadId> {
        let mut cursor = Some(self.tail());
        std::iter::from_fn(move || loop {
            let node = cursor.take()?;
            cursor = node.predecessor();
            if let Some(id) = node.waiter_id() {
                return Some(id);
            }
        })
    }

    /// Queued thread ids, longest-waiting first
    pub fn queued_threads(&self) -> Vec<ThreadId> {
        let mut ids: Vec<ThreadId> = self.waiters_from_tail().collect();
        ids.reverse();
        ids
    }

    /// Number of queued threads (estimate under concurrency)
    pub fn len(&self) -> usize {
        self.waiters_from_tail().count()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_queued_threads()
    }

    /// Longest-waiting thread, if any
    pub fn first_queued_thread(&self) -> Option<ThreadId> {
        if !self.has_queued_threads() {
            return None;
        }
        if let Some(id) = self.head().successor().and_then(|first| first.waiter_id()) {
            return Some(id);
        }
        self.waiters_from_tail().last()
    }

    /// Whether `thread` is currently queued
    pub fn contains_thread(&self, thread: ThreadId) -> bool {
        self.waiters_from_tail().any(|id| id == thread)
    }

    /// Whether `node` is reachable from the tail
    pub(crate) fn contains_node(&self, node: &Arc<WaitNode>) -> bool {
        let mut cursor = Some(self.tail());
        while let Some(current) = cursor {
            if Arc::ptr_eq(&current, node) {
                return true;
            }
            cursor = current.predecessor();
        }
        false
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitQueue {
    fn drop(&mut self) {
        // prev/next pairs form Arc cycles; break them
        let mut cursor = Some(self.tail.load_full());
        while let Some(node) = cursor {
            node.next.store(None);
            cursor = node.prev.swap(None);
        }
        self.head.load().next.store(None);
    }
}

impl std::fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitQueue")
            .field("queued", &self.queued_threads())
            .finish()
    }
}
