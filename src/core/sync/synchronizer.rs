/*!
 * Synchronizer Core
 *
 * The shared acquire/release state machine behind every queued synchronizer.
 *
 * # Acquire
 *
 * ```text
 * TRYING ──ok──────────────────────────────────────────▶ ACQUIRED
 *   │fail
 *   ▼
 * QUEUED ─▶ SPINNING ─(first in line && try ok)─▶ becomes head ─▶ ACQUIRED
 *              │  ▲
 *   should_park│  │unparked / spurious
 *              ▼  │
 *            PARKED ──timeout / interrupt──▶ cancel ─▶ CANCELLED
 * ```
 *
 * The fast path never touches the queue. A queued thread only retries when
 * its predecessor is the head sentinel, and only parks after its
 * predecessor has promised to signal it, so a release can never slip
 * between the failed retry and the park.
 *
 * # Shared mode
 *
 * Identical, except a successful shared acquire with permits left over
 * keeps waking shared successors, so a burst of releases lets several
 * shared waiters through without one-at-a-time handoffs.
 */

use super::config::SyncConfig;
use super::park::ParkStrategyImpl;
use super::policy::AcquirePolicy;
use super::queue::{Mode, NodeStatus, WaitNode};
use super::state::SyncState;
use super::thread::{self, ThreadHandle, ThreadId};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::SPIN_FOR_TIMEOUT_THRESHOLD;
use crate::monitoring::span_wait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// How a queued thread reacts to interrupts and time
#[derive(Debug, Clone, Copy)]
enum Blocking {
    /// Keep waiting; remember interrupts and re-assert them on success
    Uninterruptible,
    /// Abort with `Interrupted`
    Interruptible,
    /// Abort with `Interrupted`, or `Timeout` at the deadline
    Until(Instant),
}

impl Blocking {
    fn for_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::Until(deadline),
            // Too far out to represent; wait like an untimed acquire
            None => Self::Interruptible,
        }
    }

    #[inline]
    fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Until(deadline) => Some(*deadline),
            _ => None,
        }
    }

    #[inline]
    fn interruptible(&self) -> bool {
        !matches!(self, Self::Uninterruptible)
    }
}

/// Queueing and blocking machinery parameterized by an acquisition policy
///
/// # Example
///
/// ```
/// use queued_sync::core::sync::{AcquirePolicy, SyncState, SynchronizerCore};
/// use queued_sync::SyncResult;
///
/// /// Binary latch: opens once, stays open
/// struct Gate;
///
/// impl AcquirePolicy for Gate {
///     fn try_acquire_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<i32> {
///         Ok(if sync.state() != 0 { 1 } else { -1 })
///     }
///
///     fn try_release_shared(&self, sync: &SyncState, _arg: i32) -> SyncResult<bool> {
///         sync.set_state(1);
///         Ok(true)
///     }
///
///     fn name(&self) -> &'static str {
///         "gate"
///     }
/// }
///
/// let gate = SynchronizerCore::new(Gate, 0);
/// assert!(!gate.try_acquire_shared(1).unwrap());
/// gate.release_shared(1).unwrap();
/// gate.acquire_shared(1).unwrap();
/// ```
pub struct SynchronizerCore<P: AcquirePolicy> {
    sync: SyncState,
    policy: P,
    strategy: ParkStrategyImpl,
    contended: AtomicBool,
}

impl<P: AcquirePolicy> SynchronizerCore<P> {
    /// Create with default configuration (auto-selects park strategy)
    pub fn new(policy: P, initial_state: i32) -> Self {
        Self::with_config(policy, initial_state, &SyncConfig::default())
    }

    pub fn with_config(policy: P, initial_state: i32, config: &SyncConfig) -> Self {
        Self {
            sync: SyncState::new(initial_state),
            policy,
            strategy: ParkStrategyImpl::from_config(config),
            contended: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    #[inline]
    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    #[inline]
    pub fn state(&self) -> i32 {
        self.sync.state()
    }

    /// Name of the active park strategy
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    // =========================================================================
    // EXCLUSIVE MODE
    // =========================================================================

    /// Acquire exclusively, ignoring interrupts
    ///
    /// An interrupt received while parked is re-asserted on return.
    pub fn acquire(&self, arg: i32) -> SyncResult<()> {
        if self.policy.try_acquire(&self.sync, arg)? {
            return Ok(());
        }

        let me = thread::current();
        let node = self.enqueue(Mode::Exclusive, &me);
        if self.acquire_queued(&node, &me, arg, Blocking::Uninterruptible)? {
            me.interrupt();
        }
        Ok(())
    }

    /// Acquire exclusively, aborting with `Interrupted` on interrupt
    pub fn acquire_interruptibly(&self, arg: i32) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.policy.try_acquire(&self.sync, arg)? {
            return Ok(());
        }

        let node = self.enqueue(Mode::Exclusive, &me);
        self.acquire_queued(&node, &me, arg, Blocking::Interruptible)
            .map(|_| ())
    }

    /// Acquire exclusively within `timeout`
    ///
    /// Fails with `Timeout` once the deadline passes, or `Interrupted`.
    pub fn try_acquire_for(&self, arg: i32, timeout: Duration) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.policy.try_acquire(&self.sync, arg)? {
            return Ok(());
        }
        if timeout.is_zero() {
            return Err(SyncError::Timeout);
        }

        let node = self.enqueue(Mode::Exclusive, &me);
        self.acquire_queued(&node, &me, arg, Blocking::for_timeout(timeout))
            .map(|_| ())
    }

    /// Single non-blocking attempt; never queues
    #[inline]
    pub fn try_acquire(&self, arg: i32) -> SyncResult<bool> {
        self.policy.try_acquire(&self.sync, arg)
    }

    /// Release exclusively, waking the next waiter once fully free
    ///
    /// Returns whether the resource became fully free.
    pub fn release(&self, arg: i32) -> SyncResult<bool> {
        let free = self
            .policy
            .try_release(&self.sync, arg)
            .inspect_err(|err| self.log_release_error(err, arg))?;

        if free {
            let head = self.sync.queue().head();
            if head.raw_status() != NodeStatus::Initial.raw() {
                self.sync.queue().wake_successor(&head);
            }
        }
        Ok(free)
    }

    // =========================================================================
    // SHARED MODE
    // =========================================================================

    /// Acquire in shared mode, ignoring interrupts
    pub fn acquire_shared(&self, arg: i32) -> SyncResult<()> {
        if self.policy.try_acquire_shared(&self.sync, arg)? >= 0 {
            return Ok(());
        }

        let me = thread::current();
        if self.acquire_shared_queued(&me, arg, Blocking::Uninterruptible)? {
            me.interrupt();
        }
        Ok(())
    }

    /// Acquire in shared mode, aborting with `Interrupted` on interrupt
    pub fn acquire_shared_interruptibly(&self, arg: i32) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.policy.try_acquire_shared(&self.sync, arg)? >= 0 {
            return Ok(());
        }

        self.acquire_shared_queued(&me, arg, Blocking::Interruptible)
            .map(|_| ())
    }

    /// Acquire in shared mode within `timeout`
    pub fn try_acquire_shared_for(&self, arg: i32, timeout: Duration) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }
        if self.policy.try_acquire_shared(&self.sync, arg)? >= 0 {
            return Ok(());
        }
        if timeout.is_zero() {
            return Err(SyncError::Timeout);
        }

        self.acquire_shared_queued(&me, arg, Blocking::for_timeout(timeout))
            .map(|_| ())
    }

    /// Single non-blocking shared attempt; never queues
    #[inline]
    pub fn try_acquire_shared(&self, arg: i32) -> SyncResult<bool> {
        Ok(self.policy.try_acquire_shared(&self.sync, arg)? >= 0)
    }

    /// Release in shared mode, propagating wakeups when the policy asks
    pub fn release_shared(&self, arg: i32) -> SyncResult<bool> {
        let wake = self
            .policy
            .try_release_shared(&self.sync, arg)
            .inspect_err(|err| self.log_release_error(err, arg))?;

        if wake {
            self.sync.queue().propagate_release();
        }
        Ok(wake)
    }

    // =========================================================================
    // QUEUED WAITING
    // =========================================================================

    fn enqueue(&self, mode: Mode, me: &ThreadHandle) -> Arc<WaitNode> {
        self.contended.store(true, Ordering::Relaxed);
        let node = self.sync.queue().add_waiter(mode, me);
        trace!(
            policy = self.policy.name(),
            thread = %me.id(),
            ?mode,
            "fast path failed, queued"
        );
        node
    }

    /// Exclusive wait loop for an already-queued node
    ///
    /// Returns whether an interrupt was swallowed (uninterruptible only).
    fn acquire_queued(
        &self,
        node: &Arc<WaitNode>,
        me: &ThreadHandle,
        arg: i32,
        blocking: Blocking,
    ) -> SyncResult<bool> {
        self.wait_in_queue(node, me, blocking, || {
            if self.policy.try_acquire(&self.sync, arg)? {
                self.sync.queue().set_head(node);
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn acquire_shared_queued(
        &self,
        me: &ThreadHandle,
        arg: i32,
        blocking: Blocking,
    ) -> SyncResult<bool> {
        let node = self.enqueue(Mode::Shared, me);
        self.wait_in_queue(&node, me, blocking, || {
            let remaining = self.policy.try_acquire_shared(&self.sync, arg)?;
            if remaining >= 0 {
                self.set_head_and_propagate(&node, remaining);
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn wait_in_queue<F>(
        &self,
        node: &Arc<WaitNode>,
        me: &ThreadHandle,
        blocking: Blocking,
        take: F,
    ) -> SyncResult<bool>
    where
        F: FnMut() -> SyncResult<bool>,
    {
        let span = span_wait(self.policy.name(), node.mode().as_str(), me.id().as_u64());
        let result = {
            let _entered = span.enter();
            self.wait_loop(node, me, blocking, take)
        };
        span.finish(match &result {
            Ok(_) => "acquired",
            Err(SyncError::Timeout) => "timeout",
            Err(SyncError::Interrupted) => "interrupted",
            Err(_) => "error",
        });
        result
    }

    /// Spin/park loop shared by both modes
    ///
    /// `take` runs only while the node is first in line; on success it has
    /// already installed the node as head.
    fn wait_loop<F>(
        &self,
        node: &Arc<WaitNode>,
        me: &ThreadHandle,
        blocking: Blocking,
        mut take: F,
    ) -> SyncResult<bool>
    where
        F: FnMut() -> SyncResult<bool>,
    {
        let queue = self.sync.queue();
        let mut interrupted = false;

        loop {
            let pred = node.predecessor().unwrap_or_else(|| queue.head());

            if queue.is_head(&pred) {
                match take() {
                    Ok(true) => {
                        pred.next.store(None);
                        trace!(
                            policy = self.policy.name(),
                            thread = %me.id(),
                            "acquired after queueing"
                        );
                        return Ok(interrupted);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        queue.cancel(node);
                        return Err(err);
                    }
                }
            }

            let deadline = blocking.deadline();
            if deadline.is_some_and(|d| Instant::now() >= d) {
                queue.cancel(node);
                debug!(policy = self.policy.name(), thread = %me.id(), "acquire timed out");
                return Err(SyncError::Timeout);
            }

            if queue.should_park(&pred, node) {
                self.park(me, deadline);
                if me.clear_interrupt() {
                    if blocking.interruptible() {
                        queue.cancel(node);
                        debug!(
                            policy = self.policy.name(),
                            thread = %me.id(),
                            "acquire interrupted"
                        );
                        return Err(SyncError::Interrupted);
                    }
                    interrupted = true;
                }
            }
        }
    }

    fn set_head_and_propagate(&self, node: &Arc<WaitNode>, propagate: i32) {
        let queue = self.sync.queue();
        let old_head = queue.head();
        queue.set_head(node);

        if propagate > 0 || old_head.raw_status() < 0 || queue.head().raw_status() < 0 {
            let next_is_shared = node.successor().map_or(true, |next| next.is_shared());
            if next_is_shared {
                queue.propagate_release();
            }
        }
    }

    /// Park the caller, spinning instead when the deadline is too close
    pub(crate) fn park(&self, me: &ThreadHandle, deadline: Option<Instant>) {
        match deadline {
            None => {
                me.park(&self.strategy, None);
            }
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining > SPIN_FOR_TIMEOUT_THRESHOLD {
                    me.park(&self.strategy, Some(deadline));
                } else {
                    std::hint::spin_loop();
                }
            }
        }
    }

    fn log_release_error(&self, err: &SyncError, arg: i32) {
        match err {
            SyncError::Overflow(reason) => {
                error!(policy = self.policy.name(), arg, %reason, "release overflow")
            }
            SyncError::IllegalState(reason) => {
                warn!(policy = self.policy.name(), arg, %reason, "illegal release")
            }
            _ => {}
        }
    }

    // =========================================================================
    // CONDITION SUPPORT
    // =========================================================================

    /// Release every hold of the caller, returning the saved state
    pub(crate) fn fully_release(&self, node: &Arc<WaitNode>) -> SyncResult<i32> {
        let saved = self.state();
        let result = match self.release(saved) {
            Ok(true) => Ok(saved),
            Ok(false) => Err(SyncError::IllegalState(
                "condition wait did not fully release the lock".into(),
            )),
            Err(err) => Err(err),
        };
        if result.is_err() {
            node.set_status(NodeStatus::Cancelled);
        }
        result
    }

    /// Whether a condition node has been moved onto the sync queue
    pub(crate) fn is_on_sync_queue(&self, node: &Arc<WaitNode>) -> bool {
        if node.status() == NodeStatus::Condition || node.predecessor().is_none() {
            return false;
        }
        if node.successor().is_some() {
            return true;
        }
        // prev set but the enqueue CAS may not have landed yet
        self.sync.queue().contains_node(node)
    }

    /// Move a signalled condition node onto the sync queue
    ///
    /// Returns false if the node was cancelled before the signal.
    pub(crate) fn transfer_for_signal(&self, node: &Arc<WaitNode>) -> bool {
        if !node.compare_and_set_status(NodeStatus::Condition.raw(), NodeStatus::Initial) {
            return false;
        }

        let pred = self.sync.queue().enqueue(node);
        let ws = pred.raw_status();
        if ws > 0 || !pred.compare_and_set_status(ws, NodeStatus::Signal) {
            node.unpark_waiter();
        }
        debug!(thread = ?node.waiter_id(), "condition waiter transferred");
        true
    }

    /// Requeue a condition node after a timeout or interrupt
    ///
    /// Returns true if the cancellation won the race against a signal.
    pub(crate) fn transfer_after_cancelled_wait(&self, node: &Arc<WaitNode>) -> bool {
        if node.compare_and_set_status(NodeStatus::Condition.raw(), NodeStatus::Initial) {
            self.sync.queue().enqueue(node);
            return true;
        }

        // A signal got there first; wait for its enqueue to land
        while !self.is_on_sync_queue(node) {
            std::thread::yield_now();
        }
        false
    }

    /// Reacquire after a condition wait with the saved hold count
    pub(crate) fn reacquire(
        &self,
        node: &Arc<WaitNode>,
        me: &ThreadHandle,
        saved: i32,
    ) -> SyncResult<bool> {
        self.acquire_queued(node, me, saved, Blocking::Uninterruptible)
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Whether the calling thread holds this synchronizer exclusively
    #[inline]
    pub fn is_held_exclusively(&self) -> bool {
        self.policy.is_held_exclusively(&self.sync)
    }

    /// Number of queued threads (estimate under concurrency)
    pub fn queue_length(&self) -> usize {
        self.sync.queue().len()
    }

    pub fn has_queued_threads(&self) -> bool {
        self.sync.queue().has_queued_threads()
    }

    /// Whether any thread ever had to queue
    pub fn has_contended(&self) -> bool {
        self.contended.load(Ordering::Relaxed)
    }

    pub fn has_queued_predecessors(&self) -> bool {
        self.sync.has_queued_predecessors()
    }

    /// Queued thread ids, longest-waiting first
    pub fn queued_threads(&self) -> Vec<ThreadId> {
        self.sync.queue().queued_threads()
    }

    pub fn first_queued_thread(&self) -> Option<ThreadId> {
        self.sync.queue().first_queued_thread()
    }

    pub fn is_queued(&self, thread: &ThreadHandle) -> bool {
        self.sync.queue().contains_thread(thread.id())
    }
}

impl<P: AcquirePolicy> fmt::Debug for SynchronizerCore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizerCore")
            .field("policy", &self.policy.name())
            .field("state", &self.state())
            .field("owner", &self.sync.owner())
            .field("queued", &self.queue_length())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
