/*!
 * Condition Variables
 *
 * Monitor-style wait/signal on top of an exclusive synchronizer.
 *
 * A waiter fully releases the lock (saving the hold count), parks on the
 * condition's own list, and once signalled re-runs the normal acquire loop
 * with the saved count. `signal` never wakes a thread directly; it moves the
 * oldest waiter onto the lock's wait queue so lock fairness still applies.
 *
 * ```text
 * WAITING ──signal──▶ TRANSFERRED ──head──▶ REACQUIRING ──▶ ACQUIRED
 *    │
 *    └──timeout / interrupt──▶ self-transfer ──▶ REACQUIRING ──▶ error
 * ```
 */

use super::policy::AcquirePolicy;
use super::queue::{Mode, NodeStatus, WaitNode};
use super::synchronizer::SynchronizerCore;
use super::thread::{self, ThreadHandle};
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// What to do about an interrupt once the lock is back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptMode {
    None,
    /// Interrupted after the signal: succeed, re-assert the flag
    Reinterrupt,
    /// Interrupted before the signal: fail with `Interrupted`
    Throw,
}

/// Condition bound to one exclusive synchronizer
///
/// Obtained from `Mutex::new_condition` or `ReentrantLock::new_condition`.
/// Every method requires the calling thread to hold that lock.
pub struct Condition<P: AcquirePolicy> {
    core: Arc<SynchronizerCore<P>>,
    /// Touched by the lock holder, plus cancelled waiters removing themselves
    waiters: Mutex<VecDeque<Arc<WaitNode>>>,
}

impl<P: AcquirePolicy> Condition<P> {
    pub(crate) fn new(core: Arc<SynchronizerCore<P>>) -> Self {
        Self {
            core,
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    fn check_held(&self) -> SyncResult<()> {
        if self.core.is_held_exclusively() {
            Ok(())
        } else {
            Err(SyncError::IllegalState(
                "condition used without holding its lock".into(),
            ))
        }
    }

    /// Park on the condition list after fully releasing the lock
    fn enter(&self, me: &ThreadHandle) -> SyncResult<(Arc<WaitNode>, i32)> {
        self.check_held()?;

        let node = WaitNode::with_status(Mode::Exclusive, me, NodeStatus::Condition);
        self.waiters.lock().push_back(node.clone());

        match self.core.fully_release(&node) {
            Ok(saved) => {
                trace!(thread = %me.id(), saved, "condition wait");
                Ok((node, saved))
            }
            Err(err) => {
                self.forget(&node);
                Err(err)
            }
        }
    }

    /// Reacquire with the saved count and settle the interrupt
    fn leave(
        &self,
        node: &Arc<WaitNode>,
        me: &ThreadHandle,
        saved: i32,
        mut mode: InterruptMode,
    ) -> SyncResult<()> {
        if self.core.reacquire(node, me, saved)? && mode != InterruptMode::Throw {
            mode = InterruptMode::Reinterrupt;
        }
        self.forget(node);

        match mode {
            InterruptMode::None => Ok(()),
            InterruptMode::Reinterrupt => {
                me.interrupt();
                Ok(())
            }
            InterruptMode::Throw => {
                debug!(thread = %me.id(), "condition wait interrupted");
                Err(SyncError::Interrupted)
            }
        }
    }

    /// Drop a node that left the condition without being signalled
    fn forget(&self, node: &Arc<WaitNode>) {
        self.waiters.lock().retain(|n| !Arc::ptr_eq(n, node));
    }

    fn interrupt_mode(&self, node: &Arc<WaitNode>) -> InterruptMode {
        if self.core.transfer_after_cancelled_wait(node) {
            InterruptMode::Throw
        } else {
            InterruptMode::Reinterrupt
        }
    }

    /// Wait until signalled or interrupted
    ///
    /// The lock is held again when this returns, whether `Ok` or
    /// `Err(Interrupted)`.
    pub fn wait(&self) -> SyncResult<()> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }

        let (node, saved) = self.enter(&me)?;
        let mut mode = InterruptMode::None;
        while !self.core.is_on_sync_queue(&node) {
            self.core.park(&me, None);
            if me.clear_interrupt() {
                mode = self.interrupt_mode(&node);
                break;
            }
        }
        self.leave(&node, &me, saved, mode)
    }

    /// Wait until signalled; interrupts are re-asserted on return
    pub fn wait_uninterruptibly(&self) -> SyncResult<()> {
        let me = thread::current();
        let (node, saved) = self.enter(&me)?;

        let mut interrupted = false;
        while !self.core.is_on_sync_queue(&node) {
            self.core.park(&me, None);
            if me.clear_interrupt() {
                interrupted = true;
            }
        }

        let mode = if interrupted {
            InterruptMode::Reinterrupt
        } else {
            InterruptMode::None
        };
        self.leave(&node, &me, saved, mode)
    }

    /// Wait until signalled, interrupted, or `timeout` elapses
    ///
    /// Returns `Ok(false)` if the timeout elapsed first. The lock is held
    /// again in every case.
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        let me = thread::current();
        if me.clear_interrupt() {
            return Err(SyncError::Interrupted);
        }

        let (node, saved) = self.enter(&me)?;
        let deadline = Instant::now().checked_add(timeout);
        let mut mode = InterruptMode::None;
        let mut timed_out = false;

        while !self.core.is_on_sync_queue(&node) {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining == Some(Duration::ZERO) {
                timed_out = self.core.transfer_after_cancelled_wait(&node);
                break;
            }
            self.core.park(&me, deadline);
            if me.clear_interrupt() {
                mode = self.interrupt_mode(&node);
                break;
            }
        }

        if timed_out {
            debug!(thread = %me.id(), ?timeout, "condition wait timed out");
        }
        self.leave(&node, &me, saved, mode).map(|_| !timed_out)
    }

    /// Move the longest waiter onto the lock's queue
    pub fn signal(&self) -> SyncResult<()> {
        self.check_held()?;
        let mut waiters = self.waiters.lock();
        while let Some(node) = waiters.pop_front() {
            if self.core.transfer_for_signal(&node) {
                break;
            }
        }
        Ok(())
    }

    /// Move every waiter onto the lock's queue
    pub fn signal_all(&self) -> SyncResult<()> {
        self.check_held()?;
        let drained: Vec<_> = self.waiters.lock().drain(..).collect();
        for node in drained {
            self.core.transfer_for_signal(&node);
        }
        Ok(())
    }

    /// Whether any thread is waiting on this condition
    pub fn has_waiters(&self) -> SyncResult<bool> {
        Ok(self.wait_queue_length()? > 0)
    }

    /// Number of threads waiting on this condition
    pub fn wait_queue_length(&self) -> SyncResult<usize> {
        self.check_held()?;
        Ok(self
            .waiters
            .lock()
            .iter()
            .filter(|n| n.status() == NodeStatus::Condition)
            .count())
    }
}

impl<P: AcquirePolicy> fmt::Debug for Condition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("lock", &self.core.policy().name())
            .field("waiters", &self.waiters.lock().len())
            .finish()
    }
}
