/*!
 * Per-Thread Parker
 *
 * A single-permit block/wake cell owned by each thread handle. Every park
 * strategy blocks on the same parker, so an unparker never needs to know
 * which strategy the parked thread chose.
 */

use crate::core::limits::PARK_TOKEN;
use parking_lot::{Condvar, Mutex};
use parking_lot_core::{unpark_one, UnparkToken};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-permit parker
///
/// The permit word doubles as the futex key, so it must keep a stable
/// address for the lifetime of the parker (it lives inside an `Arc`).
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing
pub struct Parker {
    permit: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Parker {
    pub(crate) const fn new() -> Self {
        Self {
            permit: AtomicBool::new(false),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Consume the permit if one is available
    #[inline]
    pub(crate) fn take_permit(&self) -> bool {
        self.permit.swap(false, Ordering::Acquire)
    }

    /// Check for a permit without consuming it
    #[inline]
    pub(crate) fn has_permit(&self) -> bool {
        self.permit.load(Ordering::Acquire)
    }

    /// Futex key for parking_lot_core
    #[inline]
    pub(crate) fn key(&self) -> usize {
        &self.permit as *const AtomicBool as usize
    }

    pub(crate) fn mutex(&self) -> &Mutex<()> {
        &self.mutex
    }

    pub(crate) fn condvar(&self) -> &Condvar {
        &self.condvar
    }

    /// Deposit a permit and wake the owning thread if it is parked
    ///
    /// Wakes through both the futex bucket and the condvar. Permits do not
    /// accumulate: a second unpark before the next park is a no-op.
    pub fn unpark(&self) {
        if self.permit.swap(true, Ordering::AcqRel) {
            return;
        }

        // SAFETY: the key is the address of our own permit word, which no
        // other parking_lot primitive uses as a key.
        unsafe {
            unpark_one(self.key(), |_| UnparkToken(PARK_TOKEN));
        }

        // Taking the mutex orders this notify after a condvar parker's
        // permit check.
        let _guard = self.mutex.lock();
        self.condvar.notify_one();
    }
}

impl Default for Parker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Parker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parker")
            .field("permit", &self.has_permit())
            .finish()
    }
}
