/*!
 * Futex-Based Park Strategy
 *
 * Uses parking_lot_core for futex-like operations on all platforms.
 * On Linux, this maps directly to futex syscalls for minimal overhead.
 *
 * # Design
 *
 * The parked thread is keyed on the address of its own permit word. The
 * validate callback runs under the parking_lot bucket lock, and `unpark`
 * stores the permit before taking that same lock, so a wakeup can never
 * slip between the permit check and the sleep.
 */

use super::parker::Parker;
use super::traits::ParkStrategy;
use crate::core::limits::PARK_TOKEN;
use parking_lot_core::{park, ParkResult, ParkToken};
use std::time::Instant;

/// Futex-based park strategy
///
/// # Performance
///
/// - Zero allocations
/// - Direct futex syscalls on Linux
/// - Lock-free permit fast path
#[derive(Debug, Clone, Copy, Default)]
pub struct FutexPark;

impl FutexPark {
    /// Create a new futex-based park strategy
    pub const fn new() -> Self {
        Self
    }
}

impl ParkStrategy for FutexPark {
    fn park(&self, parker: &Parker, deadline: Option<Instant>) -> bool {
        if parker.take_permit() {
            return true;
        }

        // SAFETY: the key is the address of the parker's permit word, which is
        // unique to this parker and outlives the park call.
        let result = unsafe {
            park(
                parker.key(),
                || !parker.has_permit(),
                || {},
                |_key, _was_last| {},
                ParkToken(PARK_TOKEN),
                deadline,
            )
        };

        let consumed = parker.take_permit();
        match result {
            ParkResult::Unparked(_) => true,
            // Permit arrived before we slept
            ParkResult::Invalid => consumed,
            ParkResult::TimedOut => consumed,
        }
    }

    fn name(&self) -> &'static str {
        "futex"
    }
}
