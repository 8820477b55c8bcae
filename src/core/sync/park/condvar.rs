/*!
 * Condvar-Based Park Strategy
 *
 * Cross-platform fallback using parking_lot::Condvar for reliability.
 *
 * The permit is checked with the parker's mutex held, and `unpark` takes the
 * same mutex before notifying, which closes the lost-wakeup window.
 */

use super::parker::Parker;
use super::traits::ParkStrategy;
use std::time::Instant;

/// Condvar-based park strategy
///
/// # Performance
///
/// - Works on all platforms
/// - One uncontended mutex round-trip per park
#[derive(Debug, Clone, Copy, Default)]
pub struct CondvarPark;

impl CondvarPark {
    /// Create a new condvar-based park strategy
    pub const fn new() -> Self {
        Self
    }
}

impl ParkStrategy for CondvarPark {
    fn park(&self, parker: &Parker, deadline: Option<Instant>) -> bool {
        let mut guard = parker.mutex().lock();
        if parker.take_permit() {
            return true;
        }

        match deadline {
            Some(deadline) => {
                parker.condvar().wait_until(&mut guard, deadline);
            }
            None => parker.condvar().wait(&mut guard),
        }

        parker.take_permit()
    }

    fn name(&self) -> &'static str {
        "condvar"
    }
}
