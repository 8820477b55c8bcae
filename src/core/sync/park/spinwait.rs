/*!
 * Adaptive Spin-Park Strategy with Exponential Backoff
 *
 * Optimized for locks whose hold times are typically very short. Spins on
 * the parker's permit before falling back to a condvar park.
 *
 * # Design: Exponential Backoff Over Linear Spinning
 *
 * 1. **Tight spin phase** (0-10 iterations): Just `spin_loop()` hint
 * 2. **Yield phase** (10-50 iterations): `yield_now()` every iteration
 * 3. **Sleep phase** (50+ iterations): Exponentially increasing sleep
 *
 * The phase budget is bounded by both `max_spins` and `spin_duration`.
 */

use super::condvar::CondvarPark;
use super::parker::Parker;
use super::traits::ParkStrategy;
use crate::core::limits::{SPIN_MAX_BACKOFF, SPIN_TIGHT_ITERATIONS, SPIN_YIELD_ITERATIONS};
use std::thread;
use std::time::{Duration, Instant};

/// Adaptive spin-park strategy with exponential backoff
///
/// # Use Cases
///
/// Best for scenarios where:
/// - Lock hold time is typically < 100µs
/// - Handoff latency is critical
/// - Burning some CPU while waiting is acceptable
#[derive(Debug, Clone, Copy)]
pub struct SpinPark {
    /// Fallback for long waits
    fallback: CondvarPark,
    /// Spin duration before falling back
    spin_duration: Duration,
    /// Maximum spin iterations
    max_spins: u32,
}

impl SpinPark {
    /// Create a new adaptive spin-park strategy
    pub const fn new(spin_duration: Duration, max_spins: u32) -> Self {
        Self {
            fallback: CondvarPark::new(),
            spin_duration,
            max_spins,
        }
    }

    /// Create with default parameters (optimized for <100µs waits)
    pub const fn with_defaults() -> Self {
        Self::new(Duration::from_micros(50), 500)
    }

    /// Spin until the permit appears, the budget runs out, or the deadline
    /// passes
    ///
    /// Returns true if a permit was observed
    fn spin(&self, parker: &Parker, deadline: Option<Instant>) -> bool {
        let start = Instant::now();
        let mut spin_count = 0u32;
        let mut backoff = Duration::from_nanos(1);

        loop {
            if parker.has_permit() {
                return true;
            }

            let now = Instant::now();
            if now.duration_since(start) >= self.spin_duration || spin_count >= self.max_spins {
                return false;
            }
            if deadline.is_some_and(|d| now >= d) {
                return false;
            }

            if spin_count < SPIN_TIGHT_ITERATIONS {
                std::hint::spin_loop();
            } else if spin_count < SPIN_YIELD_ITERATIONS {
                thread::yield_now();
            } else {
                thread::sleep(backoff);
                backoff = (backoff * 2).min(SPIN_MAX_BACKOFF);
            }

            spin_count += 1;
        }
    }
}

impl Default for SpinPark {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ParkStrategy for SpinPark {
    fn park(&self, parker: &Parker, deadline: Option<Instant>) -> bool {
        if self.spin(parker, deadline) && parker.take_permit() {
            return true;
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return parker.take_permit();
        }

        self.fallback.park(parker, deadline)
    }

    fn name(&self) -> &'static str {
        "spinwait"
    }
}
