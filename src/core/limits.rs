/*!
 * Synchronizer Limits and Constants
 *
 * Centralized location for the tuning knobs and magic numbers used by the
 * queued synchronizer framework.
 *
 * ## Conventions
 * - Performance-critical constants are marked with [PERF]
 * - Values that mirror the classic queued-synchronizer design are marked [AQS]
 */

use std::time::Duration;

// =============================================================================
// STATE LIMITS
// =============================================================================

/// Largest representable synchronizer state
/// Hold counts and permit counts beyond this are an overflow error
pub const MAX_STATE: i32 = i32::MAX;

/// Owner slot value meaning "no exclusive owner"
/// Thread ids are handed out starting at 1
pub const NO_OWNER: u64 = 0;

// =============================================================================
// PARKING
// =============================================================================

/// Remaining time below which a timed acquire spins instead of parking (1µs)
/// [PERF] [AQS] Parking costs more than the wait itself below this threshold
pub const SPIN_FOR_TIMEOUT_THRESHOLD: Duration = Duration::from_nanos(1000);

/// Tight spin iterations before the spin strategy starts yielding
/// [PERF] Best for waits under ~100ns
pub const SPIN_TIGHT_ITERATIONS: u32 = 10;

/// Spin iterations (tight + yield) before the spin strategy starts sleeping
/// [PERF] Yield phase covers roughly 100ns-10µs waits
pub const SPIN_YIELD_ITERATIONS: u32 = 50;

/// Cap for the exponential sleep backoff in the spin strategy (1ms)
pub const SPIN_MAX_BACKOFF: Duration = Duration::from_millis(1);

/// Default spin budget before falling back to a blocking park
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_micros(10);

/// Default spin iteration cap before falling back to a blocking park
pub const DEFAULT_MAX_SPINS: u32 = 100;

/// Upper bound on any configured spin budget (100µs)
/// [PERF] Spinning longer than this burns a core for less than a park costs
pub const MAX_SPIN_DURATION: Duration = Duration::from_micros(100);

/// Spin iterations budgeted per microsecond of expected hold time
pub const SPINS_PER_MICRO: u32 = 10;

/// Expected hold time at or below which spinning beats parking (20µs)
pub const SHORT_HOLD_THRESHOLD: Duration = Duration::from_micros(20);

/// Expected hold time at or above which waiters should park straight away (1ms)
pub const LONG_HOLD_THRESHOLD: Duration = Duration::from_millis(1);

/// Park token used for every futex park (tokens carry no information here)
pub const PARK_TOKEN: usize = 0;
