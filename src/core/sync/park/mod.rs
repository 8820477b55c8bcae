/*!
 * Park Primitives
 *
 * Thread block/wake strategies used by the queued synchronizers:
 * - Futex-based (parking_lot_core, fastest on Linux)
 * - Condvar-based (cross-platform, reliable)
 * - Spinwait-based (low-latency, high-CPU)
 *
 * # Design: Enum Dispatch for Zero-Cost Abstraction
 *
 * Synchronizers hold a `ParkStrategyImpl` enum rather than `Box<dyn
 * ParkStrategy>`, so the park call on the contended path is a match and a
 * direct call.
 */

mod condvar;
mod futex;
mod parker;
mod spinwait;
mod traits;

pub use condvar::CondvarPark;
pub use futex::FutexPark;
pub use parker::Parker;
pub use spinwait::SpinPark;
pub use traits::ParkStrategy;

use super::config::{StrategyType, SyncConfig};
use std::time::Instant;

/// Park strategy implementation (enum dispatch for zero overhead)
#[derive(Debug, Clone, Copy)]
pub(crate) enum ParkStrategyImpl {
    Futex(FutexPark),
    Condvar(CondvarPark),
    SpinWait(SpinPark),
}

impl ParkStrategyImpl {
    pub(crate) fn from_config(config: &SyncConfig) -> Self {
        match config.select_strategy() {
            StrategyType::Futex => Self::Futex(FutexPark::new()),
            StrategyType::Condvar => Self::Condvar(CondvarPark::new()),
            StrategyType::SpinWait => {
                let (spin_duration, max_spins) = config.spin_budget();
                Self::SpinWait(SpinPark::new(spin_duration, max_spins))
            }
            // select_strategy never yields Auto
            StrategyType::Auto => Self::Condvar(CondvarPark::new()),
        }
    }

    #[inline(always)]
    pub(crate) fn park(&self, parker: &Parker, deadline: Option<Instant>) -> bool {
        match self {
            Self::Futex(s) => s.park(parker, deadline),
            Self::Condvar(s) => s.park(parker, deadline),
            Self::SpinWait(s) => s.park(parker, deadline),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Futex(s) => s.name(),
            Self::Condvar(s) => s.name(),
            Self::SpinWait(s) => s.name(),
        }
    }
}
