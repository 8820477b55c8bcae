/*!
 * Synchronization Configuration
 *
 * How a queued thread blocks once its fast path has failed. Every
 * synchronizer takes a `SyncConfig` through `with_config`; the presets size
 * the spin budget from the hold time the caller expects.
 *
 * Configs are serde-friendly so they can sit in a larger settings file:
 *
 * ```json
 * { "strategy": "spinwait", "max_spins": 200 }
 * ```
 *
 * Missing fields take their `Default` values.
 */

use crate::core::limits::{
    DEFAULT_MAX_SPINS, DEFAULT_SPIN_DURATION, LONG_HOLD_THRESHOLD, MAX_SPIN_DURATION,
    SHORT_HOLD_THRESHOLD, SPINS_PER_MICRO, SPIN_YIELD_ITERATIONS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a blocked waiter parks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    /// parking_lot_core keyed on the waiter's permit word
    Futex,
    /// Per-thread parking_lot Condvar
    Condvar,
    /// Bounded spin, then the condvar
    SpinWait,
    /// Futex on Linux, Condvar elsewhere
    Auto,
}

/// Park configuration for one synchronizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub strategy: StrategyType,
    /// Spin time before falling back to a blocking park (SpinWait only)
    pub spin_duration: Duration,
    /// Spin iteration cap before falling back (SpinWait only)
    pub max_spins: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Auto,
            spin_duration: DEFAULT_SPIN_DURATION,
            max_spins: DEFAULT_MAX_SPINS,
        }
    }
}

impl SyncConfig {
    /// Spin-first preset for locks held well under a millisecond
    pub const fn low_latency() -> Self {
        Self {
            strategy: StrategyType::SpinWait,
            spin_duration: Duration::from_micros(50),
            max_spins: 500,
        }
    }

    /// Park-first preset for locks held a millisecond or more
    pub const fn long_wait() -> Self {
        Self {
            strategy: StrategyType::Auto,
            spin_duration: Duration::from_micros(1),
            max_spins: 10,
        }
    }

    pub fn with_strategy(strategy: StrategyType) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Preset sized from how long the lock is expected to be held
    ///
    /// Short critical sections get a spin budget of twice the hold time, so
    /// a waiter usually sees the release without ever parking. Long ones
    /// park immediately; everything in between keeps the default.
    pub fn for_hold_time(expected_hold: Duration) -> Self {
        if expected_hold >= LONG_HOLD_THRESHOLD {
            return Self::long_wait();
        }
        if expected_hold > SHORT_HOLD_THRESHOLD {
            return Self::default();
        }

        let spin_duration = expected_hold
            .saturating_mul(2)
            .clamp(Duration::from_micros(1), MAX_SPIN_DURATION);
        let micros = u32::try_from(spin_duration.as_micros()).unwrap_or(u32::MAX);
        Self {
            strategy: StrategyType::SpinWait,
            spin_duration,
            max_spins: micros
                .saturating_mul(SPINS_PER_MICRO)
                .max(SPIN_YIELD_ITERATIONS),
        }
    }

    /// Spin budget actually handed to the spin strategy
    ///
    /// Hand-built or deserialized configs may ask for more; the duration is
    /// capped at `MAX_SPIN_DURATION`.
    pub fn spin_budget(&self) -> (Duration, u32) {
        (self.spin_duration.min(MAX_SPIN_DURATION), self.max_spins)
    }

    /// Resolve `Auto` to the strategy used on this platform
    pub fn select_strategy(&self) -> StrategyType {
        match self.strategy {
            StrategyType::Auto if cfg!(target_os = "linux") => StrategyType::Futex,
            StrategyType::Auto => StrategyType::Condvar,
            other => other,
        }
    }
}
