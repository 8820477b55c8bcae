/*!
 * Park Strategy Traits
 *
 * Core abstraction for blocking a thread until it is unparked or a deadline
 * passes.
 *
 * # Design: Trait-Based Abstraction for Implementations
 *
 * Synchronizers dispatch through an enum (see `ParkStrategyImpl`), so this
 * trait exists to keep the strategies interchangeable and individually
 * testable. All methods are designed to inline well.
 */

use super::parker::Parker;
use std::time::Instant;

/// Strategy for parking the current thread
///
/// Implementations must honor the permit protocol of [`Parker`]:
/// - A permit deposited before `park` is consumed and `park` returns at once
/// - `park` consumes at most one permit
/// - Spurious returns are allowed; callers always re-check their condition
pub trait ParkStrategy: Send + Sync {
    /// Block the current thread on `parker` until unparked or `deadline`
    ///
    /// Returns `true` if a permit was consumed, `false` on timeout or
    /// spurious wakeup.
    ///
    /// # Performance
    ///
    /// Hot path under contention
    fn park(&self, parker: &Parker, deadline: Option<Instant>) -> bool;

    /// Get strategy name for debugging
    fn name(&self) -> &'static str;
}
