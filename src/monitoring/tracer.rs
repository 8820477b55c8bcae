/*!
 * Structured Tracing
 * Subscriber setup and blocking-wait spans using the tracing crate
 *
 * Features:
 * - EnvFilter driven levels (RUST_LOG)
 * - JSON-formatted logs for structured parsing
 * - One span per contended acquire with wait time and outcome
 */

use std::time::Instant;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - QSYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed; the library
/// itself never calls this.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("QSYNC_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "synchronizer tracing initialized");
    }
    installed
}

/// Span covering one queued (contended) acquire
pub struct WaitSpan {
    span: Span,
    start: Instant,
}

impl WaitSpan {
    pub fn new(policy: &'static str, mode: &'static str, thread: u64) -> Self {
        let span = span!(
            Level::TRACE,
            "queued_acquire",
            policy = policy,
            mode = mode,
            thread = thread,
            wait_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Record the outcome and how long the thread was queued
    pub fn finish(&self, result: &'static str) {
        self.span
            .record("wait_us", self.start.elapsed().as_micros() as u64);
        self.span.record("result", result);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Create a span for a queued acquire
#[inline]
pub fn span_wait(policy: &'static str, mode: &'static str, thread: u64) -> WaitSpan {
    WaitSpan::new(policy, mode, thread)
}
