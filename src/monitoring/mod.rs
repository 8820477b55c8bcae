/*!
 * Monitoring
 * Tracing setup and spans for contended synchronizer operations
 */

mod tracer;

pub use tracer::{init_tracing, span_wait, WaitSpan};
