/*!
 * Monitoring
 * Tracing setup and request spans
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, RequestSpan, ENV_TRACE_JSON};
