/*!
 * Tracing
 * Structured logging setup and per-request spans using the tracing crate
 *
 * Features:
 * - Env-driven level filtering (RUST_LOG)
 * - JSON-formatted logs for structured parsing (BROKER_TRACE_JSON)
 * - Request spans carrying a trace ID, method, topic, and final status
 */

use std::time::Instant;
use tracing::{debug, info, span, Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

pub const ENV_TRACE_JSON: &str = "BROKER_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - BROKER_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one client request, from decode to response
pub struct RequestSpan {
    span: Span,
    start: Instant,
    trace_id: String,
}

impl RequestSpan {
    pub fn new(method: &'static str, queue: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "request",
            trace_id = %trace_id,
            method = method,
            queue = %queue,
            status = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Underlying span, for instrumenting the request future
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_status(&self, status: u16) {
        self.span.record("status", u64::from(status));
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        let duration_us = self.start.elapsed().as_micros() as u64;
        self.span.record("duration_us", duration_us);

        let _entered = self.span.enter();
        debug!(trace_id = %self.trace_id, duration_us, "request completed");
    }
}
