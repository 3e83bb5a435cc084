/*!
 * Structured Tracing
 * Subscriber bootstrap and operation spans for pool operations
 *
 * The library only emits events; installing a subscriber is left to the
 * embedding binary (or to tests) through [`init_tracing`].
 */

use crate::core::types::micros;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Operations slower than this are reported at `warn`
const SLOW_OPERATION: Duration = Duration::from_millis(10);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - POOLS_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("POOLS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Timed span around one structural pool operation
///
/// The span is entered on creation and exited on drop, so keep the guard
/// bound to a named local (`let _span = ...`).
pub struct PoolOpSpan {
    span: tracing::span::EnteredSpan,
    start: Instant,
    operation: &'static str,
}

impl PoolOpSpan {
    pub fn new(operation: &'static str, pool: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "pool_op",
            op = operation,
            pool = %pool,
            duration_us = tracing::field::Empty,
        )
        .entered();
        Self {
            span,
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for PoolOpSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", micros(duration));

        if duration > SLOW_OPERATION {
            warn!(
                op = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow pool operation"
            );
        } else {
            debug!(
                op = self.operation,
                duration_us = micros(duration),
                "pool operation completed"
            );
        }
    }
}

/// Create a timed span for a pool operation
pub fn span_pool_op(operation: &'static str, pool: &str) -> PoolOpSpan {
    PoolOpSpan::new(operation, pool)
}

/// Run `f` under a scoped subscriber and return the `op` of every pool span opened
#[cfg(test)]
pub(crate) fn capture_pool_ops(f: impl FnOnce()) -> Vec<String> {
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer};

    #[derive(Clone, Default)]
    struct OpCapture(Arc<Mutex<Vec<String>>>);

    struct OpField<'a>(&'a mut Vec<String>);

    impl Visit for OpField<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "op" {
                self.0.push(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> Layer<S> for OpCapture {
        fn on_new_span(
            &self,
            attrs: &span::Attributes<'_>,
            _id: &span::Id,
            _ctx: Context<'_, S>,
        ) {
            attrs.record(&mut OpField(&mut self.0.lock()));
        }
    }

    let capture = OpCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    let ops = capture.0.lock().clone();
    ops
}
