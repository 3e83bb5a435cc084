/*!
 * Monitoring
 * Structured tracing for pool operations
 */

mod tracer;

pub use tracer::{init_tracing, span_pool_op, PoolOpSpan};

#[cfg(test)]
pub(crate) use tracer::capture_pool_ops;
