/*!
 * Core Module
 * Fundamental types, limits and clocks
 */

pub mod limits;
pub mod time;
pub mod types;

// Re-export for convenience
pub use time::{Clock, ManualClock, MonotonicClock};
pub use types::*;
