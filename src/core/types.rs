/*!
 * Core Types
 * Common types used across the allocator
 */

use std::time::Duration;

/// Byte offset inside a pool's address space
pub type Offset = usize;

/// Size type for memory operations
pub type Size = usize;

/// Timestamp in microseconds since the allocator's clock epoch
pub type Timestamp = u64;

/// Whole microseconds in `duration`, saturating at `Timestamp::MAX`
#[inline]
pub fn micros(duration: Duration) -> Timestamp {
    Timestamp::try_from(duration.as_micros()).unwrap_or(Timestamp::MAX)
}

/// Round `size` up to the next multiple of `granularity`
///
/// Returns `None` on overflow or when `granularity` is zero.
#[inline]
pub fn align_up(size: Size, granularity: Size) -> Option<Size> {
    if granularity == 0 {
        return None;
    }
    let rem = size % granularity;
    if rem == 0 {
        Some(size)
    } else {
        size.checked_add(granularity - rem)
    }
}
