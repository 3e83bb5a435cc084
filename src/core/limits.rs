/*!
 * System Limits and Constants
 *
 * Centralized location for allocator-wide defaults and thresholds.
 */

use std::time::Duration;

// =============================================================================
// ADDRESS SPACE
// =============================================================================

/// Engine-wide ceiling on the sum of all pool capacities
/// (4GB, or the whole address space on targets narrower than 64 bits)
pub const DEFAULT_ADDRESS_SPACE_CEILING: usize = clamp_to_usize(4 * 1024 * 1024 * 1024);

/// Default allocation granularity (64 bytes, one cache line)
pub const DEFAULT_GRANULARITY: usize = 64;

const fn clamp_to_usize(bytes: u64) -> usize {
    if bytes > usize::MAX as u64 {
        usize::MAX
    } else {
        bytes as usize
    }
}

// =============================================================================
// RECLAMATION
// =============================================================================

/// Age after which an unpinned allocation is eligible for reclamation
pub const DEFAULT_RECLAIM_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// MEMORY PRESSURE
// =============================================================================

/// Utilisation at which a pool reports `MemoryPressure::Medium`
pub const PRESSURE_MEDIUM: f64 = 0.60;

/// Utilisation at which a pool reports `MemoryPressure::High`
pub const PRESSURE_WARNING: f64 = 0.80;

/// Utilisation at which a pool reports `MemoryPressure::Critical`
pub const PRESSURE_CRITICAL: f64 = 0.95;
