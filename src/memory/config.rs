/*!
 * Allocator Configuration
 *
 * Runtime configuration for ceilings, reclamation and escalation
 */

use crate::core::limits::{
    DEFAULT_ADDRESS_SPACE_CEILING, DEFAULT_RECLAIM_TTL, PRESSURE_CRITICAL, PRESSURE_WARNING,
};
use crate::core::types::Size;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allocator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Upper bound on the sum of all pool capacities
    pub address_space_ceiling: Size,
    /// Age after which the default TTL policy reclaims unpinned allocations
    pub reclaim_ttl: Duration,
    /// Let `allocate` run a sweep when no free block fits
    pub sweep_on_pressure: bool,
    /// Let `allocate` compact when free bytes exist but no block fits
    pub compact_on_fragmentation: bool,
    /// Utilisation ratio reported as `MemoryPressure::High`
    pub pressure_warning: f64,
    /// Utilisation ratio reported as `MemoryPressure::Critical`
    pub pressure_critical: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            address_space_ceiling: DEFAULT_ADDRESS_SPACE_CEILING,
            reclaim_ttl: DEFAULT_RECLAIM_TTL,
            sweep_on_pressure: true,
            compact_on_fragmentation: true,
            pressure_warning: PRESSURE_WARNING,
            pressure_critical: PRESSURE_CRITICAL,
        }
    }
}

impl AllocatorConfig {
    /// No engine-wide ceiling
    pub fn unbounded() -> Self {
        Self {
            address_space_ceiling: Size::MAX,
            ..Self::default()
        }
    }

    /// `allocate` fails immediately instead of sweeping or compacting
    pub fn no_escalation() -> Self {
        Self {
            sweep_on_pressure: false,
            compact_on_fragmentation: false,
            ..Self::default()
        }
    }

    pub fn with_ceiling(mut self, ceiling: Size) -> Self {
        self.address_space_ceiling = ceiling;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.reclaim_ttl = ttl;
        self
    }

    pub fn with_sweep_on_pressure(mut self, enabled: bool) -> Self {
        self.sweep_on_pressure = enabled;
        self
    }

    pub fn with_compact_on_fragmentation(mut self, enabled: bool) -> Self {
        self.compact_on_fragmentation = enabled;
        self
    }

    pub fn with_pressure_thresholds(mut self, warning: f64, critical: f64) -> Self {
        self.pressure_warning = warning;
        self.pressure_critical = critical;
        self
    }
}
