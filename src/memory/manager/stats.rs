/*!
 * Stats Collector
 * Read-only occupancy and fragmentation metrics
 */

use super::PoolAllocator;
use crate::core::types::Size;
use crate::memory::pool::Pool;
use crate::memory::types::{MemoryPressure, PoolResult};
use serde::{Deserialize, Serialize};

/// `1 - largest_free / free`, zero when nothing is free
#[inline]
pub fn fragmentation_ratio(largest_free: Size, free: Size) -> f64 {
    if free == 0 {
        0.0
    } else {
        1.0 - largest_free as f64 / free as f64
    }
}

/// Per-pool snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub capacity: Size,
    pub allocated: Size,
    pub free: Size,
    pub block_count: usize,
    pub free_block_count: usize,
    pub largest_free_block: Size,
    pub live_allocations: usize,
    pub pinned_allocations: usize,
    pub utilization: f64,
    pub fragmentation_ratio: f64,
    pub pressure: MemoryPressure,
}

/// Rollup across all pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub pools: Vec<PoolStats>,
    pub capacity: Size,
    pub allocated: Size,
    pub free: Size,
    pub block_count: usize,
    pub free_block_count: usize,
    pub live_allocations: usize,
    /// `1 - sum(largest_free_block) / sum(free)`
    pub fragmentation_ratio: f64,
    pub ceiling: Size,
    pub headroom: Size,
}

impl GlobalStats {
    pub fn pool(&self, name: &str) -> Option<&PoolStats> {
        self.pools.iter().find(|p| p.name == name)
    }
}

impl PoolAllocator {
    /// Snapshot every pool plus a global rollup
    pub fn get_stats(&self) -> GlobalStats {
        let pools: Vec<PoolStats> = self.pools.values().map(|p| self.stats_of(p)).collect();

        let free: Size = pools.iter().map(|p| p.free).sum();
        let largest: Size = pools.iter().map(|p| p.largest_free_block).sum();
        GlobalStats {
            capacity: pools.iter().map(|p| p.capacity).sum(),
            allocated: pools.iter().map(|p| p.allocated).sum(),
            free,
            block_count: pools.iter().map(|p| p.block_count).sum(),
            free_block_count: pools.iter().map(|p| p.free_block_count).sum(),
            live_allocations: pools.iter().map(|p| p.live_allocations).sum(),
            fragmentation_ratio: fragmentation_ratio(largest, free),
            ceiling: self.config.address_space_ceiling,
            headroom: self.headroom(),
            pools,
        }
    }

    pub fn pool_stats(&self, name: &str) -> PoolResult<PoolStats> {
        Ok(self.stats_of(self.get_pool(name)?))
    }

    fn stats_of(&self, pool: &Pool) -> PoolStats {
        PoolStats {
            name: pool.name().to_string(),
            capacity: pool.capacity(),
            allocated: pool.allocated(),
            free: pool.free(),
            block_count: pool.block_count(),
            free_block_count: pool.free_block_count(),
            largest_free_block: pool.largest_free_block(),
            live_allocations: pool.live_allocations(),
            pinned_allocations: pool.pinned_allocations(),
            utilization: utilization(pool),
            fragmentation_ratio: fragmentation_ratio(pool.largest_free_block(), pool.free()),
            pressure: self.pressure_of(pool),
        }
    }

    pub(super) fn pressure_of(&self, pool: &Pool) -> MemoryPressure {
        MemoryPressure::from_utilization(
            utilization(pool),
            self.config.pressure_warning,
            self.config.pressure_critical,
        )
    }
}

fn utilization(pool: &Pool) -> f64 {
    pool.allocated() as f64 / pool.capacity() as f64
}
