/*!
 * Pool Allocator
 *
 * Multi-pool allocator partitioning a flat address space into named pools.
 *
 * ## Allocation
 *
 * Every pool keeps an offset-ordered block map and a size-indexed free list:
 * - **Best-fit**: O(log n) lookup of the smallest block that fits, lowest
 *   offset among equals
 * - **Block splitting**: the front of the chosen block is handed out, the
 *   remainder returns to the free list
 * - **Coalescing**: a freed block merges with its free neighbours immediately
 *
 * When no block fits, `allocate` escalates once: reclamation sweep, then
 * compaction, then failure.
 *
 * ## Concurrency
 *
 * Mutating operations take `&mut self`; the allocator does no locking of its
 * own. Callers serialize access (see [`SharedAllocator`](super::SharedAllocator)).
 */

mod allocator;
mod compactor;
mod profile;
mod registry;
mod stats;
mod sweeper;

pub use profile::{CapacityProfile, ProfileOutcome};
pub use stats::{fragmentation_ratio, GlobalStats, PoolStats};

use super::config::AllocatorConfig;
use super::policy::TtlPolicy;
use super::pool::Pool;
use super::traits::{EvictionPolicy, Relocator};
use super::types::{AllocationId, PoolError, PoolResult, PoolSpec};
use crate::core::time::{Clock, MonotonicClock};
use crate::core::types::Timestamp;
use ahash::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Relocation callback bound to a pool
pub type BoxedRelocator = Box<dyn Relocator + Send>;

pub struct PoolAllocator {
    pub(super) pools: BTreeMap<String, Pool>,
    // Allocation id -> owning pool name
    pub(super) index: HashMap<AllocationId, String>,
    pub(super) next_id: u64,
    pub(super) config: AllocatorConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) eviction: Box<dyn EvictionPolicy>,
    pub(super) relocators: HashMap<String, BoxedRelocator>,
    pub(super) profiles: BTreeMap<String, CapacityProfile>,
}

impl PoolAllocator {
    /// Create an allocator with the default configuration
    ///
    /// Fails `AlreadyExists` on duplicate names and `InvalidArgument` on zero
    /// capacities.
    pub fn new(specs: impl IntoIterator<Item = PoolSpec>) -> PoolResult<Self> {
        Self::with_config(specs, AllocatorConfig::default())
    }

    pub fn with_config(
        specs: impl IntoIterator<Item = PoolSpec>,
        config: AllocatorConfig,
    ) -> PoolResult<Self> {
        let eviction: Box<dyn EvictionPolicy> = Box::new(TtlPolicy::new(config.reclaim_ttl));
        let mut allocator = Self {
            pools: BTreeMap::new(),
            index: HashMap::default(),
            next_id: 1,
            config,
            clock: Arc::new(MonotonicClock::new()),
            eviction,
            relocators: HashMap::default(),
            profiles: BTreeMap::new(),
        };

        for spec in specs {
            allocator.create_pool(spec)?;
        }

        info!(
            pools = allocator.pools.len(),
            capacity = allocator.total_capacity(),
            ceiling = allocator.config.address_space_ceiling,
            "Pool allocator initialized"
        );
        Ok(allocator)
    }

    /// Replace the time source (timestamps already recorded are kept)
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Replace the policy used by `sweep` and by allocate escalation
    pub fn set_eviction_policy(&mut self, policy: Box<dyn EvictionPolicy>) {
        info!(policy = policy.name(), "Eviction policy replaced");
        self.eviction = policy;
    }

    pub fn eviction_policy(&self) -> &dyn EvictionPolicy {
        self.eviction.as_ref()
    }

    /// Bind a relocation callback to a pool
    ///
    /// Mandatory for pools that back real memory: it is invoked by `compact`,
    /// by allocate escalation and by shrinking resizes.
    pub fn set_relocator(&mut self, pool: &str, relocator: BoxedRelocator) -> PoolResult<()> {
        if !self.pools.contains_key(pool) {
            return Err(PoolError::PoolNotFound(pool.to_string()));
        }
        self.relocators.insert(pool.to_string(), relocator);
        Ok(())
    }

    /// Remove a pool's relocation callback, returning it if one was set
    pub fn clear_relocator(&mut self, pool: &str) -> Option<BoxedRelocator> {
        self.relocators.remove(pool)
    }

    pub fn has_relocator(&self, pool: &str) -> bool {
        self.relocators.contains_key(pool)
    }

    /// Verify block tiling and bookkeeping of every pool
    pub fn check_invariants(&self) -> PoolResult<()> {
        for pool in self.pools.values() {
            pool.check_invariants()?;
        }
        let tracked: usize = self.pools.values().map(|p| p.live_allocations()).sum();
        if tracked != self.index.len() {
            return Err(PoolError::InvalidArgument(format!(
                "allocation index holds {} ids, pools hold {}",
                self.index.len(),
                tracked
            )));
        }
        Ok(())
    }

    fn next_allocation_id(&mut self) -> AllocationId {
        let id = AllocationId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl std::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("pools", &self.pools.keys().collect::<Vec<_>>())
            .field("live_allocations", &self.index.len())
            .field("eviction", &self.eviction.name())
            .field("config", &self.config)
            .finish()
    }
}
