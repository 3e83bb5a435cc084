/*!
 * Pool Registry
 * Creation, lookup, resize and removal of named pools
 */

use super::PoolAllocator;
use crate::core::types::Size;
use crate::memory::pool::Pool;
use crate::memory::types::{Affinity, PoolError, PoolResult, PoolSpec, ResizeOutcome};
use crate::monitoring::span_pool_op;
use std::cmp::Ordering;
use tracing::{debug, info};

impl PoolAllocator {
    /// Create a pool spanning one free block
    pub fn create_pool(&mut self, spec: PoolSpec) -> PoolResult<()> {
        let _span = span_pool_op("create_pool", &spec.name);
        if self.pools.contains_key(&spec.name) {
            return Err(PoolError::AlreadyExists(spec.name));
        }

        let pool = Pool::new(spec)?;
        let headroom = self.headroom();
        if pool.capacity() > headroom {
            return Err(PoolError::InsufficientHeadroom {
                pool: pool.name().to_string(),
                requested: pool.capacity(),
                available: headroom,
            });
        }

        info!(
            pool = pool.name(),
            capacity = pool.capacity(),
            granularity = pool.granularity(),
            affinity = %pool.affinity(),
            "Created pool"
        );
        self.pools.insert(pool.name().to_string(), pool);
        Ok(())
    }

    pub fn get_pool(&self, name: &str) -> PoolResult<&Pool> {
        self.pools
            .get(name)
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))
    }

    pub(super) fn pool_mut(&mut self, name: &str) -> PoolResult<&mut Pool> {
        self.pools
            .get_mut(name)
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))
    }

    /// Resize a pool in place
    ///
    /// Growing extends the trailing free block and is bounded by the engine
    /// ceiling. Shrinking requires `free >= capacity - new_capacity` and only
    /// ever cuts free space; if the free bytes are not already at the tail the
    /// pool is compacted first.
    pub fn resize_pool(&mut self, name: &str, new_capacity: Size) -> PoolResult<ResizeOutcome> {
        let _span = span_pool_op("resize_pool", name);
        if new_capacity == 0 {
            return Err(PoolError::InvalidArgument(format!(
                "pool '{}' capacity must be positive",
                name
            )));
        }

        let current = self.get_pool(name)?.capacity();
        let outcome = match new_capacity.cmp(&current) {
            Ordering::Equal => ResizeOutcome::Unchanged { capacity: current },
            Ordering::Greater => {
                let delta = new_capacity - current;
                let headroom = self.headroom();
                if delta > headroom {
                    return Err(PoolError::InsufficientHeadroom {
                        pool: name.to_string(),
                        requested: delta,
                        available: headroom,
                    });
                }
                self.pool_mut(name)?.grow(new_capacity);
                ResizeOutcome::Grown {
                    from: current,
                    to: new_capacity,
                }
            }
            Ordering::Less => {
                let delta = current - new_capacity;
                let pool = self.get_pool(name)?;
                if pool.free() < delta {
                    return Err(PoolError::InsufficientHeadroom {
                        pool: name.to_string(),
                        requested: delta,
                        available: pool.free(),
                    });
                }

                let compacted = pool.trailing_free() < delta;
                if compacted {
                    debug!(
                        pool = name,
                        trailing = pool.trailing_free(),
                        needed = delta,
                        "Free space not at the tail, compacting before shrink"
                    );
                    self.compact(name)?;
                }
                self.pool_mut(name)?.shrink(new_capacity)?;
                ResizeOutcome::Shrunk {
                    from: current,
                    to: new_capacity,
                    compacted,
                }
            }
        };

        if !matches!(outcome, ResizeOutcome::Unchanged { .. }) {
            info!(pool = name, from = current, to = new_capacity, "Resized pool");
        }
        Ok(outcome)
    }

    /// Destroy an empty pool
    pub fn remove_pool(&mut self, name: &str) -> PoolResult<()> {
        let _span = span_pool_op("remove_pool", name);
        let pool = self.get_pool(name)?;
        if pool.live_allocations() > 0 {
            return Err(PoolError::InvalidArgument(format!(
                "pool '{}' still holds {} allocations",
                name,
                pool.live_allocations()
            )));
        }
        self.pools.remove(name);
        self.relocators.remove(name);
        info!(pool = name, "Removed pool");
        Ok(())
    }

    /// Pool names in ascending order
    pub fn pool_names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    pub fn pools_with_affinity(&self, affinity: Affinity) -> Vec<&str> {
        self.pools
            .values()
            .filter(|p| p.affinity() == affinity)
            .map(|p| p.name())
            .collect()
    }

    /// Sum of all pool capacities
    pub fn total_capacity(&self) -> Size {
        self.pools.values().map(|p| p.capacity()).sum()
    }

    /// Capacity still available under the engine-wide ceiling
    pub fn headroom(&self) -> Size {
        self.config
            .address_space_ceiling
            .saturating_sub(self.total_capacity())
    }
}
