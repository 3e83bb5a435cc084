/*!
 * Block Allocator
 * Best-fit allocation, deallocation with coalescing, pinning
 */

use super::PoolAllocator;
use crate::core::types::{Offset, Size};
use crate::memory::types::{
    Allocation, AllocationId, AllocationOptions, MemoryPressure, PoolError, PoolResult,
};
use crate::monitoring::span_pool_op;
use tracing::{debug, trace, warn};

impl PoolAllocator {
    /// Allocate `size` bytes from `pool`
    ///
    /// The request is rounded up to the pool granularity and served from the
    /// smallest free block that fits (lowest offset among equals). If nothing
    /// fits, one reclamation sweep and then one compaction are attempted
    /// before failing with `InsufficientMemory` or `Fragmented`.
    pub fn allocate(
        &mut self,
        pool: &str,
        size: Size,
        options: AllocationOptions,
    ) -> PoolResult<AllocationId> {
        let _span = span_pool_op("allocate", pool);
        let (aligned, pressure_before) = {
            let p = self.get_pool(pool)?;
            (p.aligned_size(size)?, self.pressure_of(p))
        };

        let (offset, block_size) = match self.get_pool(pool)?.free_list.best_fit(aligned) {
            Some(fit) => fit,
            None => self.recover_block(pool, aligned)?,
        };

        let id = self.next_allocation_id();
        let now = self.clock.now();
        let p = self.pool_mut(pool)?;
        p.carve(offset, aligned, id);

        if let Some(hint) = options.affinity_hint {
            if hint != p.affinity() {
                debug!(
                    pool,
                    %id,
                    hint = %hint,
                    affinity = %p.affinity(),
                    "Affinity hint differs from pool affinity"
                );
            }
        }

        p.allocations.insert(
            id,
            Allocation {
                id,
                pool: pool.to_string(),
                offset,
                requested_size: size,
                actual_size: aligned,
                created_at: now,
                last_access: now,
                access_count: 0,
                pinned: options.pinned,
                affinity_hint: options.affinity_hint,
                metadata: options.metadata,
            },
        );
        self.index.insert(id, pool.to_string());

        let p = self.get_pool(pool)?;
        let pressure = self.pressure_of(p);
        if pressure > pressure_before && pressure >= MemoryPressure::High {
            warn!(
                pool,
                pressure = %pressure,
                allocated = p.allocated(),
                capacity = p.capacity(),
                "Memory pressure rising"
            );
        }

        trace!(
            pool,
            %id,
            offset,
            requested = size,
            aligned,
            block = block_size,
            "Allocated"
        );
        Ok(id)
    }

    /// Escalation when best-fit finds nothing: sweep, then compact
    fn recover_block(&mut self, pool: &str, aligned: Size) -> PoolResult<(Offset, Size)> {
        if self.config.sweep_on_pressure {
            let report = self.sweep(pool)?;
            if report.freed_any() {
                debug!(
                    pool,
                    freed = report.freed_bytes,
                    reclaimed = report.reclaimed.len(),
                    "Escalation sweep reclaimed allocations"
                );
            }
            if let Some(fit) = self.get_pool(pool)?.free_list.best_fit(aligned) {
                return Ok(fit);
            }
        }

        let free = self.get_pool(pool)?.free();
        if free < aligned {
            warn!(pool, requested = aligned, free, "Pool exhausted");
            return Err(PoolError::InsufficientMemory {
                pool: pool.to_string(),
                requested: aligned,
                free,
            });
        }

        if self.config.compact_on_fragmentation {
            match self.compact(pool) {
                Ok(report) => debug!(
                    pool,
                    relocated = report.relocated(),
                    reclaimed = report.bytes_reclaimed,
                    "Escalation compaction finished"
                ),
                Err(err) => warn!(pool, error = %err, "Escalation compaction failed"),
            }
            if let Some(fit) = self.get_pool(pool)?.free_list.best_fit(aligned) {
                return Ok(fit);
            }
        }

        let p = self.get_pool(pool)?;
        warn!(
            pool,
            requested = aligned,
            free = p.free(),
            largest_free = p.largest_free_block(),
            "Pool fragmented"
        );
        Err(PoolError::Fragmented {
            pool: pool.to_string(),
            requested: aligned,
            free: p.free(),
            largest_free: p.largest_free_block(),
        })
    }

    /// Free an allocation and coalesce its block with free neighbours
    ///
    /// Returns the number of bytes released. Pinned allocations must be
    /// unpinned first.
    pub fn deallocate(&mut self, id: AllocationId) -> PoolResult<Size> {
        let pool_name = self
            .index
            .get(&id)
            .cloned()
            .ok_or(PoolError::AllocationNotFound(id))?;
        let pool = self.pool_mut(&pool_name)?;

        let offset = match pool.allocations.get(&id) {
            Some(alloc) if alloc.pinned => return Err(PoolError::PinnedViolation(id)),
            Some(alloc) => alloc.offset,
            None => return Err(PoolError::AllocationNotFound(id)),
        };

        pool.allocations.remove(&id);
        let released = pool.release(offset);
        self.index.remove(&id);

        trace!(pool = %pool_name, %id, offset, released, "Deallocated");
        Ok(released)
    }

    /// Protect an allocation from sweeps and deallocation (idempotent)
    pub fn pin(&mut self, id: AllocationId) -> PoolResult<()> {
        self.allocation_mut(id)?.pinned = true;
        Ok(())
    }

    /// Lift the protection set by `pin` (idempotent)
    pub fn unpin(&mut self, id: AllocationId) -> PoolResult<()> {
        self.allocation_mut(id)?.pinned = false;
        Ok(())
    }

    /// Record an access for idle and LRU reclamation
    pub fn touch(&mut self, id: AllocationId) -> PoolResult<()> {
        let now = self.clock.now();
        let alloc = self.allocation_mut(id)?;
        alloc.last_access = now;
        alloc.access_count += 1;
        Ok(())
    }

    pub fn allocation(&self, id: AllocationId) -> PoolResult<&Allocation> {
        self.index
            .get(&id)
            .and_then(|pool| self.pools.get(pool))
            .and_then(|pool| pool.allocation(id))
            .ok_or(PoolError::AllocationNotFound(id))
    }

    /// Live allocations of a pool in ascending offset order
    pub fn allocations(&self, pool: &str) -> PoolResult<Vec<&Allocation>> {
        Ok(self.get_pool(pool)?.allocations().collect())
    }

    fn allocation_mut(&mut self, id: AllocationId) -> PoolResult<&mut Allocation> {
        let pool = self
            .index
            .get(&id)
            .ok_or(PoolError::AllocationNotFound(id))?;
        self.pools
            .get_mut(pool)
            .and_then(|p| p.allocations.get_mut(&id))
            .ok_or(PoolError::AllocationNotFound(id))
    }
}
