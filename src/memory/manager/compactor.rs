/*!
 * Compactor
 * Defragmentation by sliding every live block towards offset zero
 */

use super::PoolAllocator;
use crate::memory::pool::Pool;
use crate::memory::traits::Relocator;
use crate::memory::types::{CompactionReport, PoolError, PoolResult, Relocation};
use crate::monitoring::span_pool_op;
use tracing::{info, warn};

impl PoolAllocator {
    /// Compact a pool using its registered relocator, if any
    ///
    /// Without a relocator only offsets change, which is safe only when the
    /// pool does not back real memory.
    pub fn compact(&mut self, pool: &str) -> PoolResult<CompactionReport> {
        let _span = span_pool_op("compact", pool);
        let target = self
            .pools
            .get_mut(pool)
            .ok_or_else(|| PoolError::PoolNotFound(pool.to_string()))?;
        let relocator = self
            .relocators
            .get_mut(pool)
            .map(|r| r.as_mut() as &mut dyn Relocator);
        compact_pool(target, relocator)
    }

    /// Compact a pool with a one-off relocation callback
    pub fn compact_with(
        &mut self,
        pool: &str,
        relocator: &mut dyn Relocator,
    ) -> PoolResult<CompactionReport> {
        let _span = span_pool_op("compact", pool);
        compact_pool(self.pool_mut(pool)?, Some(relocator))
    }
}

/// Relocate live blocks to the lowest offsets, preserving their order
///
/// All-or-nothing: if the relocator fails the pool is restored from a
/// snapshot taken before the first move.
fn compact_pool(
    pool: &mut Pool,
    mut relocator: Option<&mut dyn Relocator>,
) -> PoolResult<CompactionReport> {
    let trailing_before = pool.trailing_free();
    if pool.free_block_count() <= 1 && trailing_before == pool.free() {
        return Ok(CompactionReport::default());
    }

    let snapshot = relocator.is_some().then(|| pool.clone());
    let live: Vec<_> = pool
        .blocks
        .values()
        .filter_map(|b| b.owner.map(|owner| (b.offset, b.size, owner)))
        .collect();

    let mut layout = Vec::with_capacity(live.len());
    let mut cursor = 0;
    let mut moves = Vec::new();
    for (offset, size, owner) in live {
        if offset != cursor {
            if let Some(r) = relocator.as_deref_mut() {
                if let Err(source) = r.relocate(offset, cursor, size) {
                    if let Some(snapshot) = snapshot {
                        *pool = snapshot;
                    }
                    warn!(
                        pool = pool.name(),
                        allocation = %owner,
                        old_offset = offset,
                        new_offset = cursor,
                        error = %source,
                        "Relocation failed, compaction rolled back"
                    );
                    return Err(PoolError::RelocationFailed {
                        pool: pool.name().to_string(),
                        allocation: owner,
                        source,
                    });
                }
            }
            if let Some(alloc) = pool.allocations.get_mut(&owner) {
                alloc.offset = cursor;
            }
            moves.push(Relocation {
                allocation: owner,
                old_offset: offset,
                new_offset: cursor,
                size,
            });
        }
        layout.push((cursor, size, owner));
        cursor += size;
    }

    pool.rebuild(&layout);

    let report = CompactionReport {
        moves,
        bytes_reclaimed: pool.free() - trailing_before,
    };
    info!(
        pool = pool.name(),
        relocated = report.relocated(),
        bytes_reclaimed = report.bytes_reclaimed,
        "Compacted pool"
    );
    Ok(report)
}
