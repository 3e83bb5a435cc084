/*!
 * Pool
 *
 * A named, fixed-capacity partition of the allocator's address space.
 *
 * ## Layout
 *
 * - **Block map**: `BTreeMap<Offset, Block>` tiling `[0, capacity)` with no gaps
 *   or overlaps. Neighbour lookup for coalescing is O(log n).
 * - **Free list**: size-indexed, see [`FreeList`]. Holds exactly the free
 *   blocks of the block map.
 * - **Allocations**: live records keyed by id. Every owned block has exactly
 *   one record and vice versa.
 *
 * Free blocks are always fully coalesced: two free blocks are never adjacent.
 */

mod free_list;

pub use free_list::FreeList;

use super::types::{
    Affinity, Allocation, AllocationId, Block, PoolError, PoolResult, PoolSpec,
};
use crate::core::types::{align_up, Offset, Size};
use ahash::HashMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) name: String,
    pub(crate) capacity: Size,
    pub(crate) allocated: Size,
    pub(crate) granularity: Size,
    pub(crate) affinity: Affinity,
    pub(crate) blocks: BTreeMap<Offset, Block>,
    pub(crate) free_list: FreeList,
    pub(crate) allocations: HashMap<AllocationId, Allocation>,
}

impl Pool {
    pub(crate) fn new(spec: PoolSpec) -> PoolResult<Self> {
        if spec.name.is_empty() {
            return Err(PoolError::InvalidArgument("pool name is empty".into()));
        }
        if spec.capacity == 0 {
            return Err(PoolError::InvalidArgument(format!(
                "pool '{}' capacity must be positive",
                spec.name
            )));
        }
        if spec.granularity == 0 {
            return Err(PoolError::InvalidArgument(format!(
                "pool '{}' granularity must be positive",
                spec.name
            )));
        }

        let mut pool = Self {
            name: spec.name,
            capacity: spec.capacity,
            allocated: 0,
            granularity: spec.granularity,
            affinity: spec.affinity,
            blocks: BTreeMap::new(),
            free_list: FreeList::new(),
            allocations: HashMap::default(),
        };
        pool.insert_free(0, spec.capacity);
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Size {
        self.capacity
    }

    pub fn allocated(&self) -> Size {
        self.allocated
    }

    pub fn free(&self) -> Size {
        self.capacity - self.allocated
    }

    pub fn granularity(&self) -> Size {
        self.granularity
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_block_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn largest_free_block(&self) -> Size {
        self.free_list.largest()
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub fn pinned_allocations(&self) -> usize {
        self.allocations.values().filter(|a| a.pinned).count()
    }

    /// Blocks in ascending offset order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation> {
        self.allocations.get(&id)
    }

    /// Live allocations in ascending offset order
    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.blocks
            .values()
            .filter_map(|b| b.owner.and_then(|id| self.allocations.get(&id)))
    }

    /// Size of the free block ending at `capacity`, zero if the last block is live
    pub fn trailing_free(&self) -> Size {
        match self.blocks.values().next_back() {
            Some(block) if block.is_free() => block.size,
            _ => 0,
        }
    }

    pub(crate) fn aligned_size(&self, size: Size) -> PoolResult<Size> {
        if size == 0 {
            return Err(PoolError::InvalidArgument(
                "allocation size must be positive".into(),
            ));
        }
        align_up(size, self.granularity).ok_or_else(|| {
            PoolError::InvalidArgument(format!("allocation size {} overflows", size))
        })
    }

    fn insert_free(&mut self, offset: Offset, size: Size) {
        self.blocks.insert(offset, Block::free(offset, size));
        self.free_list.insert(offset, size);
    }

    fn remove_free(&mut self, offset: Offset) -> Option<Block> {
        let block = *self.blocks.get(&offset)?;
        if !block.is_free() {
            return None;
        }
        self.blocks.remove(&offset);
        self.free_list.remove(block.offset, block.size);
        Some(block)
    }

    /// Split the free block at `offset`: the front `size` bytes go to `owner`,
    /// any remainder goes back on the free list
    pub(crate) fn carve(&mut self, offset: Offset, size: Size, owner: AllocationId) {
        let Some(block) = self.remove_free(offset) else {
            debug_assert!(false, "carve on a non-free block at {}", offset);
            return;
        };
        debug_assert!(block.size >= size);

        self.blocks.insert(offset, Block::owned(offset, size, owner));
        if block.size > size {
            self.insert_free(offset + size, block.size - size);
        }
        self.allocated += size;
    }

    /// Free the owned block at `offset` and merge it with its free neighbours
    ///
    /// Returns the size released.
    pub(crate) fn release(&mut self, offset: Offset) -> Size {
        let Some(block) = self.blocks.remove(&offset) else {
            return 0;
        };
        self.allocated -= block.size;

        let mut start = block.offset;
        let mut size = block.size;

        // Left neighbour
        let left = self
            .blocks
            .range(..start)
            .next_back()
            .map(|(_, b)| *b)
            .filter(|b| b.is_free() && b.end() == start);
        if let Some(left) = left {
            self.remove_free(left.offset);
            start = left.offset;
            size += left.size;
        }

        // Right neighbour
        if let Some(right) = self.blocks.get(&block.end()).copied() {
            if right.is_free() {
                self.remove_free(right.offset);
                size += right.size;
            }
        }

        self.insert_free(start, size);
        block.size
    }

    /// Extend the address space to `new_capacity`
    pub(crate) fn grow(&mut self, new_capacity: Size) {
        debug_assert!(new_capacity > self.capacity);
        let delta = new_capacity - self.capacity;

        let trailing = self
            .blocks
            .values()
            .next_back()
            .copied()
            .filter(|b| b.is_free());
        match trailing {
            Some(block) => {
                self.remove_free(block.offset);
                self.insert_free(block.offset, block.size + delta);
            }
            None => self.insert_free(self.capacity, delta),
        }
        self.capacity = new_capacity;
    }

    /// Cut the address space down to `new_capacity`
    ///
    /// Only the trailing free block is ever truncated; fails if it is shorter
    /// than the cut.
    pub(crate) fn shrink(&mut self, new_capacity: Size) -> PoolResult<()> {
        debug_assert!(new_capacity < self.capacity);
        let delta = self.capacity - new_capacity;
        let trailing = self.trailing_free();
        if trailing < delta {
            return Err(PoolError::InsufficientHeadroom {
                pool: self.name.clone(),
                requested: delta,
                available: trailing,
            });
        }

        let offset = self.capacity - trailing;
        self.remove_free(offset);
        if trailing > delta {
            self.insert_free(offset, trailing - delta);
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Replace the block map with a gap-free layout of the current allocations
    ///
    /// `layout` lists `(offset, size, owner)` of every live block in the new
    /// order; free space becomes a single trailing block.
    pub(crate) fn rebuild(&mut self, layout: &[(Offset, Size, AllocationId)]) {
        self.blocks.clear();
        self.free_list.clear();

        let mut cursor = 0;
        for &(offset, size, owner) in layout {
            debug_assert_eq!(offset, cursor);
            self.blocks.insert(offset, Block::owned(offset, size, owner));
            cursor = offset + size;
        }
        if cursor < self.capacity {
            self.insert_free(cursor, self.capacity - cursor);
        }
    }

    /// Verify tiling, free-list and ownership invariants
    pub fn check_invariants(&self) -> PoolResult<()> {
        let violation = |msg: String| {
            Err(PoolError::InvalidArgument(format!(
                "pool '{}' invariant violated: {}",
                self.name, msg
            )))
        };

        let mut cursor = 0;
        let mut allocated = 0;
        let mut free_blocks = 0;
        let mut prev_free = false;
        for (offset, block) in &self.blocks {
            if *offset != block.offset {
                return violation(format!("block keyed at {} has offset {}", offset, block.offset));
            }
            if block.offset != cursor {
                return violation(format!("gap or overlap at offset {}", cursor));
            }
            if block.size == 0 {
                return violation(format!("empty block at {}", block.offset));
            }
            match block.owner {
                None => {
                    if prev_free {
                        return violation(format!("uncoalesced free block at {}", block.offset));
                    }
                    if !self.free_list.contains(block.offset, block.size) {
                        return violation(format!("free block at {} not listed", block.offset));
                    }
                    free_blocks += 1;
                    prev_free = true;
                }
                Some(id) => {
                    let Some(alloc) = self.allocations.get(&id) else {
                        return violation(format!("block at {} owned by unknown {}", block.offset, id));
                    };
                    if alloc.offset != block.offset || alloc.actual_size != block.size {
                        return violation(format!("{} disagrees with its block", id));
                    }
                    if alloc.actual_size < alloc.requested_size
                        || alloc.actual_size % self.granularity != 0
                    {
                        return violation(format!("{} is misaligned", id));
                    }
                    allocated += block.size;
                    prev_free = false;
                }
            }
            cursor = block.end();
        }

        if cursor != self.capacity {
            return violation(format!("blocks cover {} of {} bytes", cursor, self.capacity));
        }
        if allocated != self.allocated {
            return violation(format!("allocated {} but blocks hold {}", self.allocated, allocated));
        }
        if free_blocks != self.free_list.len() || self.free_list.bytes() != self.free() {
            return violation("free list out of sync with block map".into());
        }
        let owned = self.blocks.values().filter(|b| !b.is_free()).count();
        if owned != self.allocations.len() {
            return violation(format!(
                "{} owned blocks but {} allocations",
                owned,
                self.allocations.len()
            ));
        }
        Ok(())
    }
}
