/*!
 * Size-Indexed Free List
 * Best-fit lookup over a pool's free blocks
 */

use crate::core::types::{Offset, Size};
use std::collections::{BTreeMap, BTreeSet};

/// Free blocks bucketed by exact size
///
/// Each distinct size is its own class; offsets inside a class are kept
/// ordered so best-fit ties resolve to the lowest offset in O(log n).
#[derive(Debug, Clone, Default)]
pub struct FreeList {
    by_size: BTreeMap<Size, BTreeSet<Offset>>,
    len: usize,
    bytes: Size,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: Offset, size: Size) {
        if self.by_size.entry(size).or_default().insert(offset) {
            self.len += 1;
            self.bytes += size;
        }
    }

    /// Remove a specific block; returns false if it was not listed
    pub fn remove(&mut self, offset: Offset, size: Size) -> bool {
        let Some(offsets) = self.by_size.get_mut(&size) else {
            return false;
        };
        if !offsets.remove(&offset) {
            return false;
        }
        // Clean up empty size classes
        if offsets.is_empty() {
            self.by_size.remove(&size);
        }
        self.len -= 1;
        self.bytes -= size;
        true
    }

    /// Smallest block with `size >= request`, lowest offset among equals
    ///
    /// The block stays listed; callers remove it when they carve it.
    pub fn best_fit(&self, request: Size) -> Option<(Offset, Size)> {
        self.by_size
            .range(request..)
            .find_map(|(size, offsets)| offsets.first().map(|offset| (*offset, *size)))
    }

    pub fn contains(&self, offset: Offset, size: Size) -> bool {
        self.by_size
            .get(&size)
            .is_some_and(|offsets| offsets.contains(&offset))
    }

    pub fn largest(&self) -> Size {
        self.by_size.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of all listed block sizes
    pub fn bytes(&self) -> Size {
        self.bytes
    }

    pub fn clear(&mut self) {
        self.by_size.clear();
        self.len = 0;
        self.bytes = 0;
    }
}
