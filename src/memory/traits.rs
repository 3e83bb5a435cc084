/*!
 * Memory Traits
 * Extension points for compaction and reclamation
 */

use super::types::{Allocation, AllocationId, RelocationError};
use crate::core::types::{Offset, Size, Timestamp};

/// Relocation callback invoked once per moved allocation during compaction
///
/// Moves are issued in ascending offset order and every destination is at or
/// below its source, so a `memmove` of `size` bytes per call never clobbers a
/// block that has not been moved yet.
///
/// Pools that back real memory must install one; without it compaction is
/// pure offset bookkeeping.
pub trait Relocator {
    fn relocate(
        &mut self,
        old_offset: Offset,
        new_offset: Offset,
        size: Size,
    ) -> Result<(), RelocationError>;
}

impl<F> Relocator for F
where
    F: FnMut(Offset, Offset, Size) -> Result<(), RelocationError>,
{
    #[inline]
    fn relocate(
        &mut self,
        old_offset: Offset,
        new_offset: Offset,
        size: Size,
    ) -> Result<(), RelocationError> {
        self(old_offset, new_offset, size)
    }
}

/// Reclamation policy consulted by the sweeper
///
/// `candidates` holds only unpinned allocations of one pool, in ascending
/// offset order. The sweeper ignores returned ids that are not candidates.
pub trait EvictionPolicy: Send + Sync {
    /// Short policy name for logs
    fn name(&self) -> &'static str;

    fn select(&self, candidates: &[&Allocation], now: Timestamp) -> Vec<AllocationId>;
}
