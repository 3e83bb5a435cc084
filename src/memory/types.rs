/*!
 * Memory Types
 * Common types for pool management
 */

use crate::core::limits::{DEFAULT_GRANULARITY, PRESSURE_MEDIUM};
use crate::core::types::{Offset, Size, Timestamp};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pool operation result
pub type PoolResult<T> = Result<T, PoolError>;

/// Error returned by a relocation callback
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}")]
pub struct RelocationError {
    pub reason: String,
}

impl RelocationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Pool errors with serialization support
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(pools::invalid_argument),
        help("Sizes, capacities and granularities must be non-zero.")
    )]
    InvalidArgument(String),

    #[error("Pool '{0}' not found")]
    #[diagnostic(code(pools::pool_not_found))]
    PoolNotFound(String),

    #[error("Allocation {0} not found")]
    #[diagnostic(
        code(pools::allocation_not_found),
        help("The allocation may have been freed or reclaimed by a sweep.")
    )]
    AllocationNotFound(AllocationId),

    #[error("Capacity profile '{0}' not found")]
    #[diagnostic(
        code(pools::profile_not_found),
        help("Register the profile before applying it by name.")
    )]
    ProfileNotFound(String),

    #[error("Pool '{0}' already exists")]
    #[diagnostic(code(pools::already_exists))]
    AlreadyExists(String),

    #[error("Out of memory in pool '{pool}': requested {requested} bytes, {free} bytes free")]
    #[diagnostic(
        code(pools::insufficient_memory),
        help("Free or unpin allocations, or grow the pool with a capacity profile.")
    )]
    InsufficientMemory {
        pool: String,
        requested: Size,
        free: Size,
    },

    #[error("Pool '{pool}' is fragmented: requested {requested} bytes, {free} bytes free, largest free block {largest_free} bytes")]
    #[diagnostic(
        code(pools::fragmented),
        help("Run a compaction with a relocation callback, or enable compaction on fragmentation.")
    )]
    Fragmented {
        pool: String,
        requested: Size,
        free: Size,
        largest_free: Size,
    },

    #[error("Allocation {0} is pinned")]
    #[diagnostic(
        code(pools::pinned_violation),
        help("Unpin the allocation before deallocating it.")
    )]
    PinnedViolation(AllocationId),

    #[error("Insufficient headroom for pool '{pool}': needs {requested} bytes, {available} bytes available")]
    #[diagnostic(code(pools::insufficient_headroom))]
    InsufficientHeadroom {
        pool: String,
        requested: Size,
        available: Size,
    },

    #[error("Relocation of allocation {allocation} in pool '{pool}' failed: {source}")]
    #[diagnostic(
        code(pools::relocation_failed),
        help("The pool was rolled back to its state before the compaction.")
    )]
    RelocationFailed {
        pool: String,
        allocation: AllocationId,
        source: RelocationError,
    },
}

/// Flat error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    InsufficientMemory,
    Fragmented,
    PinnedViolation,
    InsufficientHeadroom,
    RelocationFailed,
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PoolError::PoolNotFound(_)
            | PoolError::AllocationNotFound(_)
            | PoolError::ProfileNotFound(_) => ErrorKind::NotFound,
            PoolError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            PoolError::InsufficientMemory { .. } => ErrorKind::InsufficientMemory,
            PoolError::Fragmented { .. } => ErrorKind::Fragmented,
            PoolError::PinnedViolation(_) => ErrorKind::PinnedViolation,
            PoolError::InsufficientHeadroom { .. } => ErrorKind::InsufficientHeadroom,
            PoolError::RelocationFailed { .. } => ErrorKind::RelocationFailed,
        }
    }
}

/// Unique allocation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(pub u64);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alloc:{}", self.0)
    }
}

/// Logical affinity tag (e.g. a NUMA node number)
///
/// Purely informational: no placement is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Affinity(pub u32);

impl Affinity {
    pub const fn node(node: u32) -> Self {
        Self(node)
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Pool creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub capacity: Size,
    #[serde(default = "default_granularity")]
    pub granularity: Size,
    #[serde(default)]
    pub affinity: Affinity,
}

fn default_granularity() -> Size {
    DEFAULT_GRANULARITY
}

impl PoolSpec {
    pub fn new(name: impl Into<String>, capacity: Size) -> Self {
        Self {
            name: name.into(),
            capacity,
            granularity: DEFAULT_GRANULARITY,
            affinity: Affinity::default(),
        }
    }

    pub fn with_granularity(mut self, granularity: Size) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }
}

/// Per-allocation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationOptions {
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub affinity_hint: Option<Affinity>,
    /// Opaque caller data, never interpreted by the allocator
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AllocationOptions {
    pub fn pinned() -> Self {
        Self {
            pinned: true,
            ..Default::default()
        }
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity_hint = Some(affinity);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Live allocation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub pool: String,
    pub offset: Offset,
    pub requested_size: Size,
    /// `requested_size` rounded up to the pool granularity
    pub actual_size: Size,
    pub created_at: Timestamp,
    pub last_access: Timestamp,
    pub access_count: u64,
    pub pinned: bool,
    pub affinity_hint: Option<Affinity>,
    pub metadata: serde_json::Value,
}

impl Allocation {
    /// Microseconds since creation
    #[inline]
    pub fn age(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.created_at)
    }

    /// Microseconds since the last `touch` (or creation)
    #[inline]
    pub fn idle(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.last_access)
    }
}

/// Contiguous byte range within a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub offset: Offset,
    pub size: Size,
    pub owner: Option<AllocationId>,
}

impl Block {
    pub fn free(offset: Offset, size: Size) -> Self {
        Self {
            offset,
            size,
            owner: None,
        }
    }

    pub fn owned(offset: Offset, size: Size, owner: AllocationId) -> Self {
        Self {
            offset,
            size,
            owner: Some(owner),
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    #[inline]
    pub fn end(&self) -> Offset {
        self.offset + self.size
    }
}

/// One block move performed by a compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub allocation: AllocationId,
    pub old_offset: Offset,
    pub new_offset: Offset,
    pub size: Size,
}

/// Result of a reclamation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub freed_bytes: Size,
    pub reclaimed: Vec<AllocationId>,
}

impl SweepReport {
    pub fn freed_any(&self) -> bool {
        !self.reclaimed.is_empty()
    }
}

/// Result of a compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    /// Moves in the order they were performed (ascending offset)
    pub moves: Vec<Relocation>,
    /// Growth of the trailing free block
    pub bytes_reclaimed: Size,
}

impl CompactionReport {
    /// Number of allocations whose offset changed
    pub fn relocated(&self) -> usize {
        self.moves.len()
    }
}

/// Result of a pool resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResizeOutcome {
    Unchanged { capacity: Size },
    Grown { from: Size, to: Size },
    Shrunk { from: Size, to: Size, compacted: bool },
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_utilization(ratio: f64, warning: f64, critical: f64) -> Self {
        if ratio >= critical {
            MemoryPressure::Critical
        } else if ratio >= warning {
            MemoryPressure::High
        } else if ratio >= PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
