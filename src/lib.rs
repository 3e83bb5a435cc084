/*!
 * Semantic Pools
 * Multi-pool in-process allocator with reclamation, compaction and
 * capacity profiles
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use memory::{
    AllocationId, AllocationOptions, AllocatorConfig, PoolAllocator, PoolError, PoolResult,
    PoolSpec, SharedAllocator,
};
pub use monitoring::init_tracing;
