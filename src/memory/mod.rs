/*!
 * Memory Module
 * Named pools, block allocation and reclamation
 */

pub mod config;
pub mod manager;
pub mod policy;
pub mod pool;
pub mod shared;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use config::AllocatorConfig;
pub use manager::{
    fragmentation_ratio, BoxedRelocator, CapacityProfile, GlobalStats, PoolAllocator, PoolStats,
    ProfileOutcome,
};
pub use policy::{IdlePolicy, LruPolicy, TtlPolicy};
pub use pool::Pool;
pub use shared::SharedAllocator;
pub use traits::*;
pub use types::*;
