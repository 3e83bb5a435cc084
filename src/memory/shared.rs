/*!
 * Shared Allocator
 * Thread-safe handle around a single PoolAllocator
 */

use super::manager::{GlobalStats, PoolAllocator};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle; every operation runs under one engine-wide lock
///
/// Sweeps and compactions hold the lock for their whole duration, so no
/// other caller observes a half-compacted pool.
#[derive(Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<PoolAllocator>>,
}

impl SharedAllocator {
    pub fn new(allocator: PoolAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut PoolAllocator) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn lock(&self) -> MutexGuard<'_, PoolAllocator> {
        self.inner.lock()
    }

    pub fn stats(&self) -> GlobalStats {
        self.inner.lock().get_stats()
    }
}

impl From<PoolAllocator> for SharedAllocator {
    fn from(allocator: PoolAllocator) -> Self {
        Self::new(allocator)
    }
}

impl std::fmt::Debug for SharedAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAllocator")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
