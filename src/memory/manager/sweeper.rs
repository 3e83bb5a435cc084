/*!
 * Reclaim Sweeper
 * Frees unpinned allocations selected by an eviction policy
 */

use super::PoolAllocator;
use crate::core::types::Timestamp;
use crate::memory::pool::Pool;
use crate::memory::traits::EvictionPolicy;
use crate::memory::types::{AllocationId, PoolResult, SweepReport};
use crate::monitoring::span_pool_op;
use ahash::HashSet;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl PoolAllocator {
    /// Reclaim stale allocations of a pool with the configured policy
    ///
    /// Pinned allocations are never candidates. There is no timer here: the
    /// caller (or allocate escalation) decides when to sweep.
    pub fn sweep(&mut self, pool: &str) -> PoolResult<SweepReport> {
        let _span = span_pool_op("sweep", pool);
        let now = self.clock.now();
        let victims = select_victims(self.get_pool(pool)?, self.eviction.as_ref(), now);
        self.reclaim(pool, victims, self.eviction.name())
    }

    /// Reclaim with a one-off policy instead of the configured one
    pub fn sweep_with(
        &mut self,
        pool: &str,
        policy: &dyn EvictionPolicy,
    ) -> PoolResult<SweepReport> {
        let _span = span_pool_op("sweep", pool);
        let now = self.clock.now();
        let victims = select_victims(self.get_pool(pool)?, policy, now);
        self.reclaim(pool, victims, policy.name())
    }

    /// Sweep every pool, keyed by pool name
    pub fn sweep_all(&mut self) -> PoolResult<BTreeMap<String, SweepReport>> {
        let names: Vec<String> = self.pools.keys().cloned().collect();
        let mut reports = BTreeMap::new();
        for name in names {
            let report = self.sweep(&name)?;
            reports.insert(name, report);
        }
        Ok(reports)
    }

    fn reclaim(
        &mut self,
        pool: &str,
        victims: Vec<AllocationId>,
        policy: &'static str,
    ) -> PoolResult<SweepReport> {
        let mut report = SweepReport::default();
        for id in victims {
            report.freed_bytes += self.deallocate(id)?;
            report.reclaimed.push(id);
        }

        if report.freed_any() {
            info!(
                pool,
                policy,
                freed_bytes = report.freed_bytes,
                reclaimed = report.reclaimed.len(),
                "Sweep reclaimed allocations"
            );
        } else {
            debug!(pool, policy, "Sweep found nothing to reclaim");
        }
        Ok(report)
    }
}

/// Ask the policy for victims among unpinned allocations
///
/// Ids the policy invents, repeats, or that belong to pinned allocations are
/// dropped.
fn select_victims(pool: &Pool, policy: &dyn EvictionPolicy, now: Timestamp) -> Vec<AllocationId> {
    let candidates: Vec<_> = pool.allocations().filter(|a| !a.pinned).collect();
    let mut eligible: HashSet<AllocationId> = candidates.iter().map(|a| a.id).collect();

    policy
        .select(&candidates, now)
        .into_iter()
        .filter(|id| eligible.remove(id))
        .collect()
}
