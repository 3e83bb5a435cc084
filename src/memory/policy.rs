/*!
 * Eviction Policies
 * Built-in reclamation strategies for the sweeper
 */

use super::traits::EvictionPolicy;
use super::types::{Allocation, AllocationId};
use crate::core::types::{micros, Size, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reclaim allocations older than a fixed time-to-live
///
/// A zero TTL reclaims every candidate regardless of measured age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    pub ttl: Duration,
}

impl TtlPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl EvictionPolicy for TtlPolicy {
    fn name(&self) -> &'static str {
        "ttl"
    }

    fn select(&self, candidates: &[&Allocation], now: Timestamp) -> Vec<AllocationId> {
        let ttl = micros(self.ttl);
        candidates
            .iter()
            .filter(|a| ttl == 0 || a.age(now) > ttl)
            .map(|a| a.id)
            .collect()
    }
}

/// Reclaim allocations not touched for longer than `idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdlePolicy {
    pub idle: Duration,
}

impl IdlePolicy {
    pub fn new(idle: Duration) -> Self {
        Self { idle }
    }
}

impl EvictionPolicy for IdlePolicy {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn select(&self, candidates: &[&Allocation], now: Timestamp) -> Vec<AllocationId> {
        let idle = micros(self.idle);
        candidates
            .iter()
            .filter(|a| a.idle(now) > idle)
            .map(|a| a.id)
            .collect()
    }
}

/// Reclaim least-recently-used allocations until `target_bytes` are freed
///
/// Ties on last access go to the less frequently accessed allocation, then to
/// the lower offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruPolicy {
    pub target_bytes: Size,
}

impl LruPolicy {
    pub fn new(target_bytes: Size) -> Self {
        Self { target_bytes }
    }
}

impl EvictionPolicy for LruPolicy {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn select(&self, candidates: &[&Allocation], _now: Timestamp) -> Vec<AllocationId> {
        let mut ordered: Vec<&Allocation> = candidates.to_vec();
        ordered.sort_by_key(|a| (a.last_access, a.access_count, a.offset));

        let mut freed = 0;
        let mut victims = Vec::new();
        for alloc in ordered {
            if freed >= self.target_bytes {
                break;
            }
            freed += alloc.actual_size;
            victims.push(alloc.id);
        }
        victims
    }
}
