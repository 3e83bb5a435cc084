/*!
 * Profile Manager
 * Re-sizes pools to named capacity targets
 */

use super::PoolAllocator;
use crate::core::types::Size;
use crate::memory::types::{PoolError, PoolResult, ResizeOutcome};
use crate::monitoring::span_pool_op;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Per-pool result of applying a profile
pub type ProfileOutcome = BTreeMap<String, PoolResult<ResizeOutcome>>;

/// Named set of pool capacity targets
///
/// e.g. "favor-cache" might grow a cache pool at the expense of a working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProfile {
    pub name: String,
    pub targets: BTreeMap<String, Size>,
}

impl CapacityProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: BTreeMap::new(),
        }
    }

    pub fn target(mut self, pool: impl Into<String>, capacity: Size) -> Self {
        self.targets.insert(pool.into(), capacity);
        self
    }
}

impl PoolAllocator {
    /// Resize pools towards `targets`
    ///
    /// Shrinks run before grows so capacity released in this call counts
    /// towards the ceiling for the grows; within each phase pools go in name
    /// order. A failing entry never aborts the others.
    pub fn apply_profile(&mut self, targets: &BTreeMap<String, Size>) -> ProfileOutcome {
        let _span = span_pool_op("apply_profile", "*");
        let mut outcome = ProfileOutcome::new();

        let (shrinks, rest): (Vec<_>, Vec<_>) = targets.iter().partition(|(name, target)| {
            self.pools
                .get(name.as_str())
                .is_some_and(|p| **target < p.capacity())
        });

        for (name, target) in shrinks.into_iter().chain(rest) {
            let result = if self.pools.contains_key(name.as_str()) {
                self.resize_pool(name, *target)
            } else {
                Err(PoolError::PoolNotFound(name.clone()))
            };
            if let Err(err) = &result {
                warn!(pool = %name, target = *target, error = %err, "Profile entry not applied");
            }
            outcome.insert(name.clone(), result);
        }

        let applied = outcome.values().filter(|r| r.is_ok()).count();
        info!(
            applied,
            failed = outcome.len() - applied,
            "Applied capacity profile"
        );
        outcome
    }

    /// Store a profile for later use by name
    pub fn register_profile(&mut self, profile: CapacityProfile) {
        info!(profile = %profile.name, pools = profile.targets.len(), "Registered capacity profile");
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn profile(&self, name: &str) -> Option<&CapacityProfile> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn apply_named_profile(&mut self, name: &str) -> PoolResult<ProfileOutcome> {
        let targets = self
            .profiles
            .get(name)
            .map(|p| p.targets.clone())
            .ok_or_else(|| PoolError::ProfileNotFound(name.to_string()))?;
        info!(profile = name, "Switching capacity profile");
        Ok(self.apply_profile(&targets))
    }
}
