//! Per-device meter identifier allocation.
//!
//! Allocation prefers reuse: freed identifiers land in a cluster-shared set
//! and are claimed back through an atomic conditional removal, so two nodes
//! racing for the same id cannot both win. Only when nothing is reusable is
//! a fresh id minted from the device's counter, bounded by the device's
//! advertised capability ceiling. The counter never advances past the
//! ceiling, and it doubles as the high-water mark guarding `free` against
//! identifiers that were never handed out.

use crate::fabric::{CounterMap, ReplicatedSet};
use crate::meter::key::{DeviceId, MeterId, MeterKey};
use crate::ops::observability::StoreMetrics;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// How a reusable identifier is picked from the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseStrategy {
    /// Lowest free id first. Deterministic, minimal overhead.
    FirstFit,
    /// Uniform random pick. Spreads contention across nodes when many
    /// allocators hammer the same device.
    Random,
}

impl std::str::FromStr for ReuseStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-fit" => Ok(Self::FirstFit),
            "random" => Ok(Self::Random),
            other => Err(format!(
                "unknown reuse strategy '{other}' (expected 'first-fit' or 'random')"
            )),
        }
    }
}

/// Allocates and reclaims per-device meter identifiers.
pub struct IdAllocator {
    free_ids: ReplicatedSet<MeterKey>,
    counters: CounterMap<DeviceId>,
    strategy: ReuseStrategy,
    rng: Mutex<StdRng>,
    metrics: Arc<StoreMetrics>,
}

impl IdAllocator {
    /// Create an allocator over the shared free-id set and counter map.
    ///
    /// `seed` pins the random strategy's candidate selection for
    /// deterministic tests; production runs leave it unset.
    pub fn new(
        free_ids: ReplicatedSet<MeterKey>,
        counters: CounterMap<DeviceId>,
        strategy: ReuseStrategy,
        seed: Option<u64>,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            free_ids,
            counters,
            strategy,
            rng: Mutex::new(rng),
            metrics,
        }
    }

    /// Allocate an identifier for `device`.
    ///
    /// `ceiling` is consulted only when nothing is reusable; it returns the
    /// device's meter capacity, or zero when the capacity is unknown — in
    /// which case the allocation fails.
    pub fn allocate(&self, device_id: &DeviceId, ceiling: impl FnOnce() -> u64) -> Option<MeterId> {
        if let Some(id) = self.reuse(device_id) {
            self.metrics.record_id_reused();
            return Some(id);
        }

        let max = ceiling();
        if max == 0 {
            tracing::warn!(device = %device_id, "meter capacity unknown, cannot allocate");
            self.metrics.record_allocation_denied();
            return None;
        }

        match self.counters.increment_if_below(device_id, max) {
            Ok(Some(id)) => {
                self.metrics.record_id_minted();
                Some(MeterId(id))
            }
            Ok(None) => {
                self.metrics.record_allocation_denied();
                None
            }
            Err(e) => {
                tracing::warn!(device = %device_id, error = %e, "id mint failed");
                self.metrics.record_storage_failure();
                self.metrics.record_allocation_denied();
                None
            }
        }
    }

    /// Return an identifier to the free set.
    ///
    /// No-op when `id` is at or above the device's high-water mark — such an
    /// identifier was never allocated. Re-freeing an already free id is also
    /// a no-op.
    pub fn free(&self, device_id: &DeviceId, id: MeterId) {
        if id.index() >= self.counters.get(device_id) {
            return;
        }
        let key = MeterKey::key(device_id.clone(), id);
        if let Err(e) = self.free_ids.add(key) {
            tracing::warn!(device = %device_id, meter = %id, error = %e, "failed to free meter id");
            self.metrics.record_storage_failure();
        }
    }

    /// Drop all allocator state for a device: its free-set entries and its
    /// counter. The device's identifier space starts over from zero.
    pub fn clear_device(&self, device_id: &DeviceId) {
        for key in self.free_ids.snapshot() {
            if &key.device_id != device_id {
                continue;
            }
            if let Err(e) = self.free_ids.remove(&key) {
                tracing::warn!(device = %device_id, error = %e, "failed to clear free id");
                self.metrics.record_storage_failure();
            }
        }
        if let Err(e) = self.counters.clear(device_id) {
            tracing::warn!(device = %device_id, error = %e, "failed to clear id counter");
            self.metrics.record_storage_failure();
        }
    }

    /// The device's high-water mark: one past the highest id ever minted.
    pub fn high_water(&self, device_id: &DeviceId) -> u64 {
        self.counters.get(device_id)
    }

    /// Check whether any device has counter state.
    pub fn has_allocations(&self) -> bool {
        !self.counters.is_empty()
    }

    /// Claim a reusable id, retrying past candidates lost to concurrent
    /// allocators. The conditional set removal is the arbiter: exactly one
    /// claimant wins each id.
    fn reuse(&self, device_id: &DeviceId) -> Option<MeterId> {
        let mut candidates: Vec<u64> = self
            .free_ids
            .snapshot()
            .into_iter()
            .filter(|key| &key.device_id == device_id)
            .map(|key| key.meter_id.index())
            .collect();
        candidates.sort_unstable();

        while !candidates.is_empty() {
            let slot = match self.strategy {
                ReuseStrategy::FirstFit => 0,
                ReuseStrategy::Random if candidates.len() == 1 => 0,
                ReuseStrategy::Random => self.rng.lock().gen_range(0..candidates.len()),
            };
            let id = candidates[slot];
            let key = MeterKey::key(device_id.clone(), MeterId(id));
            match self.free_ids.remove(&key) {
                Ok(true) => return Some(MeterId(id)),
                Ok(false) => {
                    // Another allocator won this candidate.
                    candidates.remove(slot);
                }
                Err(e) => {
                    tracing::warn!(device = %device_id, error = %e, "free set removal failed");
                    self.metrics.record_storage_failure();
                    return None;
                }
            }
        }
        None
    }
}
