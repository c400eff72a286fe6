//! The distributed meter store.
//!
//! Meter records are replicated across the cluster; every node runs the
//! identical store logic against the same fabric primitives. Writes are
//! optimistic and non-blocking: callers get a [`CompletionHandle`] back
//! immediately and the handle resolves when the device acknowledgement
//! propagates through the table's change stream — possibly having crossed
//! the cluster, since the node programming a device need not be the node
//! that took the request.

use crate::core::error::FailReason;
use crate::fabric::{CounterMap, ReplicatedSet, ReplicatedTable, StorageFabric, TableListener};
use crate::meter::allocator::{IdAllocator, ReuseStrategy};
use crate::meter::events::{DelegateSlot, MeterStoreDelegate};
use crate::meter::features::{MeterCapabilitySource, MeterFeatures};
use crate::meter::handle::{CompletionHandle, PendingTable, StoreResult};
use crate::meter::key::{DeviceId, MeterId, MeterKey};
use crate::meter::listener::ResolutionListener;
use crate::meter::record::{Meter, MeterEntry, MeterState};
use crate::ops::observability::{MetricsSnapshot, StoreMetrics};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const METERS_TABLE: &str = "metron-meters";
const FEATURES_TABLE: &str = "metron-meter-features";
const FREE_IDS_SET: &str = "metron-free-meter-ids";
const ID_COUNTERS: &str = "metron-meter-id-counters";

/// One node's view of the cluster-replicated meter store.
///
/// Construct one per node against the cluster's [`StorageFabric`], inject
/// the optional capability-query collaborator, and call [`start`] before
/// use. All state except the pending-handle table is shared through the
/// fabric; the pending table is deliberately process-local.
///
/// [`start`]: Self::start
pub struct MeterStore {
    meters: ReplicatedTable<MeterKey, MeterEntry>,
    features: ReplicatedTable<DeviceId, MeterFeatures>,
    allocator: IdAllocator,
    pending: Arc<PendingTable>,
    delegate: Arc<DelegateSlot>,
    listener: Arc<ResolutionListener>,
    capability_source: Option<Arc<dyn MeterCapabilitySource>>,
    metrics: Arc<StoreMetrics>,
    user_defined_index: AtomicBool,
    started: AtomicBool,
}

impl MeterStore {
    /// Create a store over the given fabric.
    pub fn new(
        fabric: &StorageFabric,
        strategy: ReuseStrategy,
        rng_seed: Option<u64>,
        capability_source: Option<Arc<dyn MeterCapabilitySource>>,
    ) -> Self {
        let metrics = Arc::new(StoreMetrics::new());
        let pending = Arc::new(PendingTable::new());
        let delegate = Arc::new(DelegateSlot::new());
        let free_ids: ReplicatedSet<MeterKey> = fabric.set(FREE_IDS_SET);
        let counters: CounterMap<DeviceId> = fabric.counter_map(ID_COUNTERS);
        let allocator = IdAllocator::new(
            free_ids,
            counters,
            strategy,
            rng_seed,
            Arc::clone(&metrics),
        );
        let listener = Arc::new(ResolutionListener::new(
            Arc::clone(&pending),
            Arc::clone(&delegate),
            Arc::clone(&metrics),
        ));
        Self {
            meters: fabric.table(METERS_TABLE),
            features: fabric.table(FEATURES_TABLE),
            allocator,
            pending,
            delegate,
            listener,
            capability_source,
            metrics,
            user_defined_index: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Subscribe this node to the meter table's change stream. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let listener: Arc<dyn TableListener<MeterKey, MeterEntry>> = self.listener.clone();
        self.meters.subscribe(listener);
        tracing::info!("meter store started");
    }

    /// Unsubscribe from the change stream. Idempotent.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        let listener: Arc<dyn TableListener<MeterKey, MeterEntry>> = self.listener.clone();
        self.meters.unsubscribe(&listener);
        tracing::info!("meter store stopped");
    }

    /// Set the lifecycle-notification delegate.
    pub fn set_delegate(&self, delegate: Arc<dyn MeterStoreDelegate>) {
        self.delegate.set(delegate);
    }

    /// Clear the lifecycle-notification delegate.
    pub fn unset_delegate(&self) {
        self.delegate.unset();
    }

    /// Check whether a delegate is installed.
    pub fn has_delegate(&self) -> bool {
        self.delegate.is_set()
    }

    // ------------------------------------------------------------------
    // Meter operations
    // ------------------------------------------------------------------

    /// Store a meter. The record enters the table as PendingAdd and the
    /// returned handle resolves once the device acknowledgement arrives.
    pub fn store_meter(&self, meter: Meter) -> CompletionHandle {
        if self.user_defined_index.load(Ordering::SeqCst) {
            let max = self.max_meters(&meter.device_id);
            if max > 0 && meter.id.index() >= max {
                tracing::warn!(key = %meter.key(), max, "meter index out of capability range");
                return CompletionHandle::ready(StoreResult::fail(FailReason::InvalidMeter));
            }
        }
        let key = meter.key();
        let Some(handle) = self.register(&key) else {
            return CompletionHandle::ready(StoreResult::fail(FailReason::Busy));
        };
        let mut meter = meter;
        meter.state = MeterState::PendingAdd;
        if let Err(e) = self.meters.put(key.clone(), MeterEntry::of(meter)) {
            tracing::error!(key = %key, error = %e, "meter write failed");
            self.metrics.record_storage_failure();
            self.pending.resolve(&key, StoreResult::fail(FailReason::Timeout));
        }
        handle
    }

    /// Replace an existing meter's description, re-entering PendingAdd so
    /// the device is reprogrammed. Fails fast with `InvalidMeter` when the
    /// key is unknown — an update never materializes a record.
    pub fn update_meter(&self, meter: Meter) -> CompletionHandle {
        let key = meter.key();
        let Some(handle) = self.register(&key) else {
            return CompletionHandle::ready(StoreResult::fail(FailReason::Busy));
        };
        let mut meter = meter;
        meter.state = MeterState::PendingAdd;
        let entry = MeterEntry::of(meter);
        match self.meters.compute_if_present(&key, |_| entry.clone()) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.pending
                    .resolve(&key, StoreResult::fail(FailReason::InvalidMeter));
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "meter update failed");
                self.metrics.record_storage_failure();
                self.pending.resolve(&key, StoreResult::fail(FailReason::Timeout));
            }
        }
        handle
    }

    /// Request removal of a meter. The record moves to PendingRemove and is
    /// pruned once the device reports it gone; deleting an absent key
    /// resolves the handle with success immediately.
    pub fn delete_meter(&self, meter: &Meter) -> CompletionHandle {
        let key = meter.key();
        let Some(handle) = self.register(&key) else {
            return CompletionHandle::ready(StoreResult::fail(FailReason::Busy));
        };
        let outcome = self.meters.compute_if_present(&key, |current| {
            if current.meter.state == MeterState::PendingRemove {
                return current.clone();
            }
            let mut entry = current.clone();
            entry.meter.state = MeterState::PendingRemove;
            entry
        });
        match outcome {
            Ok(Some(_)) => {}
            // Not in the store: nothing to remove, complete immediately.
            Ok(None) => {
                self.pending.resolve(&key, StoreResult::success());
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "meter delete failed");
                self.metrics.record_storage_failure();
                self.pending.resolve(&key, StoreResult::fail(FailReason::Timeout));
            }
        }
        handle
    }

    /// Merge device-reported statistics into the stored record; the stats
    /// workflow. A PendingAdd record is promoted to the observed state,
    /// which the resolution listener turns into the handle completion.
    /// Counters are copied regardless of state.
    pub fn update_meter_state(&self, observed: &Meter) -> Option<Meter> {
        let key = observed.key();
        let outcome = self.meters.compute_if_present(&key, |current| {
            let mut entry = current.clone();
            if entry.meter.state == MeterState::PendingAdd {
                entry.meter.state = observed.state;
            }
            entry.meter.life = observed.life;
            entry.meter.reference_count = observed.reference_count;
            entry.meter.packets_seen = observed.packets_seen;
            entry.meter.bytes_seen = observed.bytes_seen;
            entry.reason = None;
            entry
        });
        match outcome {
            Ok(entry) => entry.map(|e| e.meter),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "stats merge failed");
                self.metrics.record_storage_failure();
                None
            }
        }
    }

    /// Record a device-reported failure against a meter. The listener
    /// resolves the owning node's handle with the reason; the record stays
    /// in the table until the caller deletes it.
    pub fn mark_failed(&self, meter: &Meter, reason: FailReason) {
        let key = meter.key();
        if let Err(e) = self.meters.compute_if_present(&key, |current| {
            let mut entry = current.clone();
            entry.reason = Some(reason);
            entry
        }) {
            tracing::error!(key = %key, error = %e, "failed to record meter failure");
            self.metrics.record_storage_failure();
        }
    }

    /// Remove a meter record terminally, bypassing PendingRemove, and
    /// return its identifier to the free set. Used on removal
    /// acknowledgement from the device and by purge.
    pub fn remove_now(&self, meter: &Meter) {
        let key = meter.key();
        match self.meters.remove(&key) {
            Ok(Some(_)) => {
                self.metrics.record_meter_purged();
                self.allocator.free(&meter.device_id, meter.id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(key = %key, error = %e, "meter removal failed");
                self.metrics.record_storage_failure();
            }
        }
    }

    /// Force-remove every meter of an unreachable device and reclaim its
    /// identifier space, capability record, and counter state. Safe to call
    /// repeatedly; a purge of an already-empty device is a no-op.
    pub fn purge_device(&self, device_id: &DeviceId) {
        let doomed: Vec<MeterEntry> = self
            .meters
            .snapshot()
            .into_iter()
            .filter(|(key, _)| &key.device_id == device_id)
            .map(|(_, entry)| entry)
            .collect();
        for entry in &doomed {
            self.remove_now(&entry.meter);
        }
        self.allocator.clear_device(device_id);
        self.delete_features(device_id);
        if !doomed.is_empty() {
            tracing::info!(device = %device_id, purged = doomed.len(), "purged device meters");
        }
    }

    /// Purge only the meters a given application owns on a device.
    pub fn purge_device_for_app(&self, device_id: &DeviceId, app_id: &str) {
        let doomed: Vec<MeterEntry> = self
            .meters
            .snapshot()
            .into_iter()
            .filter(|(key, entry)| &key.device_id == device_id && entry.meter.app_id == app_id)
            .map(|(_, entry)| entry)
            .collect();
        for entry in doomed {
            self.remove_now(&entry.meter);
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The meter stored under a key, failed or not.
    pub fn meter(&self, key: &MeterKey) -> Option<Meter> {
        self.meters.get(key).map(|entry| entry.meter)
    }

    /// All meters of one device.
    pub fn meters(&self, device_id: &DeviceId) -> Vec<Meter> {
        self.meters
            .snapshot()
            .into_iter()
            .filter(|(key, _)| &key.device_id == device_id)
            .map(|(_, entry)| entry.meter)
            .collect()
    }

    /// All meters in the store.
    pub fn all_meters(&self) -> Vec<Meter> {
        self.meters
            .snapshot()
            .into_iter()
            .map(|(_, entry)| entry.meter)
            .collect()
    }

    /// Number of handles this node is still waiting on.
    pub fn pending_operations(&self) -> usize {
        self.pending.len()
    }

    // ------------------------------------------------------------------
    // Identifier allocation
    // ------------------------------------------------------------------

    /// Allocate a meter id for a device, reusing a freed id when one is
    /// available and minting otherwise. On a capability-cache miss the
    /// injected capability source is queried synchronously.
    pub fn allocate_meter_id(&self, device_id: &DeviceId) -> Option<MeterId> {
        if self.user_defined_index.load(Ordering::SeqCst) {
            tracing::warn!("cannot allocate meter id in user-defined index mode");
            return None;
        }
        self.allocator.allocate(device_id, || {
            let known = self.max_meters(device_id);
            if known > 0 {
                return known;
            }
            self.capability_source
                .as_ref()
                .and_then(|source| source.query_max_meters(device_id))
                .unwrap_or(0)
        })
    }

    /// Return a meter id to the device's free pool.
    pub fn free_meter_id(&self, device_id: &DeviceId, id: MeterId) {
        if self.user_defined_index.load(Ordering::SeqCst) {
            tracing::debug!("cannot free meter id in user-defined index mode");
            return;
        }
        self.allocator.free(device_id, id);
    }

    /// Toggle user-defined index mode, in which callers pick their own
    /// indices and the allocator is disabled. Only possible while the store
    /// has neither records nor allocation state; returns the mode in
    /// effect.
    pub fn user_defined_index_mode(&self, enable: bool) -> bool {
        if self.meters.is_empty() && !self.allocator.has_allocations() {
            self.user_defined_index.store(enable, Ordering::SeqCst);
        } else {
            tracing::warn!(
                "unable to {} user-defined index mode, store already made allocations",
                if enable { "enable" } else { "disable" }
            );
        }
        self.user_defined_index.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    /// Record a device's meter capabilities. Write-once per connection
    /// cycle: registering twice is a silent no-op, never an error.
    pub fn store_features(&self, features: MeterFeatures) -> StoreResult {
        let device_id = features.device_id.clone();
        match self.features.put_if_absent(device_id.clone(), features) {
            Ok(_) => StoreResult::success(),
            Err(e) => {
                tracing::error!(device = %device_id, error = %e, "capability write failed");
                self.metrics.record_storage_failure();
                StoreResult::fail(FailReason::Timeout)
            }
        }
    }

    /// Record capabilities for several devices as one operation: a failure
    /// on one element is reported but does not stop the rest.
    pub fn store_features_all(
        &self,
        features: impl IntoIterator<Item = MeterFeatures>,
    ) -> StoreResult {
        let mut result = StoreResult::success();
        for f in features {
            if !self.store_features(f).is_success() {
                result = StoreResult::fail(FailReason::Timeout);
            }
        }
        result
    }

    /// Drop a device's capability record.
    pub fn delete_features(&self, device_id: &DeviceId) -> StoreResult {
        match self.features.remove(device_id) {
            Ok(_) => StoreResult::success(),
            Err(e) => {
                tracing::error!(device = %device_id, error = %e, "capability delete failed");
                self.metrics.record_storage_failure();
                StoreResult::fail(FailReason::Timeout)
            }
        }
    }

    /// The device's advertised meter capacity; zero when unknown.
    pub fn max_meters(&self, device_id: &DeviceId) -> u64 {
        self.features
            .get(device_id)
            .map(|f| f.max_meters)
            .unwrap_or(0)
    }

    /// Snapshot the store counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn register(&self, key: &MeterKey) -> Option<CompletionHandle> {
        let handle = self.pending.register(key.clone());
        if handle.is_none() {
            tracing::warn!(key = %key, "operation already in flight for meter key");
            self.metrics.record_rejected_busy();
        }
        handle
    }
}
