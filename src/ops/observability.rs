//! Store metrics.
//!
//! Counters cover the two hot paths — identifier allocation and handle
//! resolution — plus the administrative and failure paths. All counters are
//! monotonic; [`StoreMetrics::snapshot`] produces a serializable view for
//! status surfaces.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters maintained by the meter store.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    ids_reused: AtomicU64,
    ids_minted: AtomicU64,
    allocations_denied: AtomicU64,
    resolved_success: AtomicU64,
    resolved_failure: AtomicU64,
    rejected_busy: AtomicU64,
    meters_purged: AtomicU64,
    storage_failures: AtomicU64,
}

impl StoreMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_id_reused(&self) {
        self.ids_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_id_minted(&self) {
        self.ids_minted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allocation_denied(&self) {
        self.allocations_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self, success: bool) {
        if success {
            self.resolved_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.resolved_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rejected_busy(&self) {
        self.rejected_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_meter_purged(&self) {
        self.meters_purged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ids_reused: self.ids_reused.load(Ordering::Relaxed),
            ids_minted: self.ids_minted.load(Ordering::Relaxed),
            allocations_denied: self.allocations_denied.load(Ordering::Relaxed),
            resolved_success: self.resolved_success.load(Ordering::Relaxed),
            resolved_failure: self.resolved_failure.load(Ordering::Relaxed),
            rejected_busy: self.rejected_busy.load(Ordering::Relaxed),
            meters_purged: self.meters_purged.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Identifiers handed out from the free set.
    pub ids_reused: u64,
    /// Identifiers minted from the counter.
    pub ids_minted: u64,
    /// Allocation requests that returned nothing.
    pub allocations_denied: u64,
    /// Completion handles resolved with success.
    pub resolved_success: u64,
    /// Completion handles resolved with a failure.
    pub resolved_failure: u64,
    /// Requests rejected because an operation was already in flight.
    pub rejected_busy: u64,
    /// Records force-removed by purge or removal acknowledgement.
    pub meters_purged: u64,
    /// Storage-layer faults observed while issuing writes.
    pub storage_failures: u64,
}
