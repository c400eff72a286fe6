//! Change-stream listener: handle resolution and lifecycle notifications.
//!
//! Every node subscribes one of these to the replicated meter table. Events
//! arrive in per-key order, identically on every node; the listener forwards
//! lifecycle notifications everywhere, but a completion handle is resolved
//! only on the node whose pending table owns it. Resolution evicts the
//! handle in the same step, so replayed or duplicate terminal events fall
//! through as no-ops.

use crate::fabric::{TableEvent, TableListener};
use crate::meter::events::{DelegateSlot, MeterEvent, MeterEventType};
use crate::meter::handle::{PendingTable, StoreResult};
use crate::meter::key::MeterKey;
use crate::meter::record::{MeterEntry, MeterState};
use crate::ops::observability::StoreMetrics;
use std::sync::Arc;

pub(crate) struct ResolutionListener {
    pending: Arc<PendingTable>,
    delegate: Arc<DelegateSlot>,
    metrics: Arc<StoreMetrics>,
}

impl ResolutionListener {
    pub(crate) fn new(
        pending: Arc<PendingTable>,
        delegate: Arc<DelegateSlot>,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        Self {
            pending,
            delegate,
            metrics,
        }
    }

    fn resolve(&self, key: &MeterKey, result: StoreResult) {
        if self.pending.resolve(key, result) {
            self.metrics.record_resolution(result.is_success());
        }
    }

    fn on_upsert(&self, key: &MeterKey, entry: &MeterEntry, old: Option<&MeterEntry>) {
        match entry.meter.state {
            MeterState::PendingAdd | MeterState::PendingRemove => {
                // Two cases: with a reason recorded the operation failed on
                // the device; without one the record is ready for the
                // device-programming subsystem to act on.
                match entry.reason {
                    None => {
                        let event_type = if entry.meter.state == MeterState::PendingAdd {
                            MeterEventType::AddRequested
                        } else {
                            MeterEventType::RemoveRequested
                        };
                        self.delegate
                            .notify(MeterEvent::new(event_type, entry.meter.clone()));
                    }
                    Some(reason) => self.resolve(key, StoreResult::fail(reason)),
                }
            }
            MeterState::Added => {
                let was_pending_add = old.is_some_and(|o| o.meter.state == MeterState::PendingAdd);
                if was_pending_add {
                    self.resolve(key, StoreResult::success());
                    self.delegate
                        .notify(MeterEvent::new(MeterEventType::Added, entry.meter.clone()));
                }
                // An installed meter nothing points at is a pruning
                // candidate; whether to prune is the delegate's policy.
                if entry.meter.reference_count == 0 {
                    self.delegate.notify(MeterEvent::new(
                        MeterEventType::ReferenceCountZero,
                        entry.meter.clone(),
                    ));
                }
            }
        }
    }
}

impl TableListener<MeterKey, MeterEntry> for ResolutionListener {
    fn on_event(&self, event: &TableEvent<MeterKey, MeterEntry>) {
        match event {
            TableEvent::Insert { key, value } => self.on_upsert(key, value, None),
            TableEvent::Update { key, old, new } => self.on_upsert(key, new, Some(old)),
            TableEvent::Remove { key, old } => {
                self.resolve(key, StoreResult::success());
                self.delegate
                    .notify(MeterEvent::new(MeterEventType::Removed, old.meter.clone()));
            }
        }
    }
}
