//! Lifecycle notifications emitted toward the device-programming subsystem.
//!
//! The store does not talk to devices. It emits [`MeterEvent`]s to a
//! [`MeterStoreDelegate`]; the delegate issues protocol commands and later
//! reports the outcome back through `update_meter_state`, `mark_failed`, or
//! `remove_now`. Request events fire on every node observing the change —
//! mastership filtering is the delegate's concern.

use crate::meter::record::Meter;
use parking_lot::RwLock;
use std::sync::Arc;

/// Kind of lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterEventType {
    /// A meter entered PendingAdd and awaits installation on the device.
    AddRequested,
    /// A meter entered PendingRemove and awaits removal from the device.
    RemoveRequested,
    /// A meter was confirmed installed.
    Added,
    /// A meter left the store.
    Removed,
    /// An installed meter is referenced by no flow entry; a candidate for
    /// pruning, should the delegate's policy want it gone.
    ReferenceCountZero,
}

/// A lifecycle notification carrying the meter it concerns.
#[derive(Debug, Clone)]
pub struct MeterEvent {
    /// What happened.
    pub event_type: MeterEventType,
    /// The meter as of the event.
    pub meter: Meter,
}

impl MeterEvent {
    /// Create an event.
    pub fn new(event_type: MeterEventType, meter: Meter) -> Self {
        Self { event_type, meter }
    }
}

/// Sink for lifecycle notifications.
pub trait MeterStoreDelegate: Send + Sync {
    /// Receive one notification.
    fn notify(&self, event: MeterEvent);
}

/// Shared, swappable delegate slot.
///
/// The store and its resolution listener both hold the slot; notifications
/// emitted while no delegate is set are dropped.
pub(crate) struct DelegateSlot {
    inner: RwLock<Option<Arc<dyn MeterStoreDelegate>>>,
}

impl DelegateSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, delegate: Arc<dyn MeterStoreDelegate>) {
        *self.inner.write() = Some(delegate);
    }

    pub(crate) fn unset(&self) {
        *self.inner.write() = None;
    }

    pub(crate) fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }

    pub(crate) fn notify(&self, event: MeterEvent) {
        let delegate = self.inner.read().clone();
        if let Some(delegate) = delegate {
            delegate.notify(event);
        }
    }
}
