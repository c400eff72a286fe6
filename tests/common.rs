//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.
#![allow(dead_code)]

use metron::events::{MeterEvent, MeterEventType, MeterStoreDelegate};
use metron::features::{MeterCapabilitySource, MeterFeatures};
use metron::key::{DeviceId, MeterId};
use metron::record::{Band, Meter, MeterUnit};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Delegate that records every notification it receives.
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<MeterEvent>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded event types, in arrival order.
    pub fn event_types(&self) -> Vec<MeterEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    /// Number of recorded events of one type.
    pub fn count(&self, event_type: MeterEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// The meters carried by events of one type.
    pub fn meters_for(&self, event_type: MeterEventType) -> Vec<Meter> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.meter.clone())
            .collect()
    }
}

impl MeterStoreDelegate for RecordingDelegate {
    fn notify(&self, event: MeterEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Capability source answering every query with a fixed value.
pub struct FixedCapabilitySource {
    max_meters: Option<u64>,
    queries: AtomicUsize,
}

impl FixedCapabilitySource {
    pub fn new(max_meters: Option<u64>) -> Self {
        Self {
            max_meters,
            queries: AtomicUsize::new(0),
        }
    }

    /// Number of times the slow path was taken.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl MeterCapabilitySource for FixedCapabilitySource {
    fn query_max_meters(&self, _device_id: &DeviceId) -> Option<u64> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.max_meters
    }
}

/// A device id for tests.
pub fn device(n: u32) -> DeviceId {
    DeviceId::new(format!("of:000000000000000{n}"))
}

/// A one-band drop meter owned by the test application.
pub fn test_meter(device_id: DeviceId, id: u64) -> Meter {
    Meter::new(
        device_id,
        MeterId(id),
        "org.metron.test",
        MeterUnit::KbPerSec,
        vec![Band::drop(1_000)],
    )
}

/// Capability record advertising `max_meters` cells.
pub fn features(device_id: DeviceId, max_meters: u64) -> MeterFeatures {
    MeterFeatures::new(device_id, max_meters)
}
