//! Per-device meter capabilities.
//!
//! A device advertises its metering capabilities once per connection cycle;
//! the record is replicated write-once and consulted by the allocator as the
//! identifier ceiling. Devices that advertise nothing are served by the
//! [`MeterCapabilitySource`] fallback, at higher latency.

use crate::meter::key::DeviceId;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Capability flags a device may advertise for its meter table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FeatureFlags: u32 {
        /// Band rates in kilobits per second.
        const KBPS = 0b0000_0001;
        /// Band rates in packets per second.
        const PKTPS = 0b0000_0010;
        /// Bands may carry burst sizes.
        const BURST = 0b0000_0100;
        /// The device reports meter statistics.
        const STATS = 0b0000_1000;
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Metering capabilities of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterFeatures {
    /// The advertising device.
    pub device_id: DeviceId,
    /// Number of meter cells the device supports; ids range over
    /// `0..max_meters`. Zero means metering is unsupported.
    pub max_meters: u64,
    /// Maximum bands per meter.
    pub max_bands: u32,
    /// Maximum colors per meter, for devices that remark.
    pub max_colors: u32,
    /// Advertised capability flags.
    pub features: FeatureFlags,
}

impl MeterFeatures {
    /// Create a capability record.
    pub fn new(device_id: DeviceId, max_meters: u64) -> Self {
        Self {
            device_id,
            max_meters,
            max_bands: 0,
            max_colors: 0,
            features: FeatureFlags::empty(),
        }
    }

    /// Check whether a flag is advertised.
    pub fn supports(&self, flag: FeatureFlags) -> bool {
        self.features.contains(flag)
    }
}

/// Fallback capability query against a device.
///
/// Consulted only when the capability table has no record for the device —
/// the cache-miss path is rare and a synchronous round trip to the device is
/// tolerated there.
pub trait MeterCapabilitySource: Send + Sync {
    /// Maximum number of meter cells the device supports, if it can be
    /// determined.
    fn query_max_meters(&self, device_id: &DeviceId) -> Option<u64>;
}
