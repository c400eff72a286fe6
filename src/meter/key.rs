//! Device and meter identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a network device under control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from its URI-style string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The string form of this device id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Index of a meter cell within a device. Scarce: a device supports at most
/// its advertised `max_meters` cells, indexed from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeterId(pub u64);

impl MeterId {
    /// The numeric index.
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MeterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MeterId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Globally unique key of one meter cell: (device, meter id).
///
/// Keys both the replicated meter table and the process-local table of
/// pending completion handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterKey {
    /// The device hosting the meter cell.
    pub device_id: DeviceId,
    /// The meter cell index.
    pub meter_id: MeterId,
}

impl MeterKey {
    /// Create a key.
    pub fn key(device_id: DeviceId, meter_id: MeterId) -> Self {
        Self {
            device_id,
            meter_id,
        }
    }
}

impl std::fmt::Display for MeterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.meter_id)
    }
}
