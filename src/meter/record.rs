//! Meter records and their lifecycle state.
//!
//! A [`MeterEntry`] is the unit of replication: the full meter description,
//! its lifecycle state, and an optional failure reason stored as one value so
//! that state and failure always travel atomically.

use crate::core::error::FailReason;
use crate::meter::key::{DeviceId, MeterId, MeterKey};
use serde::{Deserialize, Serialize};

/// What a band does to traffic exceeding its rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    /// Drop exceeding packets.
    Drop,
    /// Remark the DSCP precedence of exceeding packets.
    Remark,
}

/// One rate band of a meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Band type.
    pub band_type: BandType,
    /// Rate threshold, in the meter's unit.
    pub rate: u64,
    /// Burst size in bytes, when the meter is a burst meter.
    pub burst_size: Option<u64>,
    /// Precedence level for remark bands.
    pub precedence: Option<u8>,
}

impl Band {
    /// A drop band at the given rate.
    pub fn drop(rate: u64) -> Self {
        Self {
            band_type: BandType::Drop,
            rate,
            burst_size: None,
            precedence: None,
        }
    }

    /// A remark band at the given rate and precedence.
    pub fn remark(rate: u64, precedence: u8) -> Self {
        Self {
            band_type: BandType::Remark,
            rate,
            burst_size: None,
            precedence: Some(precedence),
        }
    }
}

/// Unit the meter's band rates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterUnit {
    /// Kilobits per second.
    KbPerSec,
    /// Packets per second.
    PktsPerSec,
}

/// Lifecycle state of a meter record.
///
/// Records enter the table as `PendingAdd`, are promoted to `Added` when the
/// device acknowledges installation, move to `PendingRemove` on a delete
/// request, and vanish from the table on removal acknowledgement. Purge
/// bypasses the pending states entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterState {
    /// Waiting for the device to install the meter.
    PendingAdd,
    /// Installed and confirmed on the device.
    Added,
    /// Waiting for the device to remove the meter.
    PendingRemove,
}

impl MeterState {
    /// Check whether this is one of the transient request states.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingAdd | Self::PendingRemove)
    }
}

/// A meter: bands, ownership, lifecycle state, and observed statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    /// The device hosting the meter.
    pub device_id: DeviceId,
    /// The meter cell index on that device.
    pub id: MeterId,
    /// The application that requested this meter.
    pub app_id: String,
    /// Unit of the band rates.
    pub unit: MeterUnit,
    /// Whether the bands carry burst sizes.
    pub burst: bool,
    /// The rate bands, outermost first.
    pub bands: Vec<Band>,
    /// Lifecycle state.
    pub state: MeterState,
    /// Seconds the meter has existed on the device.
    pub life: u64,
    /// Number of flow entries currently pointing at this meter.
    pub reference_count: u64,
    /// Packets processed, as last reported by the device.
    pub packets_seen: u64,
    /// Bytes processed, as last reported by the device.
    pub bytes_seen: u64,
}

impl Meter {
    /// Create a meter in `PendingAdd` with zeroed statistics.
    pub fn new(
        device_id: DeviceId,
        id: MeterId,
        app_id: impl Into<String>,
        unit: MeterUnit,
        bands: Vec<Band>,
    ) -> Self {
        Self {
            device_id,
            id,
            app_id: app_id.into(),
            unit,
            burst: false,
            bands,
            state: MeterState::PendingAdd,
            life: 0,
            reference_count: 0,
            packets_seen: 0,
            bytes_seen: 0,
        }
    }

    /// The replication key of this meter.
    pub fn key(&self) -> MeterKey {
        MeterKey::key(self.device_id.clone(), self.id)
    }
}

/// The replicated table value: a meter plus an optional failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterEntry {
    /// The meter description and state.
    pub meter: Meter,
    /// Failure reported for the last operation on this meter, if any.
    pub reason: Option<FailReason>,
}

impl MeterEntry {
    /// Wrap a meter with no failure recorded.
    pub fn of(meter: Meter) -> Self {
        Self {
            meter,
            reason: None,
        }
    }

    /// Wrap a meter with a failure reason attached.
    pub fn failed(meter: Meter, reason: FailReason) -> Self {
        Self {
            meter,
            reason: Some(reason),
        }
    }

    /// Check whether a failure is recorded on this entry.
    pub fn has_reason(&self) -> bool {
        self.reason.is_some()
    }
}
