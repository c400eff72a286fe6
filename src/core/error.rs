//! Error types for the meter store.
//!
//! Two layers of failure exist and never mix:
//! - [`StorageError`] — synchronous faults raised by the replication fabric
//!   while a write is being issued. These are caught at the call site and
//!   turned into a failed store result; they never propagate as panics.
//! - [`FailReason`] — the meter failure taxonomy. Reasons travel inside the
//!   replicated record so that the node owning the pending handle can observe
//!   them, and they are the payload of every failed completion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the replication fabric.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The fabric did not acknowledge a write in time.
    #[error("storage operation timed out on {primitive}")]
    Timeout { primitive: String },

    /// The fabric rejected an operation outright.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

impl StorageError {
    /// Create a Timeout error for the named primitive.
    pub fn timeout(primitive: impl Into<String>) -> Self {
        Self::Timeout {
            primitive: primitive.into(),
        }
    }

    /// Create an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Check if this error indicates the operation may be retried.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for fabric operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Why a meter operation failed.
///
/// Most reasons originate from the device acknowledgement path and are
/// written into the replicated record by [`mark_failed`]; `Timeout` is
/// reserved for storage-layer faults encountered while issuing a write, and
/// `Busy` for a request racing an in-flight operation on the same key.
///
/// [`mark_failed`]: crate::meter::store::MeterStore::mark_failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailReason {
    /// The reason was not reported.
    Unknown,
    /// The referenced meter does not exist or carries an invalid index.
    InvalidMeter,
    /// The device is not known to the platform.
    UnknownDevice,
    /// The device has no meter cells left.
    OutOfMeters,
    /// The meter requested more bands than the device supports.
    OutOfBands,
    /// A band carried a rate or burst the device rejected.
    BadBand,
    /// Another operation on the same meter key is still in flight.
    Busy,
    /// The storage layer failed while issuing the write.
    Timeout,
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::InvalidMeter => write!(f, "InvalidMeter"),
            Self::UnknownDevice => write!(f, "UnknownDevice"),
            Self::OutOfMeters => write!(f, "OutOfMeters"),
            Self::OutOfBands => write!(f, "OutOfBands"),
            Self::BadBand => write!(f, "BadBand"),
            Self::Busy => write!(f, "Busy"),
            Self::Timeout => write!(f, "Timeout"),
        }
    }
}

impl FailReason {
    /// Check if this reason was produced by the store itself rather than
    /// reported by a device.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Busy | Self::Timeout | Self::InvalidMeter)
    }
}

impl From<&StorageError> for FailReason {
    fn from(_: &StorageError) -> Self {
        FailReason::Timeout
    }
}
