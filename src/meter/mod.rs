//! The meter store domain.
//!
//! This module contains:
//! - [`key`] - device, meter, and table key types
//! - [`record`] - meter records, bands, and lifecycle state
//! - [`features`] - per-device capabilities and the query fallback
//! - [`handle`] - completion handles and the pending-operation table
//! - [`allocator`] - per-device identifier allocation with reuse
//! - [`events`] - lifecycle notifications and the delegate seam
//! - [`store`] - the store API tying the pieces together
//!
//! # Request lifecycle
//!
//! A store request writes a PendingAdd record and returns a handle. Every
//! node's listener observes the insert and notifies its delegate; whichever
//! node masters the device programs it and reports back through
//! `update_meter_state` or `mark_failed`. That write's change event travels
//! back to the requesting node, whose listener resolves the handle.

pub mod allocator;
pub mod events;
pub mod features;
pub mod handle;
pub mod key;
mod listener;
pub mod record;
pub mod store;
