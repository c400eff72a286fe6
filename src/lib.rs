//! Metron - distributed per-device meter store.
//!
//! Metron is the metering subsystem of a network control platform: it
//! allocates scarce per-device meter (rate-limiter) identifiers, replicates
//! meter records across a cluster of controller nodes, and bridges
//! synchronous store/delete requests with the asynchronous, hardware-driven
//! acknowledgements that complete them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Resource-management applications               │
//! └─────────────────────────────────────────────────────────────────┘
//!                │ store/delete → CompletionHandle
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          MeterStore                             │
//! │   IdAllocator │ PendingTable │ ResolutionListener │ Capabilities │
//! └─────────────────────────────────────────────────────────────────┘
//!                │ conditional writes        ▲ per-key ordered events
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Storage fabric                           │
//! │       ReplicatedTable │ ReplicatedSet │ CounterMap              │
//! └─────────────────────────────────────────────────────────────────┘
//!                │ lifecycle notifications (delegate)
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Device-programming subsystem (external)            │
//! │    acts on AddRequested/RemoveRequested, reports acks back      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - configuration parsing and validation
//! - [`core::error`] - error types and the failure taxonomy
//! - [`core::runtime`] - node lifecycle orchestration
//!
//! ## Storage fabric
//! - [`fabric::table`] - replicated table with per-key ordered events
//! - [`fabric::set`] - replicated set with first-writer-wins removal
//! - [`fabric::counter`] - per-key counters with bounded advance
//!
//! ## Meter store
//! - [`meter::store`] - the store API
//! - [`meter::allocator`] - identifier allocation with reuse
//! - [`meter::handle`] - completion handles
//! - [`meter::record`] - meter records and lifecycle state
//! - [`meter::features`] - per-device capabilities
//! - [`meter::events`] - lifecycle notifications
//!
//! ## Operations
//! - [`ops::observability`] - store metrics
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - At most one live record per meter key
//! - No id at or above a device's capability ceiling is ever minted
//! - An id is never both free and referenced by a live record
//! - Every completion handle resolves exactly once, then is evicted
//! - Change events are delivered in per-key order on every node

// Core infrastructure
pub mod core;

// Replication primitives
pub mod fabric;

// Meter store domain
pub mod meter;

// Operations and observability
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime};
pub use meter::{allocator, events, features, handle, key, record, store};
pub use ops::observability;
