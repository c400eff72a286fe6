//! Operations and observability.
//!
//! - [`observability`] - store metrics and snapshots

pub mod observability;
