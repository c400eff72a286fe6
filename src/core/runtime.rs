//! Runtime orchestration.
//!
//! The runtime wires the components explicitly — fabric, store, delegate —
//! and drives their lifecycle:
//! - Start order: fabric primitives → store listener → delegate
//! - Shutdown order: delegate → store listener
//!
//! There is no container doing the wiring; construction is the wiring.

use crate::core::config::Config;
use crate::fabric::StorageFabric;
use crate::meter::events::{MeterEvent, MeterStoreDelegate};
use crate::meter::features::MeterCapabilitySource;
use crate::meter::store::MeterStore;
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// Component health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Component is starting.
    Starting,
    /// Component is healthy and operational.
    Healthy,
    /// Component is stopping.
    Stopping,
    /// Component has stopped.
    Stopped,
}

/// A single Metron node: configuration, fabric, and store.
pub struct MetronRuntime {
    config: Config,
    fabric: StorageFabric,
    store: Arc<MeterStore>,
    health: RwLock<ComponentHealth>,
}

impl MetronRuntime {
    /// Build a node from its configuration.
    ///
    /// `capability_source` is the optional slow-path collaborator consulted
    /// when a device's capability record is missing.
    pub fn new(
        config: Config,
        capability_source: Option<Arc<dyn MeterCapabilitySource>>,
    ) -> Result<Self> {
        config.validate()?;
        let strategy = config.allocator.strategy()?;
        let fabric = StorageFabric::new();
        let store = Arc::new(MeterStore::new(
            &fabric,
            strategy,
            config.allocator.rng_seed,
            capability_source,
        ));
        Ok(Self {
            config,
            fabric,
            store,
            health: RwLock::new(ComponentHealth::Starting),
        })
    }

    /// Start the node: subscribe the store to the change stream and install
    /// the default logging delegate if none was set by the embedder.
    pub fn start(&self) {
        tracing::info!(
            node = %self.config.node.id,
            strategy = %self.config.allocator.reuse_strategy,
            "starting metron node"
        );
        self.store.start();
        if !self.store.has_delegate() {
            self.store.set_delegate(Arc::new(LoggingDelegate));
        }
        *self.health.write() = ComponentHealth::Healthy;
        tracing::info!("metron node started");
    }

    /// Stop the node.
    pub fn shutdown(&self) {
        *self.health.write() = ComponentHealth::Stopping;
        self.store.unset_delegate();
        self.store.stop();
        *self.health.write() = ComponentHealth::Stopped;
        tracing::info!(node = %self.config.node.id, "metron node stopped");
    }

    /// The node's meter store.
    pub fn store(&self) -> &Arc<MeterStore> {
        &self.store
    }

    /// The node's storage fabric.
    pub fn fabric(&self) -> &StorageFabric {
        &self.fabric
    }

    /// The node's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current health.
    pub fn health(&self) -> ComponentHealth {
        *self.health.read()
    }

    /// Check if the node is serving.
    pub fn is_ready(&self) -> bool {
        self.health() == ComponentHealth::Healthy
    }
}

/// Default delegate: logs lifecycle notifications.
///
/// A deployment embeds the store and sets the device-programming subsystem
/// as the delegate instead.
struct LoggingDelegate;

impl MeterStoreDelegate for LoggingDelegate {
    fn notify(&self, event: MeterEvent) {
        tracing::debug!(
            event = ?event.event_type,
            key = %event.meter.key(),
            state = ?event.meter.state,
            "meter lifecycle event"
        );
    }
}
