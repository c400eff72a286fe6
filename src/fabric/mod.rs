//! In-process replication fabric.
//!
//! The meter store is written against three storage primitives:
//! - [`table::ReplicatedTable`] — keyed records with conditional writes and a
//!   per-key ordered change-event stream delivered to every subscriber
//! - [`set::ReplicatedSet`] — shared set with first-writer-wins removal
//! - [`counter::CounterMap`] — per-key counters with bounded atomic advance
//!
//! [`StorageFabric`] hands out named primitives backed by shared state: every
//! handle built from the same fabric under the same name observes the same
//! data and the same event stream, which is exactly the contract a clustered
//! deployment provides through its replication service. Store logic therefore
//! runs unchanged whether its peers live in this process (tests, single-node)
//! or behind a real cluster transport.
//!
//! The fabric guarantees the two properties the store's correctness rests on:
//! per-key event ordering (an update is never observed before the insert it
//! followed, on any subscriber) and race-free conditional removal from shared
//! sets (exactly one concurrent remover wins).

pub mod counter;
pub mod set;
pub mod table;

pub use counter::CounterMap;
pub use set::ReplicatedSet;
pub use table::{ReplicatedTable, TableEvent, TableListener};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pending write faults, shared by every primitive of one fabric.
///
/// Armed by tests to exercise the storage-failure paths; each armed fault
/// fails exactly one subsequent write with a Timeout.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    remaining: AtomicUsize,
}

impl FaultPlan {
    pub(crate) fn arm(&self, count: usize) {
        self.remaining.fetch_add(count, Ordering::SeqCst);
    }

    /// Consume one armed fault, if any.
    pub(crate) fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Builder and registry for named replication primitives.
///
/// A fabric models one cluster's storage service. Primitives are created on
/// first use and shared afterwards: two stores asking the same fabric for the
/// table `"metron-meters"` operate on the same replicated state.
pub struct StorageFabric {
    primitives: Mutex<HashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>>,
    faults: Arc<FaultPlan>,
}

impl StorageFabric {
    /// Create an empty fabric.
    pub fn new() -> Self {
        Self {
            primitives: Mutex::new(HashMap::new()),
            faults: Arc::new(FaultPlan::default()),
        }
    }

    /// Get or create the named replicated table.
    ///
    /// Key and value types must serialize deterministically; that is the
    /// replication contract even though the in-process fabric never leaves
    /// the address space.
    pub fn table<K, V>(&self, name: &str) -> ReplicatedTable<K, V>
    where
        K: Clone + Eq + std::hash::Hash + Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let core = self.primitive(name, || table::TableCore::new(name, self.faults.clone()));
        ReplicatedTable::from_core(core)
    }

    /// Get or create the named replicated set.
    pub fn set<T>(&self, name: &str) -> ReplicatedSet<T>
    where
        T: Clone + Eq + std::hash::Hash + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let core = self.primitive(name, || set::SetCore::new(name, self.faults.clone()));
        ReplicatedSet::from_core(core)
    }

    /// Get or create the named counter map.
    pub fn counter_map<K>(&self, name: &str) -> CounterMap<K>
    where
        K: Clone + Eq + std::hash::Hash + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let core = self.primitive(name, || counter::CounterCore::new(name, self.faults.clone()));
        CounterMap::from_core(core)
    }

    /// Arm `count` write faults: the next `count` mutating operations on any
    /// primitive of this fabric fail with a storage Timeout. Test hook.
    pub fn fail_next_writes(&self, count: usize) {
        self.faults.arm(count);
    }

    fn primitive<P: Send + Sync + 'static>(&self, name: &str, build: impl FnOnce() -> P) -> Arc<P> {
        let key = (TypeId::of::<P>(), name.to_string());
        let mut primitives = self.primitives.lock();
        let entry = primitives
            .entry(key)
            .or_insert_with(|| Arc::new(build()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<P>()
            .unwrap_or_else(|_| unreachable!("primitive registry keyed by TypeId"))
    }
}

impl Default for StorageFabric {
    fn default() -> Self {
        Self::new()
    }
}
