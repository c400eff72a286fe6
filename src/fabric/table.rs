//! Replicated table with per-key ordered change events.
//!
//! Every mutation produces exactly one [`TableEvent`] delivered to every
//! subscribed listener, on every handle of the same named table. Events are
//! enqueued under the entry lock and drained by a single dispatcher at a
//! time, so the delivery order equals the mutation order — in particular an
//! update is never observed before the insert it followed.
//!
//! Listeners may mutate the table from inside a callback; the resulting
//! events are appended to the queue and delivered after the current one.

use crate::core::error::{StorageError, StorageResult};
use crate::fabric::FaultPlan;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// A change observed on a replicated table.
#[derive(Debug, Clone)]
pub enum TableEvent<K, V> {
    /// A key was inserted.
    Insert { key: K, value: V },
    /// An existing key was replaced.
    Update { key: K, old: V, new: V },
    /// A key was removed; carries the last value it held.
    Remove { key: K, old: V },
}

impl<K, V> TableEvent<K, V> {
    /// The key this event concerns.
    pub fn key(&self) -> &K {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Remove { key, .. } => key,
        }
    }

    /// The value as of this event: the new value for inserts and updates,
    /// the removed value for removals.
    pub fn value(&self) -> &V {
        match self {
            Self::Insert { value, .. } => value,
            Self::Update { new, .. } => new,
            Self::Remove { old, .. } => old,
        }
    }

    /// The value the key held before this event, if any.
    pub fn old_value(&self) -> Option<&V> {
        match self {
            Self::Insert { .. } => None,
            Self::Update { old, .. } | Self::Remove { old, .. } => Some(old),
        }
    }
}

/// Receives change events from a replicated table.
pub trait TableListener<K, V>: Send + Sync {
    fn on_event(&self, event: &TableEvent<K, V>);
}

struct EventQueue<K, V> {
    events: VecDeque<TableEvent<K, V>>,
    dispatching: bool,
}

pub(crate) struct TableCore<K, V> {
    name: String,
    entries: Mutex<HashMap<K, V>>,
    listeners: RwLock<Vec<Arc<dyn TableListener<K, V>>>>,
    queue: Mutex<EventQueue<K, V>>,
    faults: Arc<FaultPlan>,
}

impl<K, V> TableCore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub(crate) fn new(name: &str, faults: Arc<FaultPlan>) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            queue: Mutex::new(EventQueue {
                events: VecDeque::new(),
                dispatching: false,
            }),
            faults,
        }
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.faults.try_consume() {
            return Err(StorageError::timeout(self.name.clone()));
        }
        Ok(())
    }

    /// Enqueue while the entry lock is held so queue order equals mutation
    /// order, then deliver after the lock is released.
    fn enqueue(&self, event: TableEvent<K, V>) {
        self.queue.lock().events.push_back(event);
    }

    fn drain(&self) {
        let mut queue = self.queue.lock();
        if queue.dispatching {
            // Another dispatcher is active and will pick this event up.
            return;
        }
        queue.dispatching = true;
        while let Some(event) = queue.events.pop_front() {
            let listeners: Vec<_> = self.listeners.read().clone();
            drop(queue);
            for listener in &listeners {
                listener.on_event(&event);
            }
            queue = self.queue.lock();
        }
        queue.dispatching = false;
    }
}

/// Handle to a named replicated table.
///
/// Clones and handles obtained from the same fabric under the same name all
/// share state and event stream.
pub struct ReplicatedTable<K, V> {
    core: Arc<TableCore<K, V>>,
}

impl<K, V> Clone for ReplicatedTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> ReplicatedTable<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub(crate) fn from_core(core: Arc<TableCore<K, V>>) -> Self {
        Self { core }
    }

    /// The name this table was built under.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current value for a key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.core.entries.lock().get(key).cloned()
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.core.entries.lock().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.core.entries.lock().len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.core.entries.lock().is_empty()
    }

    /// Clone out all entries.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.core
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Insert or replace; returns the previous value.
    pub fn put(&self, key: K, value: V) -> StorageResult<Option<V>> {
        self.core.check_write()?;
        let mut entries = self.core.entries.lock();
        let old = entries.insert(key.clone(), value.clone());
        let event = match &old {
            Some(old) => TableEvent::Update {
                key,
                old: old.clone(),
                new: value,
            },
            None => TableEvent::Insert { key, value },
        };
        self.core.enqueue(event);
        drop(entries);
        self.core.drain();
        Ok(old)
    }

    /// Insert only if the key is absent; returns the existing value
    /// otherwise. No event is emitted when the key was already present.
    pub fn put_if_absent(&self, key: K, value: V) -> StorageResult<Option<V>> {
        self.core.check_write()?;
        let mut entries = self.core.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return Ok(Some(existing.clone()));
        }
        entries.insert(key.clone(), value.clone());
        self.core.enqueue(TableEvent::Insert { key, value });
        drop(entries);
        self.core.drain();
        Ok(None)
    }

    /// Replace the value for a key only if it is currently present.
    ///
    /// Returns the new value, or `None` when the key was absent (the closure
    /// is not called in that case). A delete racing a purge cannot resurrect
    /// the entry through this primitive.
    pub fn compute_if_present(
        &self,
        key: &K,
        f: impl FnOnce(&V) -> V,
    ) -> StorageResult<Option<V>> {
        self.core.check_write()?;
        let mut entries = self.core.entries.lock();
        let Some(current) = entries.get(key) else {
            return Ok(None);
        };
        let old = current.clone();
        let new = f(current);
        entries.insert(key.clone(), new.clone());
        self.core.enqueue(TableEvent::Update {
            key: key.clone(),
            old,
            new: new.clone(),
        });
        drop(entries);
        self.core.drain();
        Ok(Some(new))
    }

    /// Remove a key; returns the value it held.
    pub fn remove(&self, key: &K) -> StorageResult<Option<V>> {
        self.core.check_write()?;
        let mut entries = self.core.entries.lock();
        let old = entries.remove(key);
        if let Some(old_value) = &old {
            self.core.enqueue(TableEvent::Remove {
                key: key.clone(),
                old: old_value.clone(),
            });
        }
        drop(entries);
        self.core.drain();
        Ok(old)
    }

    /// Subscribe a listener to this table's change stream.
    pub fn subscribe(&self, listener: Arc<dyn TableListener<K, V>>) {
        self.core.listeners.write().push(listener);
    }

    /// Remove a previously subscribed listener.
    pub fn unsubscribe(&self, listener: &Arc<dyn TableListener<K, V>>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.core
            .listeners
            .write()
            .retain(|l| Arc::as_ptr(l) as *const () != target);
    }
}
