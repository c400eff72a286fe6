//! Replicated set with first-writer-wins removal.
//!
//! The meter-id allocator leans on one property here: when several nodes
//! race to remove the same element, exactly one `remove` returns `true`.
//! The shared lock makes that trivially so in process; a clustered backend
//! provides the same guarantee through its consensus layer.

use crate::core::error::{StorageError, StorageResult};
use crate::fabric::FaultPlan;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

pub(crate) struct SetCore<T> {
    name: String,
    entries: Mutex<HashSet<T>>,
    faults: Arc<FaultPlan>,
}

impl<T> SetCore<T> {
    pub(crate) fn new(name: &str, faults: Arc<FaultPlan>) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(HashSet::new()),
            faults,
        }
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.faults.try_consume() {
            return Err(StorageError::timeout(self.name.clone()));
        }
        Ok(())
    }
}

/// Handle to a named replicated set.
pub struct ReplicatedSet<T> {
    core: Arc<SetCore<T>>,
}

impl<T> Clone for ReplicatedSet<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> ReplicatedSet<T>
where
    T: Clone + Eq + Hash + Send + Sync,
{
    pub(crate) fn from_core(core: Arc<SetCore<T>>) -> Self {
        Self { core }
    }

    /// The name this set was built under.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Insert an element; `true` if it was not already present.
    pub fn add(&self, value: T) -> StorageResult<bool> {
        self.core.check_write()?;
        Ok(self.core.entries.lock().insert(value))
    }

    /// Remove an element; `true` for exactly one of any set of concurrent
    /// removers.
    pub fn remove(&self, value: &T) -> StorageResult<bool> {
        self.core.check_write()?;
        Ok(self.core.entries.lock().remove(value))
    }

    /// Check membership.
    pub fn contains(&self, value: &T) -> bool {
        self.core.entries.lock().contains(value)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.core.entries.lock().len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.core.entries.lock().is_empty()
    }

    /// Clone out all elements.
    pub fn snapshot(&self) -> Vec<T> {
        self.core.entries.lock().iter().cloned().collect()
    }
}
