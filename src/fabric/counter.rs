//! Per-key counters with bounded atomic advance.
//!
//! [`CounterMap::increment_if_below`] is the minting primitive: it advances
//! a counter only when the pre-increment value is under the given ceiling,
//! so a denied mint leaves the counter exactly where it was and no identifier
//! space is wasted above a device's capacity.

use crate::core::error::{StorageError, StorageResult};
use crate::fabric::FaultPlan;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

pub(crate) struct CounterCore<K> {
    name: String,
    counters: Mutex<HashMap<K, u64>>,
    faults: Arc<FaultPlan>,
}

impl<K> CounterCore<K> {
    pub(crate) fn new(name: &str, faults: Arc<FaultPlan>) -> Self {
        Self {
            name: name.to_string(),
            counters: Mutex::new(HashMap::new()),
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

/// Handle to a named map of replicated counters.
pub struct CounterMap<K> {
    core: Arc<CounterCore<K>>,
}

impl<K> Clone for CounterMap<K> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K> CounterMap<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    pub(crate) fn from_core(core: Arc<CounterCore<K>>) -> Self {
        Self { core }
    }

    /// The name this counter map was built under.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current value for a key; absent keys read as zero.
    pub fn get(&self, key: &K) -> u64 {
        self.core.counters.lock().get(key).copied().unwrap_or(0)
    }

    /// Atomically advance the counter for `key` and return its pre-increment
    /// value, but only when that value is below `ceiling`. Returns `None` —
    /// with the counter untouched — otherwise.
    pub fn increment_if_below(&self, key: &K, ceiling: u64) -> StorageResult<Option<u64>> {
        self.core.check_write()?;
        let mut counters = self.core.counters.lock();
        let current = counters.entry(key.clone()).or_insert(0);
        if *current >= ceiling {
            return Ok(None);
        }
        let minted = *current;
        *current += 1;
        Ok(Some(minted))
    }

    /// Drop the counter for a key; returns the value it held.
    pub fn clear(&self, key: &K) -> StorageResult<u64> {
        self.core.check_write()?;
        Ok(self.core.counters.lock().remove(key).unwrap_or(0))
    }

    /// Number of keys with counter state.
    pub fn len(&self) -> usize {
        self.core.counters.lock().len()
    }

    /// Check whether no key has counter state.
    pub fn is_empty(&self) -> bool {
        self.core.counters.lock().is_empty()
    }
}
