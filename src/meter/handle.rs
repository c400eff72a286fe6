//! Completion handles for asynchronous store operations.
//!
//! Store and delete requests return immediately with a [`CompletionHandle`];
//! the outcome arrives later, when the device acknowledgement propagates back
//! through the replicated table and the resolution listener fires. Handles
//! live in a process-local [`PendingTable`] on the node that issued the
//! request — resolution elsewhere in the cluster has no local handle to
//! complete and only forwards lifecycle notifications.
//!
//! Each handle is resolved exactly once and evicted from the table in the
//! same step; duplicate terminal events find no handle and are no-ops.

use crate::core::error::FailReason;
use crate::meter::key::MeterKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outcome of a meter store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreResult {
    /// The operation completed.
    Success,
    /// The operation failed for the given reason.
    Fail(FailReason),
}

impl StoreResult {
    /// A successful result.
    pub fn success() -> Self {
        Self::Success
    }

    /// A failed result.
    pub fn fail(reason: FailReason) -> Self {
        Self::Fail(reason)
    }

    /// Check whether this result is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure reason, if this result is a failure.
    pub fn reason(&self) -> Option<FailReason> {
        match self {
            Self::Success => None,
            Self::Fail(reason) => Some(*reason),
        }
    }
}

/// A caller-visible handle resolved exactly once with a [`StoreResult`].
///
/// The store never blocks a caller; any waiting happens against the handle.
/// Deadlines are the caller's responsibility — an abandoned handle simply
/// never observes its outcome.
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<StoreResult>,
}

impl CompletionHandle {
    /// A handle that is already resolved.
    pub fn ready(result: StoreResult) -> Self {
        let (tx, rx) = oneshot::channel();
        // Receiver is held right here; the send cannot fail.
        let _ = tx.send(result);
        Self { rx }
    }

    /// Poll for the result without blocking.
    ///
    /// Returns `None` while the operation is still in flight. A handle whose
    /// store side vanished unresolved reads as `Fail(Unknown)`.
    pub fn try_result(&mut self) -> Option<StoreResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(StoreResult::fail(FailReason::Unknown))
            }
        }
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from async context; use [`resolved`] there.
    ///
    /// [`resolved`]: Self::resolved
    pub fn blocking_wait(self) -> StoreResult {
        self.rx
            .blocking_recv()
            .unwrap_or(StoreResult::Fail(FailReason::Unknown))
    }

    /// Await the result.
    pub async fn resolved(self) -> StoreResult {
        self.rx
            .await
            .unwrap_or(StoreResult::Fail(FailReason::Unknown))
    }
}

/// Process-local table of unresolved completion handles.
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<MeterKey, oneshot::Sender<StoreResult>>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handle for a key.
    ///
    /// Returns `None` when an operation on the key is already in flight —
    /// the caller is expected to reject the new request rather than replace
    /// (and thereby orphan) the existing handle.
    pub(crate) fn register(&self, key: MeterKey) -> Option<CompletionHandle> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(key, tx);
        Some(CompletionHandle { rx })
    }

    /// Resolve and evict the handle for a key, if this node owns one.
    ///
    /// Returns `true` when a handle was resolved. Eviction and resolution
    /// are one step, so a second terminal event for the same key is a no-op.
    pub(crate) fn resolve(&self, key: &MeterKey, result: StoreResult) -> bool {
        let Some(tx) = self.entries.lock().remove(key) else {
            return false;
        };
        // The receiver may have been dropped by an abandoning caller.
        let _ = tx.send(result);
        true
    }

    /// Number of unresolved handles.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
