use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

/// Counters for the sync pipeline.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Refetch requests accepted by the gate
    pub refetch_requests: u64,
    /// Refetch requests dropped for lack of an organization
    pub dropped_requests: u64,
    pub fetches_issued: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    /// Resolutions discarded because a newer fetch was already applied
    pub stale_resolutions: u64,
    pub push_events_received: u64,
    /// Push events without a usable model name
    pub push_events_dropped: u64,
    pub reconnect_attempts: u64,
}

/// Thread-safe wrapper for sync stats
#[derive(Debug, Clone, Default)]
pub struct SharedSyncStats {
    inner: Arc<RwLock<SyncStats>>,
}

impl SharedSyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, f: impl FnOnce(&mut SyncStats)) {
        f(&mut self.inner.write());
    }

    pub fn snapshot(&self) -> SyncStats {
        self.inner.read().clone()
    }
}
