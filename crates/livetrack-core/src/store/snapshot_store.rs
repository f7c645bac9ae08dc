use std::sync::Arc;

use super::merge::{merge, MergeRule};
use crate::models::Snapshot;

/// Result of offering a fetched snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot changed; carries the merge rule that applied.
    Applied(MergeRule),
    /// The response matched nothing and the previous snapshot was kept.
    Retained,
    /// A newer fetch already settled; the response was discarded.
    Stale,
}

/// Owner of the held snapshot. `apply` is the only mutation path.
///
/// Every fetch carries a monotonically increasing sequence number. A
/// resolution whose sequence is not newer than the last settled one is
/// discarded, so a slow response can never overwrite newer state. Fetches
/// that settle without data (errors, empty responses) still count as
/// settled.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Arc<Snapshot>,
    version: u64,
    settled_through: Option<u64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Arc<Snapshot> {
        &self.current
    }

    /// Bumped on every change of the held snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_stale(&self, seq: u64) -> bool {
        self.settled_through.is_some_and(|last| seq <= last)
    }

    /// Record that fetch `seq` settled without touching the snapshot. Older
    /// fetches become stale.
    pub fn mark_settled(&mut self, seq: u64) {
        self.settled_through = Some(self.settled_through.map_or(seq, |last| last.max(seq)));
    }

    pub fn apply(&mut self, seq: u64, incoming: Snapshot, active_model: Option<&str>) -> ApplyOutcome {
        if self.is_stale(seq) {
            return ApplyOutcome::Stale;
        }
        self.mark_settled(seq);

        let outcome = merge(&self.current, incoming, active_model);
        if outcome.rule == MergeRule::Unmatched {
            return ApplyOutcome::Retained;
        }

        self.current = Arc::new(outcome.snapshot);
        self.version += 1;
        ApplyOutcome::Applied(outcome.rule)
    }

    /// Drop the held snapshot (teardown).
    pub fn clear(&mut self) {
        self.current = Arc::new(Snapshot::new());
        self.version += 1;
        self.settled_through = None;
    }
}
