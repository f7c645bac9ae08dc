use std::sync::Arc;

use serde::Serialize;

use crate::models::{FilterState, Snapshot};
use crate::store::FilterStats;

/// Loading phase of the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewPhase {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// First fetch requested, not settled.
    InitialLoading,
    /// Data settled, nothing pending.
    Stable,
    /// A later refetch is pending or in flight.
    Updating,
}

/// Tracks the initial-load and incremental-update flags.
#[derive(Debug, Default)]
pub struct ViewStateController {
    phase: ViewPhase,
}

impl ViewStateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn on_request_accepted(&mut self) {
        self.phase = match self.phase {
            ViewPhase::Idle | ViewPhase::InitialLoading => ViewPhase::InitialLoading,
            ViewPhase::Stable | ViewPhase::Updating => ViewPhase::Updating,
        };
    }

    /// A fetch settled, successfully or not. `still_busy` is true while
    /// another request is armed or in flight.
    pub fn on_settled(&mut self, still_busy: bool) {
        self.phase = if still_busy {
            ViewPhase::Updating
        } else {
            ViewPhase::Stable
        };
    }

    /// Requests were cancelled before any settled.
    pub fn on_cancelled(&mut self) {
        self.phase = match self.phase {
            ViewPhase::Idle | ViewPhase::InitialLoading => ViewPhase::Idle,
            ViewPhase::Stable | ViewPhase::Updating => ViewPhase::Stable,
        };
    }

    pub fn is_initial_loading(&self) -> bool {
        matches!(self.phase, ViewPhase::Idle | ViewPhase::InitialLoading)
    }

    pub fn is_updating(&self) -> bool {
        self.phase == ViewPhase::Updating
    }
}

/// What presentation layers consume.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub filtered_view: Arc<Snapshot>,
    pub is_initial_loading: bool,
    pub is_updating: bool,
    pub filter_stats: FilterStats,
    pub phase: ViewPhase,
    pub snapshot_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_model: Option<String>,
    /// Unfiltered snapshot the view was derived from.
    #[serde(skip)]
    pub snapshot: Arc<Snapshot>,
    #[serde(skip)]
    pub filters: FilterState,
}
