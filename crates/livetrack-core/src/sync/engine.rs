use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::changes::ChangeTracker;
use super::gate::{DebounceGate, GateDecision, RefetchTrigger};
use super::view_state::{ViewModel, ViewStateController};
use crate::fetch::{CacheStamp, FetchError, StatisticsQuery};
use crate::models::{ChangeNotification, FetchResponse, FilterState, Snapshot};
use crate::stats::SharedSyncStats;
use crate::store::{compute_view, ApplyOutcome, FilterStats, MergeRule, SnapshotStore};

/// A fetch the caller must perform and hand back to [`SyncEngine::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub request_id: Uuid,
    pub query: StatisticsQuery,
    pub active_model: Option<String>,
}

/// How a settled fetch affected the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Applied(MergeRule),
    /// Nothing in the response matched the active model.
    Retained,
    /// The response carried no `data` object.
    Empty,
    /// A newer fetch already settled.
    Stale,
    Failed(FetchError),
    /// The ticket was cancelled before it settled.
    Cancelled,
}

/// What a filter update caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterUpdate {
    Unchanged,
    /// Only client-side filters changed; the view was recomputed.
    ViewOnly,
    Refetch(GateDecision),
}

/// Synchronous core of the tracker.
///
/// Owns the filter state, the snapshot store, the debounce gate and the view
/// state. Time is passed in explicitly; the caller drives it by sleeping
/// until [`next_deadline`](Self::next_deadline), taking the due fetch with
/// [`poll_fetch`](Self::poll_fetch) and reporting its result through
/// [`settle`](Self::settle).
pub struct SyncEngine {
    filters: FilterState,
    store: SnapshotStore,
    view: Arc<Snapshot>,
    filter_stats: FilterStats,
    gate: DebounceGate,
    controller: ViewStateController,
    changes: ChangeTracker,
    stamp: CacheStamp,
    next_seq: u64,
    in_flight: BTreeMap<u64, Option<String>>,
    last_error: Option<String>,
    stats: SharedSyncStats,
    revision: u64,
}

impl SyncEngine {
    pub fn new(window: Duration, filters: FilterState, stats: SharedSyncStats) -> Self {
        let mut engine = Self {
            filters,
            store: SnapshotStore::new(),
            view: Arc::new(Snapshot::new()),
            filter_stats: FilterStats::default(),
            gate: DebounceGate::new(window),
            controller: ViewStateController::new(),
            changes: ChangeTracker::new(),
            stamp: CacheStamp::new(),
            next_seq: 1,
            in_flight: BTreeMap::new(),
            last_error: None,
            stats,
            revision: 0,
        };
        engine.recompute_view();
        engine
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        self.store.current()
    }

    pub fn view(&self) -> &Arc<Snapshot> {
        &self.view
    }

    /// Bumped whenever anything in the published view model changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Request the first full load.
    pub fn start(&mut self, now: Instant) -> GateDecision {
        self.request_refetch(RefetchTrigger::Initial, now)
    }

    /// Take a new filter form state.
    ///
    /// `changed_model_name` is owned by the engine and ignored on input; it
    /// is cleared when any field sent to the endpoint changes.
    pub fn update_filters(&mut self, mut incoming: FilterState, now: Instant) -> FilterUpdate {
        let refetch = incoming.fetch_inputs_differ(&self.filters);
        incoming.changed_model_name = if refetch {
            None
        } else {
            self.filters.changed_model_name.clone()
        };

        if incoming == self.filters {
            return FilterUpdate::Unchanged;
        }

        self.filters = incoming;
        self.recompute_view();
        self.revision += 1;

        if refetch {
            FilterUpdate::Refetch(self.request_refetch(RefetchTrigger::FilterChange, now))
        } else {
            tracing::debug!("Client-side filters changed, view recomputed");
            FilterUpdate::ViewOnly
        }
    }

    /// Handle a push notification naming a changed model.
    pub fn notify(&mut self, notification: ChangeNotification, now: Instant) -> GateDecision {
        let change = self.changes.observe(notification);
        if change.repeated {
            // Same model twice in a row; make the next query differ
            let stamp = self.stamp.bump();
            tracing::debug!(model = %change.model_name, stamp, "Repeated model change");
        }

        self.filters.changed_model_name = Some(change.model_name.clone());
        self.revision += 1;
        self.request_refetch(RefetchTrigger::ModelChange(change.model_name), now)
    }

    /// Force a full refetch with the current filters.
    pub fn refresh(&mut self, now: Instant) -> GateDecision {
        self.stamp.bump();
        self.request_refetch(RefetchTrigger::Refresh, now)
    }

    pub fn request_refetch(&mut self, trigger: RefetchTrigger, now: Instant) -> GateDecision {
        let query = StatisticsQuery::from_filters(&self.filters, self.stamp.current());
        let decision = self.gate.request(query, trigger.clone(), now);

        match decision {
            GateDecision::Armed { .. } => {
                self.stats.update(|s| s.refetch_requests += 1);
                self.controller.on_request_accepted();
                tracing::debug!(?trigger, "Refetch requested");
            }
            GateDecision::Dropped => {
                self.stats.update(|s| s.dropped_requests += 1);
                if self.in_flight.is_empty() {
                    self.controller.on_cancelled();
                }
                tracing::debug!(?trigger, "Refetch dropped, no organization selected");
            }
        }
        self.revision += 1;
        decision
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.gate.deadline()
    }

    /// Release the fetch whose debounce window has settled.
    ///
    /// A model-scoped fetch issued while a full refresh is still in flight
    /// is widened to a full refresh, since it would otherwise supersede the
    /// older one and merge onto the snapshot of superseded filters.
    pub fn poll_fetch(&mut self, now: Instant) -> Option<FetchTicket> {
        let mut pending = self.gate.take_due(now)?;
        if !pending.is_full_refresh() && self.full_refresh_in_flight() {
            tracing::debug!(
                model = pending.active_model.as_deref().unwrap_or("-"),
                "Full refresh in flight, widening model fetch"
            );
            pending = pending.into_full_refresh();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq, pending.active_model.clone());
        self.stats.update(|s| s.fetches_issued += 1);

        let ticket = FetchTicket {
            seq,
            request_id: Uuid::new_v4(),
            query: pending.query,
            active_model: pending.active_model,
        };
        tracing::info!(
            seq,
            request_id = %ticket.request_id,
            model = ticket.active_model.as_deref().unwrap_or("-"),
            "Fetching statistics"
        );
        Some(ticket)
    }

    pub fn settle(&mut self, seq: u64, result: Result<FetchResponse, FetchError>) -> Settlement {
        let Some(active_model) = self.in_flight.remove(&seq) else {
            tracing::debug!(seq, "Ignoring settlement of cancelled fetch");
            return Settlement::Cancelled;
        };

        let settlement = if self.store.is_stale(seq) {
            self.stats.update(|s| s.stale_resolutions += 1);
            tracing::debug!(seq, "Discarding stale resolution");
            Settlement::Stale
        } else {
            match result {
                Ok(response) => {
                    self.stats.update(|s| s.fetches_succeeded += 1);
                    self.last_error = None;
                    self.apply_response(seq, response, active_model.as_deref())
                }
                Err(error) => {
                    self.store.mark_settled(seq);
                    self.stats.update(|s| s.fetches_failed += 1);
                    tracing::error!(seq, error = %error, "Statistics fetch failed");
                    self.last_error = Some(error.to_string());
                    Settlement::Failed(error)
                }
            }
        };

        self.controller.on_settled(self.is_busy());
        self.revision += 1;
        settlement
    }

    fn apply_response(&mut self, seq: u64, response: FetchResponse, active_model: Option<&str>) -> Settlement {
        let Some(incoming) = response.into_snapshot() else {
            tracing::warn!(seq, "Response carried no data");
            self.store.mark_settled(seq);
            return Settlement::Empty;
        };

        match self.store.apply(seq, incoming, active_model) {
            ApplyOutcome::Applied(rule) => {
                tracing::debug!(seq, ?rule, version = self.store.version(), "Snapshot updated");
                self.recompute_view();
                Settlement::Applied(rule)
            }
            ApplyOutcome::Retained => {
                tracing::warn!(
                    seq,
                    model = active_model.unwrap_or("-"),
                    "No collection matched the active model, keeping previous snapshot"
                );
                Settlement::Retained
            }
            ApplyOutcome::Stale => Settlement::Stale,
        }
    }

    fn full_refresh_in_flight(&self) -> bool {
        self.in_flight.values().any(Option::is_none)
    }

    fn is_busy(&self) -> bool {
        self.gate.is_armed() || !self.in_flight.is_empty()
    }

    /// Disarm the gate and forget every in-flight fetch.
    pub fn cancel(&mut self) {
        self.gate.disarm();
        self.in_flight.clear();
        self.controller.on_cancelled();
        self.revision += 1;
    }

    /// Cancel everything and drop the held snapshot.
    pub fn teardown(&mut self) {
        self.cancel();
        self.store.clear();
        self.changes.reset();
        self.recompute_view();
    }

    fn recompute_view(&mut self) {
        let snapshot = self.store.current();
        self.view = compute_view(snapshot, &self.filters);
        self.filter_stats = FilterStats::compute(snapshot, &self.view, &self.filters);
    }

    pub fn view_model(&self) -> ViewModel {
        ViewModel {
            filtered_view: self.view.clone(),
            is_initial_loading: self.controller.is_initial_loading(),
            is_updating: self.controller.is_updating(),
            filter_stats: self.filter_stats.clone(),
            phase: self.controller.phase(),
            snapshot_version: self.store.version(),
            last_error: self.last_error.clone(),
            active_model: self.changes.last_model().map(str::to_string),
            snapshot: self.store.current().clone(),
            filters: self.filters.clone(),
        }
    }
}
