use std::time::{Duration, Instant};

use crate::fetch::StatisticsQuery;

/// Why a refetch was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefetchTrigger {
    /// First load after start.
    Initial,
    /// A filter sent to the endpoint changed.
    FilterChange,
    /// Forced refresh without any filter change.
    Refresh,
    /// The push channel reported a change of this model.
    ModelChange(String),
}

impl RefetchTrigger {
    /// Full refreshes replace the whole snapshot.
    pub fn is_full_refresh(&self) -> bool {
        !matches!(self, Self::ModelChange(_))
    }
}

/// A fetch released by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub query: StatisticsQuery,
    /// Model whose collections the response updates; `None` means replace
    pub active_model: Option<String>,
}

impl PendingFetch {
    pub fn is_full_refresh(&self) -> bool {
        self.active_model.is_none()
    }

    /// Widen a model-scoped fetch into a full refresh.
    pub fn into_full_refresh(self) -> Self {
        Self {
            query: self.query.without_model(),
            active_model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Armed { deadline: Instant },
    Dropped,
}

impl GateDecision {
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }
}

/// Trailing debounce in front of the statistics fetch.
///
/// Every accepted request replaces the pending query and pushes the
/// deadline back by one window, so a burst of requests yields one fetch
/// carrying the latest query. Requests without an organization are dropped
/// and disarm the gate. A window that saw any full-refresh request fires a
/// full refresh.
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    pending: Option<StatisticsQuery>,
    active_model: Option<String>,
    full_refresh: bool,
    deadline: Option<Instant>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            active_model: None,
            full_refresh: false,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn request(&mut self, query: StatisticsQuery, trigger: RefetchTrigger, now: Instant) -> GateDecision {
        if !query.has_organization() {
            self.disarm();
            return GateDecision::Dropped;
        }

        match trigger {
            RefetchTrigger::ModelChange(model) => self.active_model = Some(model),
            _ => self.full_refresh = true,
        }

        let deadline = now + self.window;
        self.pending = Some(query);
        self.deadline = Some(deadline);
        GateDecision::Armed { deadline }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the pending fetch once its window has settled.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingFetch> {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }

        let query = self.pending.take()?;
        let full_refresh = std::mem::take(&mut self.full_refresh);
        let active_model = self.active_model.take();
        self.deadline = None;

        let pending = PendingFetch {
            query,
            active_model,
        };
        Some(if full_refresh {
            pending.into_full_refresh()
        } else {
            pending
        })
    }

    pub fn disarm(&mut self) {
        self.pending = None;
        self.active_model = None;
        self.full_refresh = false;
        self.deadline = None;
    }
}
