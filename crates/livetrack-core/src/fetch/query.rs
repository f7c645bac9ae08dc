use serde::Serialize;

use crate::models::FilterState;

/// Query sent to the statistics endpoint.
///
/// `stamp` is the `_t` cache buster. It changes whenever a refetch is forced
/// without any filter change, so two such queries are never identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsQuery {
    pub monitor_id: Option<String>,
    pub date: Option<String>,
    pub sector_id: Option<String>,
    pub organization_id: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "_t")]
    pub stamp: i64,
}

impl StatisticsQuery {
    pub fn from_filters(filters: &FilterState, stamp: i64) -> Self {
        Self {
            monitor_id: filters.monitor_id.clone(),
            date: filters.date.clone(),
            sector_id: filters.sector_id.clone(),
            organization_id: filters.organization_id.clone(),
            model: filters.changed_model_name.clone(),
            stamp,
        }
    }

    pub fn has_organization(&self) -> bool {
        self.organization_id.is_some()
    }

    /// Same query asking for every collection instead of one model's delta.
    pub fn without_model(mut self) -> Self {
        self.model = None;
        self
    }

    /// Query parameters in wire order; empty values are omitted.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let fields = [
            ("monitor_id", &self.monitor_id),
            ("date", &self.date),
            ("sector_id", &self.sector_id),
            ("organization_id", &self.organization_id),
            ("model", &self.model),
        ];

        let mut params: Vec<(&'static str, String)> = fields
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (name, v.to_string()))
            })
            .collect();
        params.push(("_t", self.stamp.to_string()));
        params
    }
}

/// Monotonic millisecond stamp source for `_t`.
#[derive(Debug, Clone)]
pub struct CacheStamp {
    current: i64,
}

impl CacheStamp {
    pub fn new() -> Self {
        Self {
            current: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    /// Move to the current time, or one past the previous stamp when the
    /// clock has not advanced.
    pub fn bump(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.current = now.max(self.current + 1);
        self.current
    }
}

impl Default for CacheStamp {
    fn default() -> Self {
        Self::new()
    }
}
