//! Client-side filtering of the held snapshot.
//!
//! The optional nationality/boss/supervisor filters are combined with AND.
//! Records are matched on `nationality`, `boss` and `supervisor`. In
//! `sectors_table` every active condition applies. In other array
//! collections a condition applies only when the record carries its marker
//! key (`nationality`, `boss_id`, `supervisor_id`). `locations` is filtered
//! by the map layer derivation instead.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::constants::collections::{LOCATIONS, SECTORS_TABLE};
use crate::models::{loosely_equals, Collection, FilterKey, FilterState, Snapshot};

/// One active optional filter and the record fields it is checked against.
#[derive(Debug, Clone, Copy)]
struct Condition<'a> {
    /// Field compared against the selected value
    field: &'static str,
    /// Key that must be present on non-sector records for the condition to apply
    marker_key: &'static str,
    value: &'a str,
}

impl Condition<'_> {
    fn matches_sector(&self, record: &Value) -> bool {
        record
            .get(self.field)
            .is_some_and(|field| loosely_equals(field, self.value))
    }

    fn matches_record(&self, record: &Value) -> bool {
        record.get(self.marker_key).is_none() || self.matches_sector(record)
    }
}

fn active_conditions(filters: &FilterState) -> Vec<Condition<'_>> {
    filters
        .active_optional()
        .into_iter()
        .map(|(key, value)| {
            let (field, marker_key) = match key {
                FilterKey::NationalityId => ("nationality", "nationality"),
                FilterKey::BossId => ("boss", "boss_id"),
                _ => ("supervisor", "supervisor_id"),
            };
            Condition {
                field,
                marker_key,
                value,
            }
        })
        .collect()
}

/// Derive the displayed subset of `snapshot`.
///
/// With no optional filter active, or an empty snapshot, the same `Arc` is
/// returned. Collections that lose no record keep their identity.
pub fn compute_view(snapshot: &Arc<Snapshot>, filters: &FilterState) -> Arc<Snapshot> {
    let conditions = active_conditions(filters);
    if conditions.is_empty() || snapshot.is_empty() {
        return Arc::clone(snapshot);
    }

    let mut view = Snapshot::new();
    for (key, collection) in snapshot.iter() {
        let filtered = match key.as_str() {
            SECTORS_TABLE => retain_records(collection, |record| {
                conditions.iter().all(|c| c.matches_sector(record))
            }),
            LOCATIONS => None,
            _ => retain_records(collection, |record| {
                !record.is_object() || conditions.iter().all(|c| c.matches_record(record))
            }),
        };
        view.insert(key.clone(), filtered.unwrap_or_else(|| Arc::clone(collection)));
    }
    Arc::new(view)
}

/// Filter an array collection. `None` when the collection is not an array
/// or nothing was removed, so the caller can keep the original reference.
fn retain_records(collection: &Collection, keep: impl Fn(&Value) -> bool) -> Option<Collection> {
    let records = collection.as_array()?;
    if records.iter().all(&keep) {
        return None;
    }
    let kept = records.iter().filter(|record| keep(*record)).cloned().collect();
    Some(Arc::new(Value::Array(kept)))
}

/// Summary of what the optional filters did to the sector list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub original_count: usize,
    pub filtered_count: usize,
    pub is_filtered: bool,
    pub active_filters: Vec<String>,
    pub filter_text: String,
}

impl FilterStats {
    pub fn compute(snapshot: &Snapshot, view: &Snapshot, filters: &FilterState) -> Self {
        let active_filters: Vec<String> = filters
            .active_optional()
            .into_iter()
            .map(|(key, value)| format!("{}: {}", key.label(), value))
            .collect();

        Self {
            original_count: snapshot.record_count(SECTORS_TABLE),
            filtered_count: view.record_count(SECTORS_TABLE),
            is_filtered: !active_filters.is_empty(),
            filter_text: active_filters.join(" | "),
            active_filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> Arc<Snapshot> {
        Arc::new(Snapshot::from_value(value).unwrap())
    }

    fn sample() -> Arc<Snapshot> {
        snapshot(json!({
            "sectors_table": [
                { "id": 1, "nationality": "EG", "boss": "Ali", "supervisor": "Omar" },
                { "id": 2, "nationality": "SA", "boss": "Ali", "supervisor": "Zaid" },
                { "id": 3, "nationality": "EG", "boss": "Sami", "supervisor": "Omar" }
            ],
            "locations": [
                { "id": 10, "nationality": "SA", "location_type": "Ticket" }
            ],
            "Ticket": [
                { "id": 100, "nationality": "SA" },
                { "id": 101, "nationality": "EG" },
                { "id": 102 },
                "not-a-record"
            ],
            "Support": [
                { "id": 200, "boss_id": 7, "boss": "Ali" },
                { "id": 201, "boss_id": 9, "boss": "Sami" }
            ],
            "Meal": [
                { "id": 300, "supervisor_id": 4, "supervisor": "Omar" },
                { "id": 301, "supervisor": "Zaid" },
                { "id": 302, "supervisor_id": 5 }
            ],
            "totals": { "sectors": 3 }
        }))
    }

    fn ids(view: &Snapshot, key: &str) -> Vec<Value> {
        view.records(key)
            .unwrap()
            .iter()
            .map(|r| r.get("id").cloned().unwrap_or_else(|| r.clone()))
            .collect()
    }

    #[test]
    fn test_no_optional_filter_returns_same_reference() {
        let snapshot = sample();
        let filters = FilterState::new()
            .with(FilterKey::OrganizationId, "2")
            .with(FilterKey::LocationType, "Ticket");

        let view = compute_view(&snapshot, &filters);
        assert!(Arc::ptr_eq(&view, &snapshot));
    }

    #[test]
    fn test_empty_snapshot_returns_itself() {
        let empty = Arc::new(Snapshot::new());
        let filters = FilterState::new().with(FilterKey::NationalityId, "EG");

        let view = compute_view(&empty, &filters);
        assert!(Arc::ptr_eq(&view, &empty));
    }

    #[test]
    fn test_nationality_scenario() {
        let snapshot = snapshot(json!({
            "sectors_table": [
                { "id": 1, "nationality": "EG" },
                { "id": 2, "nationality": "SA" }
            ]
        }));
        let filters = FilterState::new().with(FilterKey::NationalityId, "EG");

        let view = compute_view(&snapshot, &filters);
        assert_eq!(ids(&view, "sectors_table"), vec![json!(1)]);

        let stats = FilterStats::compute(&snapshot, &view, &filters);
        assert_eq!(stats.filtered_count, 1);
        assert_eq!(stats.original_count, 2);
        assert!(stats.is_filtered);
        assert_eq!(stats.active_filters, vec!["nationality: EG".to_string()]);
    }

    #[test]
    fn test_sector_filters_combine_with_and() {
        let filters = FilterState::new()
            .with(FilterKey::NationalityId, "EG")
            .with(FilterKey::SupervisorId, "Omar")
            .with(FilterKey::BossId, "Sami");

        let view = compute_view(&sample(), &filters);
        assert_eq!(ids(&view, "sectors_table"), vec![json!(3)]);
    }

    #[test]
    fn test_other_collections_gate_on_marker_keys() {
        let snapshot = sample();
        let filters = FilterState::new()
            .with(FilterKey::NationalityId, "EG")
            .with(FilterKey::BossId, "Ali");

        let view = compute_view(&snapshot, &filters);

        // Records without the key and non-object records pass through
        assert_eq!(
            ids(&view, "Ticket"),
            vec![json!(101), json!(102), json!("not-a-record")]
        );
        // boss_id only marks the record, the name in `boss` is compared
        assert_eq!(ids(&view, "Support"), vec![json!(200)]);
    }

    #[test]
    fn test_marked_record_without_compared_field_is_removed() {
        let filters = FilterState::new().with(FilterKey::SupervisorId, "Omar");
        let view = compute_view(&sample(), &filters);

        // 301 has no supervisor_id so it passes; 302 is marked but unnamed
        assert_eq!(ids(&view, "Meal"), vec![json!(300), json!(301)]);
    }

    #[test]
    fn test_locations_and_non_arrays_are_untouched() {
        let snapshot = sample();
        let filters = FilterState::new().with(FilterKey::NationalityId, "EG");

        let view = compute_view(&snapshot, &filters);
        assert!(Arc::ptr_eq(
            view.get("locations").unwrap(),
            snapshot.get("locations").unwrap()
        ));
        assert!(Arc::ptr_eq(
            view.get("totals").unwrap(),
            snapshot.get("totals").unwrap()
        ));
        // Support records carry no nationality, nothing removed
        assert!(Arc::ptr_eq(
            view.get("Support").unwrap(),
            snapshot.get("Support").unwrap()
        ));
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let filters = FilterState::new()
            .with(FilterKey::NationalityId, "EG")
            .with(FilterKey::BossId, "Ali");

        let once = compute_view(&sample(), &filters);
        let twice = compute_view(&once, &filters);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_adding_a_filter_never_increases_count() {
        let snapshot = sample();
        let steps = [
            FilterState::new().with(FilterKey::BossId, "Ali"),
            FilterState::new()
                .with(FilterKey::BossId, "Ali")
                .with(FilterKey::NationalityId, "EG"),
            FilterState::new()
                .with(FilterKey::BossId, "Ali")
                .with(FilterKey::NationalityId, "EG")
                .with(FilterKey::SupervisorId, "Zaid"),
        ];

        let mut previous = snapshot.record_count(SECTORS_TABLE);
        for filters in steps {
            let view = compute_view(&snapshot, &filters);
            let count = view.record_count(SECTORS_TABLE);
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_view_is_subset_of_snapshot() {
        let snapshot = sample();
        let filters = FilterState::new().with(FilterKey::SupervisorId, "Omar");
        let view = compute_view(&snapshot, &filters);

        for (key, collection) in view.iter() {
            let original = snapshot.get(key).unwrap();
            match (collection.as_array(), original.as_array()) {
                (Some(kept), Some(all)) => assert!(kept.iter().all(|r| all.contains(r))),
                _ => assert_eq!(collection, original),
            }
        }
    }

    #[test]
    fn test_stats_without_filters() {
        let snapshot = sample();
        let filters = FilterState::new();
        let view = compute_view(&snapshot, &filters);
        let stats = FilterStats::compute(&snapshot, &view, &filters);

        assert_eq!(stats.original_count, 3);
        assert_eq!(stats.filtered_count, 3);
        assert!(!stats.is_filtered);
        assert!(stats.filter_text.is_empty());
    }

    #[test]
    fn test_stats_filter_text_joins_labels() {
        let snapshot = sample();
        let filters = FilterState::new()
            .with(FilterKey::NationalityId, "EG")
            .with(FilterKey::BossId, "Ali");
        let view = compute_view(&snapshot, &filters);
        let stats = FilterStats::compute(&snapshot, &view, &filters);

        assert_eq!(stats.filter_text, "nationality: EG | boss: Ali");
        assert_eq!(stats.filtered_count, 1);
    }
}
