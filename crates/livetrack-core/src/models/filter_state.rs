use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Named keys of the dashboard filter form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    MonitorId,
    Date,
    SectorId,
    OrganizationId,
    NationalityId,
    BossId,
    SupervisorId,
    LocationType,
    ActionType,
    Site,
    ChangedModelName,
}

impl FilterKey {
    pub const ALL: [FilterKey; 11] = [
        Self::MonitorId,
        Self::Date,
        Self::SectorId,
        Self::OrganizationId,
        Self::NationalityId,
        Self::BossId,
        Self::SupervisorId,
        Self::LocationType,
        Self::ActionType,
        Self::Site,
        Self::ChangedModelName,
    ];

    /// Filters applied client-side to the fetched snapshot.
    pub const OPTIONAL: [FilterKey; 3] = [Self::NationalityId, Self::BossId, Self::SupervisorId];

    /// Filters sent to the statistics endpoint; changing one requires a refetch.
    pub const FETCH_INPUTS: [FilterKey; 4] = [
        Self::MonitorId,
        Self::Date,
        Self::SectorId,
        Self::OrganizationId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonitorId => "monitor_id",
            Self::Date => "date",
            Self::SectorId => "sector_id",
            Self::OrganizationId => "organization_id",
            Self::NationalityId => "nationality_id",
            Self::BossId => "boss_id",
            Self::SupervisorId => "supervisor_id",
            Self::LocationType => "location_type",
            Self::ActionType => "action_type",
            Self::Site => "site",
            Self::ChangedModelName => "changed_model_name",
        }
    }

    /// Parse a form field name. `modelName` is the form's alias for the
    /// changed-model field.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "modelName" {
            return Some(Self::ChangedModelName);
        }
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// Short human label used in filter summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MonitorId => "monitor",
            Self::Date => "date",
            Self::SectorId => "sector",
            Self::OrganizationId => "organization",
            Self::NationalityId => "nationality",
            Self::BossId => "boss",
            Self::SupervisorId => "supervisor",
            Self::LocationType => "location type",
            Self::ActionType => "action type",
            Self::Site => "site",
            Self::ChangedModelName => "changed model",
        }
    }
}

/// Snapshot of the external filter form.
///
/// Every field is either a scalar rendered as text or empty. Numbers and
/// booleans coming from the form are kept in their textual form; blank
/// strings deserialize to `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub monitor_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub nationality_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub boss_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(
        default,
        alias = "modelName",
        deserialize_with = "scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub changed_model_name: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        let value = match key {
            FilterKey::MonitorId => &self.monitor_id,
            FilterKey::Date => &self.date,
            FilterKey::SectorId => &self.sector_id,
            FilterKey::OrganizationId => &self.organization_id,
            FilterKey::NationalityId => &self.nationality_id,
            FilterKey::BossId => &self.boss_id,
            FilterKey::SupervisorId => &self.supervisor_id,
            FilterKey::LocationType => &self.location_type,
            FilterKey::ActionType => &self.action_type,
            FilterKey::Site => &self.site,
            FilterKey::ChangedModelName => &self.changed_model_name,
        };
        value.as_deref()
    }

    /// Set or clear a field. Blank values clear it.
    pub fn set(&mut self, key: FilterKey, value: Option<impl Into<String>>) {
        let value = value.map(Into::into).filter(|v| !v.trim().is_empty());
        let slot = match key {
            FilterKey::MonitorId => &mut self.monitor_id,
            FilterKey::Date => &mut self.date,
            FilterKey::SectorId => &mut self.sector_id,
            FilterKey::OrganizationId => &mut self.organization_id,
            FilterKey::NationalityId => &mut self.nationality_id,
            FilterKey::BossId => &mut self.boss_id,
            FilterKey::SupervisorId => &mut self.supervisor_id,
            FilterKey::LocationType => &mut self.location_type,
            FilterKey::ActionType => &mut self.action_type,
            FilterKey::Site => &mut self.site,
            FilterKey::ChangedModelName => &mut self.changed_model_name,
        };
        *slot = value;
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.set(key, Some(value));
        self
    }

    pub fn has_organization(&self) -> bool {
        self.organization_id.is_some()
    }

    /// Active client-side filters in their fixed order.
    pub fn active_optional(&self) -> Vec<(FilterKey, &str)> {
        FilterKey::OPTIONAL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    pub fn has_optional_filter(&self) -> bool {
        FilterKey::OPTIONAL.iter().any(|key| self.get(*key).is_some())
    }

    /// True when the fields sent to the statistics endpoint differ.
    pub fn fetch_inputs_differ(&self, other: &FilterState) -> bool {
        FilterKey::FETCH_INPUTS
            .iter()
            .any(|key| self.get(*key) != other.get(*key))
    }
}

/// Loose equality between a record field and a selected filter value.
///
/// Strings compare verbatim, numbers and booleans by their JSON rendering,
/// so `organization_id: 2` matches a selection of `"2"`.
pub fn loosely_equals(field: &Value, selected: &str) -> bool {
    match field {
        Value::String(text) => text == selected,
        Value::Number(number) => number.to_string() == selected,
        Value::Bool(flag) => flag.to_string() == selected,
        _ => false,
    }
}

fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "filter values must be scalars, got {}",
                other
            )))
        }
    };
    Ok(text.filter(|t| !t.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_accepts_numbers_and_blanks() {
        let filters: FilterState = serde_json::from_value(json!({
            "organization_id": 2,
            "monitor_id": "",
            "date": "2024-06-15",
            "modelName": "Ticket"
        }))
        .unwrap();

        assert_eq!(filters.organization_id.as_deref(), Some("2"));
        assert_eq!(filters.monitor_id, None);
        assert_eq!(filters.date.as_deref(), Some("2024-06-15"));
        assert_eq!(filters.changed_model_name.as_deref(), Some("Ticket"));
    }

    #[test]
    fn test_deserialize_rejects_nested_values() {
        let result = serde_json::from_value::<FilterState>(json!({ "boss_id": ["a"] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_set_blank_clears_field() {
        let mut filters = FilterState::new().with(FilterKey::BossId, "Ali");
        assert_eq!(filters.get(FilterKey::BossId), Some("Ali"));

        filters.set(FilterKey::BossId, Some("  "));
        assert_eq!(filters.get(FilterKey::BossId), None);
    }

    #[test]
    fn test_from_name_roundtrips_every_key() {
        for key in FilterKey::ALL {
            assert_eq!(FilterKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(
            FilterKey::from_name("modelName"),
            Some(FilterKey::ChangedModelName)
        );
        assert_eq!(FilterKey::from_name("unknown"), None);
    }

    #[test]
    fn test_active_optional_keeps_fixed_order() {
        let filters = FilterState::new()
            .with(FilterKey::SupervisorId, "S1")
            .with(FilterKey::NationalityId, "EG");

        assert_eq!(
            filters.active_optional(),
            vec![
                (FilterKey::NationalityId, "EG"),
                (FilterKey::SupervisorId, "S1")
            ]
        );
        assert!(filters.has_optional_filter());
        assert!(!FilterState::new().has_optional_filter());
    }

    #[test]
    fn test_fetch_inputs_ignore_client_side_filters() {
        let base = FilterState::new().with(FilterKey::OrganizationId, "2");
        let nationality = base.clone().with(FilterKey::NationalityId, "EG");
        let date = base.clone().with(FilterKey::Date, "2024-06-15");

        assert!(!base.fetch_inputs_differ(&nationality));
        assert!(base.fetch_inputs_differ(&date));
    }

    #[test]
    fn test_loosely_equals() {
        assert!(loosely_equals(&json!("EG"), "EG"));
        assert!(loosely_equals(&json!(2), "2"));
        assert!(loosely_equals(&json!(true), "true"));
        assert!(!loosely_equals(&json!(null), "EG"));
        assert!(!loosely_equals(&json!("eg"), "EG"));
    }
}
