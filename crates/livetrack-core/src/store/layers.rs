//! Map layer derivation from the filtered view.
//!
//! Decides which marker layers are shown (`action_type`), narrows locations
//! by `location_type`, and drops records without usable coordinates. Sectors
//! can be restricted to one hajj site (`site`).

use serde::Serialize;
use serde_json::Value;

use crate::constants::collections::{LOCATIONS, SECTORS_TABLE};
use crate::models::{FilterState, Snapshot};

/// Which marker layers the map shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Nothing,
    Sectors,
    Mentors,
    All,
}

impl DisplayMode {
    pub fn from_action_type(action_type: Option<&str>) -> Self {
        match action_type {
            Some("sectors" | "Sectors" | "القطاعات") => Self::Sectors,
            Some("mentors" | "actionMentors" | "المرشدين") => Self::Mentors,
            Some("all" | "AllActions" | "جميع الإجراءات") => Self::All,
            _ => Self::Nothing,
        }
    }

    pub fn shows_sectors(&self) -> bool {
        matches!(self, Self::Sectors | Self::All)
    }

    pub fn shows_locations(&self) -> bool {
        matches!(self, Self::Mentors | Self::All)
    }
}

/// Hajj site a sector can be placed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Arafah,
    Mina,
}

impl Site {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "arafah" | "Arafah" | "Arfa" | "عرفة" => Some(Self::Arafah),
            "mina" | "Mina" | "Mena" | "منى" => Some(Self::Mina),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Read a coordinate pair from a record. Missing, unparsable and zero
    /// values are rejected.
    pub fn from_record(record: &Value, lat_key: &str, lng_key: &str) -> Option<Self> {
        Some(Self {
            lat: parse_coordinate(record.get(lat_key)?)?,
            lng: parse_coordinate(record.get(lng_key)?)?,
        })
    }
}

fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => numeric_prefix(text)?.parse::<f64>().ok()?,
        _ => return None,
    };
    (parsed.is_finite() && parsed != 0.0).then_some(parsed)
}

/// Longest leading decimal literal after leading whitespace, so `"21.4 N"`
/// reads as `21.4`.
fn numeric_prefix(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        has_digits |= frac_end > end + 1;
        if has_digits {
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    Some(&text[..end])
}

/// Marker layers ready for a map widget.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayers {
    pub mode: DisplayMode,
    pub sectors: Vec<Value>,
    pub locations: Vec<Value>,
}

pub fn derive_layers(view: &Snapshot, filters: &FilterState) -> MapLayers {
    let mode = DisplayMode::from_action_type(filters.action_type.as_deref());
    let site = filters.site.as_deref().and_then(Site::parse);

    let sectors = if mode.shows_sectors() {
        view.records(SECTORS_TABLE)
            .unwrap_or_default()
            .iter()
            .filter(|sector| sector_is_placed(sector, site))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let locations = if mode.shows_locations() {
        view.records(LOCATIONS)
            .unwrap_or_default()
            .iter()
            .filter(|location| match filters.location_type.as_deref() {
                Some(kind) => location.get("location_type").and_then(Value::as_str) == Some(kind),
                None => true,
            })
            .filter(|location| Coordinates::from_record(location, "latitude", "longitude").is_some())
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    MapLayers {
        mode,
        sectors,
        locations,
    }
}

fn sector_is_placed(sector: &Value, site: Option<Site>) -> bool {
    let mina = Coordinates::from_record(sector, "latitude", "longitude").is_some();
    let arafah = Coordinates::from_record(sector, "arafah_latitude", "arafah_longitude").is_some();
    match site {
        Some(Site::Arafah) => arafah,
        Some(Site::Mina) => mina,
        None => mina || arafah,
    }
}
