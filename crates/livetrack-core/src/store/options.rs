use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::constants::collections::SECTORS_TABLE;
use crate::models::{loosely_equals, FilterKey, FilterState, Snapshot};

/// Optional filters that offer a choice list built from the sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionField {
    Nationality,
    Boss,
    Supervisor,
}

impl OptionField {
    pub const ALL: [OptionField; 3] = [Self::Nationality, Self::Boss, Self::Supervisor];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "nationality" | "nationality_id" => Some(Self::Nationality),
            "boss" | "boss_id" => Some(Self::Boss),
            "supervisor" | "supervisor_id" => Some(Self::Supervisor),
            _ => None,
        }
    }

    /// Field read from `sectors_table` records.
    pub fn sector_field(&self) -> &'static str {
        match self {
            Self::Nationality => "nationality",
            Self::Boss => "boss",
            Self::Supervisor => "supervisor",
        }
    }

    pub fn filter_key(&self) -> FilterKey {
        match self {
            Self::Nationality => FilterKey::NationalityId,
            Self::Boss => FilterKey::BossId,
            Self::Supervisor => FilterKey::SupervisorId,
        }
    }
}

/// Distinct, non-blank values of `field` across the sectors of the selected
/// organization (all sectors when none is selected), in natural order.
pub fn filter_options(snapshot: &Snapshot, field: OptionField, organization_id: Option<&str>) -> Vec<String> {
    let Some(sectors) = snapshot.records(SECTORS_TABLE) else {
        return Vec::new();
    };

    let values: BTreeSet<String> = sectors
        .iter()
        .filter(|sector| match organization_id {
            Some(organization) => sector
                .get("organization_id")
                .is_some_and(|id| loosely_equals(id, organization)),
            None => true,
        })
        .filter_map(|sector| sector.get(field.sector_field()).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();

    let mut options: Vec<String> = values.into_iter().collect();
    options.sort_by(|a, b| natural_cmp(a, b));
    options
}

/// Optional filter selections no longer offered for the selected
/// organization. Only checked once an organization is selected.
pub fn stale_selections(snapshot: &Snapshot, filters: &FilterState) -> Vec<FilterKey> {
    let Some(organization) = filters.organization_id.as_deref() else {
        return Vec::new();
    };

    OptionField::ALL
        .into_iter()
        .filter(|field| match filters.get(field.filter_key()) {
            Some(selected) => !filter_options(snapshot, *field, Some(organization))
                .iter()
                .any(|option| option == selected),
            None => false,
        })
        .map(|field| field.filter_key())
        .collect()
}

/// Compare strings treating embedded digit runs as numbers ("Team 2" < "Team 10").
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ordering = ln
                    .trim_start_matches('0')
                    .len()
                    .cmp(&rn.trim_start_matches('0').len())
                    .then_with(|| ln.trim_start_matches('0').cmp(rn.trim_start_matches('0')));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
