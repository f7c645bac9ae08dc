//! Snapshot merge rules.
//!
//! A fetch triggered by a model change usually returns only that model's
//! collection. Merging it must never wipe collections unrelated to the
//! change; only a full fetch (no active model) replaces the whole snapshot.
//!
//! ## Rules (first match wins)
//! 1. No active model: the incoming snapshot replaces the previous one.
//! 2. Incoming has a collection named exactly after the active model: only
//!    that collection is replaced.
//! 3. Incoming has exactly one collection: it is stored under the active
//!    model's key, whatever the backend named it.
//! 4. Every incoming collection whose key contains the active model is
//!    stored under its own key.
//! 5. Nothing matched: the previous snapshot is kept as is.

use crate::models::Snapshot;

/// Which merge rule produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    FullReplace,
    NamedCollection,
    SingleCollection,
    KeyContainsModel,
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub rule: MergeRule,
}

/// Combine a fetched snapshot with the previously held one.
///
/// A blank active model counts as unset.
pub fn merge(previous: &Snapshot, incoming: Snapshot, active_model: Option<&str>) -> MergeOutcome {
    let model = match active_model.map(str::trim) {
        Some(model) if !model.is_empty() => model,
        _ => {
            return MergeOutcome {
                snapshot: incoming,
                rule: MergeRule::FullReplace,
            }
        }
    };

    let mut merged = previous.clone();

    if let Some(collection) = incoming.get(model) {
        merged.insert(model, collection.clone());
        return MergeOutcome {
            snapshot: merged,
            rule: MergeRule::NamedCollection,
        };
    }

    if incoming.len() == 1 {
        if let Some((_, collection)) = incoming.into_collections().next() {
            merged.insert(model, collection);
        }
        return MergeOutcome {
            snapshot: merged,
            rule: MergeRule::SingleCollection,
        };
    }

    let mut matched = false;
    for (key, collection) in incoming.into_collections() {
        if key.contains(model) {
            merged.insert(key, collection);
            matched = true;
        }
    }

    MergeOutcome {
        snapshot: merged,
        rule: if matched {
            MergeRule::KeyContainsModel
        } else {
            MergeRule::Unmatched
        },
    }
}
