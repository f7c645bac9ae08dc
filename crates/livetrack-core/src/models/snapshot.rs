use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One named collection of the snapshot. Shared between snapshot versions so
/// that collections untouched by a merge or a filter keep their identity.
pub type Collection = Arc<Value>;

/// Every collection fetched so far, keyed by collection name.
///
/// Collections are normally arrays of records; other JSON values (counters,
/// summaries) are carried unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    collections: BTreeMap<String, Collection>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a JSON object. Returns `None` for any other value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            collections: map
                .into_iter()
                .map(|(key, value)| (key, Arc::new(value)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.collections.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Collection> {
        self.collections.get(key)
    }

    /// Records of an array collection.
    pub fn records(&self, key: &str) -> Option<&[Value]> {
        self.collections
            .get(key)
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
    }

    /// Number of records in an array collection, 0 when missing or not an array.
    pub fn record_count(&self, key: &str) -> usize {
        self.records(key).map_or(0, <[Value]>::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Collection)> {
        self.collections.iter()
    }

    pub fn insert(&mut self, key: impl Into<String>, collection: Collection) {
        self.collections.insert(key.into(), collection);
    }

    pub fn into_collections(self) -> impl Iterator<Item = (String, Collection)> {
        self.collections.into_iter()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.collections.len()))?;
        for (key, value) in &self.collections {
            map.serialize_entry(key, value.as_ref())?;
        }
        map.end()
    }
}

/// Body of one statistics fetch: `{"data": {<collection>: [...], ...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub data: Option<Value>,
}

impl FetchResponse {
    pub fn from_data(data: Value) -> Self {
        Self { data: Some(data) }
    }

    /// The collections carried by the response, if `data` is an object.
    pub fn into_snapshot(self) -> Option<Snapshot> {
        self.data.and_then(Snapshot::from_value)
    }
}
