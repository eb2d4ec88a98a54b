//! Query-string codec shared by datasources and navigators.
//!
//! A [`QueryMap`] is ordered by key, so its serialization is canonical:
//! two maps with the same keys and values always produce the same string.
//! Array values are written as repeated keys (`order=a.asc&order=b.desc`).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use url::form_urlencoded;

/// Keys with engine-defined meaning; they are never filter columns.
pub const RESERVED_KEYS: [&str; 7] = ["page", "limit", "order", "in", "search", "search_in", "filter"];

/// Value of the `filter` key once a filter has been applied through the URL.
pub const FILTER_APPLIED: &str = "applied";

/// Whether `key` is one of [`RESERVED_KEYS`].
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// One query-string value: a single string or a repeated key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }

    /// All values as a list.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    /// Whether the value carries nothing worth serializing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(value) => value.is_empty(),
            Self::Many(values) => values.is_empty(),
        }
    }

    /// Convert a JSON filter value. `null` has no query representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Single(s.clone())),
            Value::Array(items) => Some(Self::Many(
                items.iter().filter_map(json_scalar).collect(),
            )),
            other => json_scalar(other).map(Self::Single),
        }
    }

    /// Convert to a JSON value as a filter read from the URL.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Single(value) => Value::String(value.clone()),
            Self::Many(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        }
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Ordered map of query-string keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap(BTreeMap<String, QueryValue>);

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string, with or without the leading `?`.
    ///
    /// Repeated keys collapse into [`QueryValue::Many`]; a `[]` suffix on a
    /// key is accepted and dropped.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut map = BTreeMap::<String, QueryValue>::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let key = key.strip_suffix("[]").unwrap_or(&*key).to_string();
            let value = value.into_owned();
            match map.remove(&key) {
                None => {
                    map.insert(key, QueryValue::Single(value));
                }
                Some(QueryValue::Single(first)) => {
                    map.insert(key, QueryValue::Many(vec![first, value]));
                }
                Some(QueryValue::Many(mut values)) => {
                    values.push(value);
                    map.insert(key, QueryValue::Many(values));
                }
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// First value of `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(QueryValue::first)
    }

    /// First value of `key`, when non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get_str(key).filter(|value| !value.is_empty())
    }

    /// Positive integer value of `key`.
    pub fn get_positive(&self, key: &str) -> Option<u64> {
        self.get_str(key)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Option<QueryValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &QueryValue) -> bool) {
        self.0.retain(|key, value| keep(key, value));
    }

    /// Overlay `other` onto this map; keys in `other` win.
    pub fn merge(&mut self, other: QueryMap) {
        self.0.extend(other.0);
    }

    /// Entries whose key is not reserved: the filter columns carried by a URL.
    pub fn filter_columns(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter().filter(|(key, _)| !is_reserved(key))
    }

    /// Canonical serialization: keys sorted, arrays as repeated keys,
    /// empty arrays omitted.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            match value {
                QueryValue::Single(value) => {
                    serializer.append_pair(key, value);
                }
                QueryValue::Many(values) => {
                    for value in values {
                        serializer.append_pair(key, value);
                    }
                }
            }
        }
        serializer.finish()
    }
}

impl fmt::Display for QueryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
