//! The HTTP transport boundary.
//!
//! Datasources never talk to the network directly. They hand a route and
//! parameters to a [`Transport`] and expect a JSON body of the shape
//! `{data, pagination?}` back. `horizon-compose-net` ships a reqwest-backed
//! implementation.

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::TransportError;

/// Future returned by every transport call.
pub type TransportFuture<'a> = BoxFuture<'a, Result<Value, TransportError>>;

/// Ordered request parameters. Keys may repeat; arrays are sent as
/// repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams(Vec<(String, String)>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Push one pair per value; nothing for an empty list.
    pub fn push_all<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.0.push((key.to_string(), value.into()));
        }
    }

    /// Every value sent under `key`.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value sent under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Asynchronous JSON-over-HTTP collaborator.
///
/// Implementations own whatever they need from the arguments; the returned
/// future only borrows `self`.
pub trait Transport: Send + Sync {
    fn get(&self, route: String, params: RequestParams) -> TransportFuture<'_>;
    fn post(&self, route: String, body: Value) -> TransportFuture<'_>;
    fn put(&self, route: String, body: Value) -> TransportFuture<'_>;
    fn delete(&self, route: String) -> TransportFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_repeat_keys() {
        let mut params = RequestParams::new();
        params.push("page", "1");
        params.push_all("order", ["name.asc", "id.desc"]);
        params.push_all("in", Vec::<String>::new());

        assert_eq!(params.get("page"), Some("1"));
        assert_eq!(params.get_all("order"), vec!["name.asc", "id.desc"]);
        assert!(!params.contains_key("in"));
        assert_eq!(params.pairs().len(), 3);
    }
}
