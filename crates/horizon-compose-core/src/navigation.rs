//! The navigable location boundary.
//!
//! Datasources that watch the URL read and write the current location's
//! query string through a [`Navigator`]. [`MemoryNavigator`] keeps the
//! location in memory and is what tests and headless hosts use.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use crate::datasource::QueryMap;
use crate::logging::targets;

/// A path, query string and hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: QueryMap,
    pub hash: String,
}

impl Location {
    /// Location at `path` with the given query and no hash.
    pub fn new(path: impl Into<String>, query: QueryMap) -> Self {
        Self {
            path: path.into(),
            query,
            hash: String::new(),
        }
    }

    /// Parse `path?query#hash`.
    pub fn parse(full_path: &str) -> Self {
        let (rest, hash) = match full_path.split_once('#') {
            Some((rest, hash)) => (rest, hash.to_string()),
            None => (full_path, String::new()),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, QueryMap::parse(query)),
            None => (rest, QueryMap::new()),
        };
        Self {
            path: path.to_string(),
            query,
            hash,
        }
    }

    /// `path?query#hash`, omitting empty parts.
    pub fn full_path(&self) -> String {
        let mut out = self.path.clone();
        let query = self.query.to_query_string();
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }
        if !self.hash.is_empty() {
            out.push('#');
            out.push_str(&self.hash);
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

/// Read and change the current navigable location.
pub trait Navigator: Send + Sync {
    fn path(&self) -> String;
    fn hash(&self) -> String;
    fn query(&self) -> QueryMap;
    /// Route parameters extracted by the host router.
    fn params(&self) -> HashMap<String, String>;
    fn full_path(&self) -> String;
    /// Navigate, adding a history entry.
    fn push(&self, location: Location);
    /// Navigate, replacing the current history entry.
    fn replace(&self, location: Location);
}

#[derive(Debug, Default)]
struct NavState {
    current: Location,
    history: Vec<Location>,
    params: HashMap<String, String>,
}

/// An in-memory [`Navigator`]. Changes apply synchronously.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    state: Mutex<NavState>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `full_path`.
    pub fn at(full_path: &str) -> Self {
        Self {
            state: Mutex::new(NavState {
                current: Location::parse(full_path),
                ..Default::default()
            }),
        }
    }

    pub fn current(&self) -> Location {
        self.state.lock().current.clone()
    }

    pub fn set_params(&self, params: HashMap<String, String>) {
        self.state.lock().params = params;
    }

    /// Number of entries behind the current one.
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Return to the previous entry. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        let mut state = self.state.lock();
        match state.history.pop() {
            Some(previous) => {
                state.current = previous;
                true
            }
            None => false,
        }
    }
}

impl Navigator for MemoryNavigator {
    fn path(&self) -> String {
        self.state.lock().current.path.clone()
    }

    fn hash(&self) -> String {
        self.state.lock().current.hash.clone()
    }

    fn query(&self) -> QueryMap {
        self.state.lock().current.query.clone()
    }

    fn params(&self) -> HashMap<String, String> {
        self.state.lock().params.clone()
    }

    fn full_path(&self) -> String {
        self.state.lock().current.full_path()
    }

    fn push(&self, location: Location) {
        tracing::debug!(target: targets::NAVIGATION, to = %location, "push");
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.current, location);
        state.history.push(previous);
    }

    fn replace(&self, location: Location) {
        tracing::debug!(target: targets::NAVIGATION, to = %location, "replace");
        self.state.lock().current = location;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse() {
        let location = Location::parse("/users?page=2&limit=5#top");
        assert_eq!(location.path, "/users");
        assert_eq!(location.query.get_positive("page"), Some(2));
        assert_eq!(location.hash, "top");
        assert_eq!(location.full_path(), "/users?limit=5&page=2#top");
    }

    #[test]
    fn test_push_and_back() {
        let nav = MemoryNavigator::at("/users");
        nav.push(Location::parse("/users?page=2"));
        assert_eq!(nav.full_path(), "/users?page=2");
        assert_eq!(nav.history_len(), 1);

        nav.replace(Location::parse("/users?page=3"));
        assert_eq!(nav.history_len(), 1);

        assert!(nav.back());
        assert_eq!(nav.full_path(), "/users");
        assert!(!nav.back());
    }
}
