//! The datasource engine.
//!
//! Every widget owns one [`Datasource`]. A datasource holds either a
//! collection of rows or a single current row, talks to a REST endpoint
//! through a [`Transport`], and (when `watch_url` is set) keeps its
//! pagination, ordering, search and filter state in sync with the query
//! string of the current location.
//!
//! # URL protocol
//!
//! With `watch_url`, the query string is the source of truth:
//!
//! - `page`, `limit`, `order` (repeated), `search` map onto the matching state.
//! - Every non-reserved key is a filter column.
//! - `filter=applied` marks that the user applied a filter through the UI.
//!   While the marker is present, the URL's filter columns replace the
//!   metadata's default filter instead of being merged into it.
//!
//! # Fetching
//!
//! A collection fetch sends `page`, `limit`, `order`, `search`/`search_in`,
//! every filter column and `in` (the list of filter column names). When the
//! response reports a `total` that leaves the requested page out of range,
//! the page is clamped to the last page and the fetch is reissued once.
//!
//! Locks are never held across an `.await`; concurrent fetches are not
//! fenced and the last response to arrive wins.

mod query;

pub use query::{FILTER_APPLIED, QueryMap, QueryValue, RESERVED_KEYS, is_reserved};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DatasourceError;
use crate::logging::targets;
use crate::metadata::DatasourceSpec;
use crate::navigation::{Location, Navigator};
use crate::transport::{RequestParams, Transport};

/// One record.
pub type Row = Map<String, Value>;

/// Filter column to value.
pub type FilterMap = BTreeMap<String, Value>;

/// Pages are numbered from one.
pub const FIRST_PAGE: u64 = 1;

/// Page size used when neither metadata nor configuration sets one.
pub const DEFAULT_LIMIT: u64 = 10;

/// Shape of the data a datasource manages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceType {
    /// A paginated list of rows.
    #[default]
    Collection,
    /// A single record.
    Row,
}

/// Pagination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PaginationPatch {
    page: Option<u64>,
    limit: Option<u64>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    data: Vec<Row>,
    #[serde(default)]
    pagination: Option<PaginationPatch>,
}

#[derive(Debug, Deserialize)]
struct RowResponse {
    data: Row,
}

/// Collaborators shared by every datasource of a build.
#[derive(Clone)]
pub struct DatasourceContext {
    pub transport: Option<Arc<dyn Transport>>,
    pub navigator: Option<Arc<dyn Navigator>>,
    /// Page size used when the metadata sets none.
    pub default_limit: u64,
}

impl Default for DatasourceContext {
    fn default() -> Self {
        Self {
            transport: None,
            navigator: None,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl fmt::Debug for DatasourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasourceContext")
            .field("transport", &self.transport.is_some())
            .field("navigator", &self.navigator.is_some())
            .field("default_limit", &self.default_limit)
            .finish()
    }
}

/// Whether a filter value is worth keeping: not null and not the empty string.
pub fn is_valid_filter_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 { 0 } else { total.div_ceil(limit) }
}

#[derive(Debug, Clone, Default)]
struct RequestDefaults {
    order: Option<Vec<String>>,
    filter: Option<FilterMap>,
    search: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

impl From<&DatasourceSpec> for RequestDefaults {
    fn from(spec: &DatasourceSpec) -> Self {
        Self {
            order: spec.order.clone(),
            filter: spec
                .filter
                .as_ref()
                .map(|f| f.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            search: spec.search.clone(),
            page: spec.page,
            limit: spec.limit,
        }
    }
}

#[derive(Debug)]
struct Settings {
    route: String,
    rest: bool,
    lazy_load: bool,
    watch_url: bool,
    datasource_type: DatasourceType,
    default_limit: u64,
}

#[derive(Debug, Clone)]
struct State {
    data: Vec<Row>,
    current_row: Row,
    pagination: Pagination,
    last_page: u64,
    filter: FilterMap,
    filter_applied: bool,
    order: Vec<String>,
    search: String,
    search_in: Vec<String>,
    loading: bool,
}

impl State {
    fn to_query(&self) -> QueryMap {
        let mut query = QueryMap::new();
        query.insert("page", self.pagination.page);
        query.insert("limit", self.pagination.limit);
        query.insert("order", self.order.clone());
        if !self.search.is_empty() {
            query.insert("search", self.search.clone());
        }
        if self.filter_applied {
            query.insert("filter", FILTER_APPLIED);
        }
        for (column, value) in &self.filter {
            if let Some(value) = QueryValue::from_json(value) {
                query.insert(column.clone(), value);
            }
        }
        query
    }

    fn collection_params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        params.push("page", self.pagination.page.to_string());
        params.push("limit", self.pagination.limit.to_string());
        params.push_all("order", self.order.iter().cloned());
        if !self.search.is_empty() {
            params.push("search", self.search.clone());
            params.push_all("search_in", self.search_in.iter().cloned());
        }
        for (column, value) in &self.filter {
            match QueryValue::from_json(value) {
                Some(QueryValue::Single(v)) => params.push(column.clone(), v),
                Some(QueryValue::Many(values)) => params.push_all(column, values),
                None => {}
            }
        }
        params.push_all("in", self.filter.keys().cloned());
        params
    }
}

struct Inner {
    settings: Settings,
    state: Mutex<State>,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
}

/// Shared handle to one widget's data.
///
/// Clones refer to the same state.
#[derive(Clone)]
pub struct Datasource {
    inner: Arc<Inner>,
}

impl Datasource {
    /// Build a datasource from metadata.
    ///
    /// `current_row` (from the owning widget) wins over the row given in datasource metadata.
    /// When the datasource watches the URL and the location does not match
    /// its state, the location is corrected with a replace.
    pub fn new(spec: &DatasourceSpec, current_row: Option<Row>, ctx: &DatasourceContext) -> Self {
        let watch_url = spec.watch_url == Some(true);
        let default_limit = spec
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(ctx.default_limit);
        let data = spec.data.clone().unwrap_or_default();
        let total = data.len() as u64;

        if watch_url && ctx.navigator.is_none() {
            tracing::warn!(
                target: targets::DATASOURCE,
                route = %spec.route,
                "datasource watches the URL but no navigator is configured"
            );
        }

        let datasource = Self {
            inner: Arc::new(Inner {
                settings: Settings {
                    route: spec.route.clone(),
                    rest: spec.rest != Some(false),
                    lazy_load: spec.lazy_load != Some(false),
                    watch_url,
                    datasource_type: spec.datasource_type.unwrap_or_default(),
                    default_limit,
                },
                state: Mutex::new(State {
                    data,
                    current_row: current_row
                        .or_else(|| spec.current_row.clone())
                        .unwrap_or_default(),
                    pagination: Pagination {
                        page: FIRST_PAGE,
                        limit: default_limit,
                        total,
                    },
                    last_page: page_count(total, default_limit),
                    filter: FilterMap::new(),
                    filter_applied: false,
                    order: Vec::new(),
                    search: String::new(),
                    search_in: spec.search_in.clone().unwrap_or_default(),
                    loading: false,
                }),
                transport: ctx.transport.clone(),
                navigator: ctx.navigator.clone(),
            }),
        };

        datasource.update_request_properties(&RequestDefaults::from(spec));
        datasource.sync_url();
        datasource
    }

    pub fn route(&self) -> &str {
        &self.inner.settings.route
    }

    pub fn rest(&self) -> bool {
        self.inner.settings.rest
    }

    pub fn lazy_load(&self) -> bool {
        self.inner.settings.lazy_load
    }

    pub fn watch_url(&self) -> bool {
        self.inner.settings.watch_url
    }

    pub fn datasource_type(&self) -> DatasourceType {
        self.inner.settings.datasource_type
    }

    pub fn default_limit(&self) -> u64 {
        self.inner.settings.default_limit
    }

    pub fn data(&self) -> Vec<Row> {
        self.inner.state.lock().data.clone()
    }

    pub fn current_row(&self) -> Row {
        self.inner.state.lock().current_row.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.inner.state.lock().pagination
    }

    /// `ceil(total / limit)` as of the last fetch.
    pub fn last_page(&self) -> u64 {
        self.inner.state.lock().last_page
    }

    pub fn filter(&self) -> FilterMap {
        self.inner.state.lock().filter.clone()
    }

    /// Whether the URL's filter columns replace the default filter.
    pub fn filter_applied(&self) -> bool {
        self.inner.state.lock().filter_applied
    }

    pub fn order(&self) -> Vec<String> {
        self.inner.state.lock().order.clone()
    }

    pub fn search(&self) -> String {
        self.inner.state.lock().search.clone()
    }

    pub fn search_in(&self) -> Vec<String> {
        self.inner.state.lock().search_in.clone()
    }

    pub fn set_search_in(&self, columns: Vec<String>) {
        self.inner.state.lock().search_in = columns;
    }

    /// Whether a request is in flight.
    pub fn loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    /// Whether [`start`](Self::start) will issue a fetch.
    pub fn needs_initial_fetch(&self) -> bool {
        let settings = &self.inner.settings;
        settings.rest && !settings.route.is_empty() && !settings.lazy_load
    }

    pub fn current_row_value(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().current_row.get(key).cloned()
    }

    pub fn set_current_row_value(&self, key: impl Into<String>, value: Value) {
        self.inner.state.lock().current_row.insert(key.into(), value);
    }

    pub fn set_current_row(&self, row: Row) {
        self.inner.state.lock().current_row = row;
    }

    /// Replace the rows locally, updating `total` and `last_page`.
    pub fn set_data(&self, rows: Vec<Row>) {
        let mut state = self.inner.state.lock();
        state.pagination.total = rows.len() as u64;
        state.last_page = page_count(state.pagination.total, state.pagination.limit);
        state.data = rows;
    }

    /// The query string this datasource's state corresponds to.
    pub fn to_query(&self) -> QueryMap {
        self.inner.state.lock().to_query()
    }

    fn current_query(&self) -> QueryMap {
        self.inner
            .navigator
            .as_ref()
            .map(|navigator| navigator.query())
            .unwrap_or_default()
    }

    fn current_query_with_defaults(&self) -> QueryMap {
        let current = self.current_query();
        let mut query = QueryMap::new();
        query.insert(
            "page",
            current
                .get_non_empty("page")
                .map(str::to_string)
                .unwrap_or_else(|| FIRST_PAGE.to_string()),
        );
        query.insert(
            "limit",
            current
                .get_non_empty("limit")
                .map(str::to_string)
                .unwrap_or_else(|| self.default_limit().to_string()),
        );
        query.insert(
            "order",
            current.get("order").map(QueryValue::to_vec).unwrap_or_default(),
        );
        for key in ["search", "filter"] {
            if let Some(value) = current.get_non_empty(key) {
                query.insert(key, value);
            }
        }
        for (column, value) in current.filter_columns() {
            query.insert(column.clone(), value.clone());
        }
        query
    }

    /// Whether the location's query differs from this datasource's state,
    /// compared in canonical form. Always `false` without `watch_url`.
    pub fn query_string_has_changed(&self) -> bool {
        if !self.watch_url() {
            return false;
        }
        let current = self.current_query_with_defaults().to_query_string();
        let own = self.to_query().to_query_string();
        current != own
    }

    /// Replace the location with this datasource's query when they differ.
    ///
    /// Returns whether the location was replaced.
    pub fn sync_url(&self) -> bool {
        if !self.query_string_has_changed() {
            return false;
        }
        let query = self.to_query();
        tracing::debug!(target: targets::DATASOURCE, route = %self.route(), %query, "correcting location");
        self.navigate(query, true);
        true
    }

    fn update_request_properties(&self, defaults: &RequestDefaults) {
        let watch_url = self.watch_url();
        let query = if watch_url {
            self.current_query()
        } else {
            QueryMap::new()
        };
        let url_filter: FilterMap = query
            .filter_columns()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();
        let filter_applied = query.get_non_empty("filter").is_some();

        let mut state = self.inner.state.lock();
        state.order = match query.get("order") {
            Some(order) if !order.is_empty() => order.to_vec(),
            _ => defaults.order.clone().unwrap_or_default(),
        };
        state.filter_applied = filter_applied;
        state.filter = if filter_applied {
            url_filter
        } else {
            let mut filter = defaults.filter.clone().unwrap_or_default();
            filter.retain(|column, value| !is_reserved(column) && is_valid_filter_value(value));
            filter.extend(url_filter);
            filter
        };
        state.search = query
            .get_non_empty("search")
            .map(str::to_string)
            .or_else(|| defaults.search.clone())
            .unwrap_or_default();
        state.pagination.page = query
            .get_positive("page")
            .or(defaults.page.filter(|page| *page > 0))
            .unwrap_or(FIRST_PAGE);
        state.pagination.limit = query
            .get_positive("limit")
            .or(defaults.limit.filter(|limit| *limit > 0))
            .unwrap_or(self.inner.settings.default_limit);
    }

    fn navigate(&self, query: QueryMap, replace: bool) {
        let Some(navigator) = &self.inner.navigator else {
            tracing::warn!(target: targets::DATASOURCE, route = %self.route(), "no navigator to update");
            return;
        };
        let location = Location {
            path: navigator.path(),
            query,
            hash: navigator.hash(),
        };
        if replace {
            navigator.replace(location);
        } else {
            navigator.push(location);
        }
    }

    fn update_query_string(&self, patch: QueryMap, replace: bool) {
        let mut query = self.current_query();
        for (key, value) in patch.iter() {
            match value {
                QueryValue::Many(values) if values.is_empty() => {
                    query.remove(key);
                }
                _ => {
                    query.insert(key.clone(), value.clone());
                }
            }
        }
        self.navigate(query, replace);
    }

    fn update_filter(&self) {
        let filter = {
            let mut state = self.inner.state.lock();
            state.pagination.page = FIRST_PAGE;
            if self.watch_url() {
                state.filter_applied = true;
            }
            state.filter.clone()
        };
        if !self.watch_url() {
            return;
        }

        let mut query = self.current_query();
        query.retain(|key, _| is_reserved(key));
        query.insert("page", FIRST_PAGE);
        for (column, value) in &filter {
            if let Some(value) = QueryValue::from_json(value) {
                query.insert(column.clone(), value);
            }
        }
        query.insert("filter", FILTER_APPLIED);
        self.navigate(query, false);
    }

    /// Set the search text and go back to the first page.
    pub fn set_search(&self, search: impl Into<String>) {
        let search = search.into();
        {
            let mut state = self.inner.state.lock();
            state.search = search.clone();
            state.pagination.page = FIRST_PAGE;
        }
        if !self.watch_url() {
            return;
        }
        if search.is_empty() {
            let mut query = self.current_query();
            query.remove("search");
            query.insert("page", FIRST_PAGE);
            self.navigate(query, false);
        } else {
            let patch: QueryMap = [("search", QueryValue::from(search)), ("page", FIRST_PAGE.into())]
                .into_iter()
                .collect();
            self.update_query_string(patch, false);
        }
    }

    /// Replace the whole filter. Reserved keys and empty values are dropped.
    pub fn set_filter(&self, filter: FilterMap) {
        {
            let mut state = self.inner.state.lock();
            state.filter = filter
                .into_iter()
                .filter(|(column, value)| !is_reserved(column) && is_valid_filter_value(value))
                .collect();
        }
        self.update_filter();
    }

    /// Set one filter column. `null` or `""` removes the column instead.
    pub fn add_filter(&self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        if is_reserved(column) {
            tracing::warn!(target: targets::DATASOURCE, column, "reserved key cannot be a filter column");
            return;
        }
        if !is_valid_filter_value(&value) {
            self.remove_filter(column);
            return;
        }
        self.inner
            .state
            .lock()
            .filter
            .insert(column.to_string(), value);
        self.update_filter();
    }

    pub fn remove_filter(&self, column: &str) {
        self.inner.state.lock().filter.remove(column);
        self.update_filter();
    }

    pub fn clear_filter(&self) {
        self.inner.state.lock().filter.clear();
        self.update_filter();
    }

    pub fn set_limit(&self, limit: u64, replace: bool) {
        self.inner.state.lock().pagination.limit = limit;
        if self.watch_url() {
            self.update_query_string([("limit", limit)].into_iter().collect(), replace);
        }
    }

    pub fn set_page(&self, page: u64, replace: bool) {
        self.inner.state.lock().pagination.page = page;
        if self.watch_url() {
            self.update_query_string([("page", page)].into_iter().collect(), replace);
        }
    }

    fn update_order_query_string(&self) {
        if !self.watch_url() {
            return;
        }
        let order = self.order();
        self.update_query_string([("order", order)].into_iter().collect(), false);
    }

    /// Replace every ordering entry (`"column.direction"`).
    pub fn set_order(&self, order: Vec<String>) {
        self.inner.state.lock().order = order;
        self.update_order_query_string();
    }

    /// Order by `column` in `direction`, replacing any existing entry for the column.
    pub fn add_order(&self, column: &str, direction: &str) {
        {
            let mut state = self.inner.state.lock();
            let entry = format!("{column}.{direction}");
            match state
                .order
                .iter()
                .position(|existing| order_column(existing) == column)
            {
                Some(position) => state.order[position] = entry,
                None => state.order.push(entry),
            }
        }
        self.update_order_query_string();
    }

    /// Drop the ordering entry for `column`. The location is only updated
    /// when an entry was removed.
    pub fn remove_order(&self, column: &str) {
        let removed = {
            let mut state = self.inner.state.lock();
            let before = state.order.len();
            state.order.retain(|existing| order_column(existing) != column);
            state.order.len() != before
        };
        if removed {
            self.update_order_query_string();
        }
    }

    pub fn clear_order(&self) {
        self.inner.state.lock().order.clear();
        self.update_order_query_string();
    }

    /// Direction `column` is ordered by, if any.
    pub fn order_by_column(&self, column: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .order
            .iter()
            .find(|existing| order_column(existing) == column)
            .and_then(|existing| existing.rsplit_once('.'))
            .map(|(_, direction)| direction.to_string())
    }

    fn transport(&self) -> Result<Arc<dyn Transport>, DatasourceError> {
        self.inner
            .transport
            .clone()
            .ok_or_else(|| DatasourceError::NoTransport(self.route().to_string()))
    }

    fn begin_fetch(&self) -> RequestParams {
        if self.datasource_type() == DatasourceType::Row {
            self.inner.state.lock().loading = true;
            return RequestParams::new();
        }
        // without a navigator there is no location to read back
        if self.watch_url() && self.inner.navigator.is_some() {
            self.update_request_properties(&RequestDefaults::default());
        }
        let mut state = self.inner.state.lock();
        state.loading = true;
        state.collection_params()
    }

    fn apply_row(&self, body: &Value) -> Result<(), DatasourceError> {
        let response = RowResponse::deserialize(body).map_err(|e| self.invalid_response(e))?;
        self.inner.state.lock().current_row = response.data;
        Ok(())
    }

    /// Store a collection response. Returns the page to clamp to when the
    /// requested page lies past the last page.
    fn apply_collection(&self, body: &Value) -> Result<Option<u64>, DatasourceError> {
        let response = CollectionResponse::deserialize(body).map_err(|e| self.invalid_response(e))?;
        let mut state = self.inner.state.lock();
        let rows = response.data.len() as u64;
        state.data = response.data;
        match response.pagination {
            Some(patch) => {
                if let Some(page) = patch.page {
                    state.pagination.page = page;
                }
                if let Some(limit) = patch.limit {
                    state.pagination.limit = limit;
                }
                if let Some(total) = patch.total {
                    state.pagination.total = total;
                }
            }
            None => state.pagination.total = rows,
        }
        state.last_page = page_count(state.pagination.total, state.pagination.limit);
        let last_page = state.last_page;
        Ok((last_page > 0 && last_page < state.pagination.page).then_some(last_page))
    }

    fn invalid_response(&self, error: serde_json::Error) -> DatasourceError {
        DatasourceError::InvalidResponse {
            route: self.route().to_string(),
            message: error.to_string(),
        }
    }

    /// Fetch from the route and store the result.
    ///
    /// Returns the body of the last response. Local datasources (`rest`
    /// false) never touch the network; their pagination is recomputed from
    /// the rows they hold.
    #[tracing::instrument(skip(self), fields(route = %self.route()), target = "horizon_compose_core::datasource", level = "debug")]
    pub async fn fetch(&self) -> Result<Value, DatasourceError> {
        if !self.rest() {
            let rows = self.data();
            self.set_data(rows);
            return Ok(Value::Null);
        }
        let transport = self.transport()?;
        let route = self.route().to_string();
        let mut clamped = false;

        loop {
            let params = self.begin_fetch();
            tracing::debug!(target: targets::DATASOURCE, ?params, "fetching");
            let result = transport.get(route.clone(), params).await;
            self.inner.state.lock().loading = false;
            let body = result.map_err(|source| DatasourceError::Request {
                route: route.clone(),
                source,
            })?;

            if self.datasource_type() == DatasourceType::Row {
                self.apply_row(&body)?;
                return Ok(body);
            }
            match self.apply_collection(&body)? {
                Some(last_page) if !clamped => {
                    tracing::debug!(target: targets::DATASOURCE, last_page, "page out of range, refetching");
                    clamped = true;
                    self.set_page(last_page, true);
                }
                _ => return Ok(body),
            }
        }
    }

    /// Same as [`fetch`](Self::fetch).
    pub async fn reload(&self) -> Result<Value, DatasourceError> {
        self.fetch().await
    }

    /// Correct the location, then fetch if the datasource loads eagerly.
    pub async fn start(&self) -> Result<(), DatasourceError> {
        self.sync_url();
        if self.needs_initial_fetch() {
            self.fetch().await?;
        }
        Ok(())
    }

    fn target_route(&self, route: Option<&str>) -> String {
        route.unwrap_or(self.route()).to_string()
    }

    /// POST `body` to the route (or `route` when given).
    pub async fn post(&self, body: Value, route: Option<&str>) -> Result<Value, DatasourceError> {
        let route = self.target_route(route);
        let transport = self.transport()?;
        transport
            .post(route.clone(), body)
            .await
            .map_err(|source| DatasourceError::Request { route, source })
    }

    /// PUT `body` to the route (or `route` when given).
    pub async fn put(&self, body: Value, route: Option<&str>) -> Result<Value, DatasourceError> {
        let route = self.target_route(route);
        let transport = self.transport()?;
        transport
            .put(route.clone(), body)
            .await
            .map_err(|source| DatasourceError::Request { route, source })
    }

    /// DELETE the route (or `route` when given).
    pub async fn delete(&self, route: Option<&str>) -> Result<Value, DatasourceError> {
        let route = self.target_route(route);
        let transport = self.transport()?;
        transport
            .delete(route.clone())
            .await
            .map_err(|source| DatasourceError::Request { route, source })
    }
}

fn order_column(entry: &str) -> &str {
    entry.rsplit_once('.').map_or(entry, |(column, _)| column)
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Datasource")
            .field("route", &self.inner.settings.route)
            .field("type", &self.inner.settings.datasource_type)
            .field("watch_url", &self.inner.settings.watch_url)
            .field("pagination", &state.pagination)
            .field("rows", &state.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use futures_util::FutureExt;
    use serde_json::json;

    use crate::error::TransportError;
    use crate::navigation::MemoryNavigator;
    use crate::transport::TransportFuture;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: parking_lot::Mutex<VecDeque<Result<Value, TransportError>>>,
        requests: parking_lot::Mutex<Vec<(String, RequestParams)>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: parking_lot::Mutex::new(responses.into()),
                requests: Default::default(),
            })
        }

        fn next(&self) -> Result<Value, TransportError> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Ok(json!({"data": []})))
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, route: String, params: RequestParams) -> TransportFuture<'_> {
            self.requests.lock().push((route, params));
            let response = self.next();
            async move { response }.boxed()
        }

        fn post(&self, route: String, _body: Value) -> TransportFuture<'_> {
            self.requests.lock().push((route, RequestParams::new()));
            let response = self.next();
            async move { response }.boxed()
        }

        fn put(&self, route: String, _body: Value) -> TransportFuture<'_> {
            self.requests.lock().push((route, RequestParams::new()));
            let response = self.next();
            async move { response }.boxed()
        }

        fn delete(&self, route: String) -> TransportFuture<'_> {
            self.requests.lock().push((route, RequestParams::new()));
            let response = self.next();
            async move { response }.boxed()
        }
    }

    fn spec(value: Value) -> DatasourceSpec {
        serde_json::from_value(value).unwrap()
    }

    fn ctx(transport: Option<Arc<ScriptedTransport>>, navigator: Option<Arc<MemoryNavigator>>) -> DatasourceContext {
        DatasourceContext {
            transport: transport.map(|t| t as Arc<dyn Transport>),
            navigator: navigator.map(|n| n as Arc<dyn Navigator>),
            default_limit: DEFAULT_LIMIT,
        }
    }

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i})).collect()
    }

    #[test]
    fn test_defaults() {
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(None, None));
        assert!(ds.rest());
        assert!(ds.lazy_load());
        assert!(!ds.watch_url());
        assert_eq!(ds.datasource_type(), DatasourceType::Collection);
        assert_eq!(ds.pagination(), Pagination { page: 1, limit: 10, total: 0 });
        assert!(!ds.needs_initial_fetch());
    }

    #[test]
    fn test_local_data_sets_total() {
        let ds = Datasource::new(
            &spec(json!({"rest": false, "data": rows(3), "limit": 2})),
            None,
            &ctx(None, None),
        );
        assert_eq!(ds.pagination().total, 3);
        assert_eq!(ds.last_page(), 2);
    }

    #[test]
    fn test_add_filter_validity() {
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(None, None));
        ds.add_filter("status", "open");
        ds.add_filter("count", 0);
        assert_eq!(ds.filter().get("count"), Some(&json!(0)));

        ds.add_filter("status", "");
        assert!(!ds.filter().contains_key("status"));

        ds.add_filter("count", Value::Null);
        assert!(ds.filter().is_empty());
    }

    #[test]
    fn test_reserved_keys_never_become_filters() {
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "filter": {"page": 3, "status": "open"}})),
            None,
            &ctx(None, None),
        );
        assert_eq!(ds.filter().keys().collect::<Vec<_>>(), vec!["status"]);

        ds.add_filter("limit", 5);
        let mut filter = FilterMap::new();
        filter.insert("search".into(), json!("x"));
        filter.insert("owner".into(), json!("me"));
        ds.set_filter(filter);
        assert_eq!(ds.filter().keys().collect::<Vec<_>>(), vec!["owner"]);
    }

    #[test]
    fn test_filter_and_search_reset_page() {
        let ds = Datasource::new(&spec(json!({"route": "/users", "page": 4})), None, &ctx(None, None));
        assert_eq!(ds.pagination().page, 4);
        ds.add_filter("status", "open");
        assert_eq!(ds.pagination().page, 1);

        ds.set_page(3, false);
        ds.set_search("jane");
        assert_eq!(ds.pagination().page, 1);
        assert_eq!(ds.search(), "jane");
    }

    #[test]
    fn test_order_helpers() {
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(None, None));
        ds.add_order("name", "asc");
        ds.add_order("created.at", "desc");
        ds.add_order("name", "desc");
        assert_eq!(ds.order(), vec!["name.desc", "created.at.desc"]);
        assert_eq!(ds.order_by_column("name").as_deref(), Some("desc"));
        assert_eq!(ds.order_by_column("created.at").as_deref(), Some("desc"));
        assert_eq!(ds.order_by_column("missing"), None);

        ds.remove_order("name");
        assert_eq!(ds.order(), vec!["created.at.desc"]);
        ds.clear_order();
        assert!(ds.order().is_empty());
    }

    #[test]
    fn test_watch_url_reads_location() {
        let nav = Arc::new(MemoryNavigator::at(
            "/users?page=3&limit=5&customCol=foo&filter=applied",
        ));
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true, "filter": {"x": 1}})),
            None,
            &ctx(None, Some(nav.clone())),
        );

        assert_eq!(ds.pagination().page, 3);
        assert_eq!(ds.pagination().limit, 5);
        assert!(ds.filter_applied());
        let filter = ds.filter();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.get("customCol"), Some(&json!("foo")));
        // location already canonical: no correction
        assert!(!ds.query_string_has_changed());
        assert_eq!(nav.history_len(), 0);
    }

    #[test]
    fn test_watch_url_merges_default_filter_without_marker() {
        let nav = Arc::new(MemoryNavigator::at("/users?status=open"));
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true, "filter": {"x": 1}})),
            None,
            &ctx(None, Some(nav.clone())),
        );
        let filter = ds.filter();
        assert_eq!(filter.get("x"), Some(&json!(1)));
        assert_eq!(filter.get("status"), Some(&json!("open")));

        // the default filter column was written back with a replace
        assert_eq!(nav.history_len(), 0);
        let query = nav.query();
        assert_eq!(query.get_str("x"), Some("1"));
        assert_eq!(query.get_str("page"), Some("1"));
        assert_eq!(query.get_str("limit"), Some("10"));
    }

    #[test]
    fn test_filter_mutation_pushes_reserved_keys_and_marker() {
        let nav = Arc::new(MemoryNavigator::at("/users?page=4&limit=5&search=jo&old=1&filter=applied"));
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true})),
            None,
            &ctx(None, Some(nav.clone())),
        );
        let before = nav.history_len();

        ds.clear_filter();
        ds.add_filter("status", "open");

        assert_eq!(nav.history_len(), before + 2);
        let query = nav.query();
        assert_eq!(query.get_str("page"), Some("1"));
        assert_eq!(query.get_str("limit"), Some("5"));
        assert_eq!(query.get_str("search"), Some("jo"));
        assert_eq!(query.get_str("filter"), Some(FILTER_APPLIED));
        assert_eq!(query.get_str("status"), Some("open"));
        assert!(!query.contains_key("old"));
    }

    #[test]
    fn test_set_search_empty_removes_key() {
        let nav = Arc::new(MemoryNavigator::at("/users?page=2&limit=10&search=jo"));
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true})),
            None,
            &ctx(None, Some(nav.clone())),
        );
        assert_eq!(ds.search(), "jo");
        ds.set_search("");
        let query = nav.query();
        assert!(!query.contains_key("search"));
        assert_eq!(query.get_str("page"), Some("1"));
    }

    #[test]
    fn test_order_written_to_location() {
        let nav = Arc::new(MemoryNavigator::at("/users?page=1&limit=10"));
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true})),
            None,
            &ctx(None, Some(nav.clone())),
        );
        ds.add_order("name", "asc");
        ds.add_order("id", "desc");
        assert_eq!(
            nav.query().get("order"),
            Some(&QueryValue::Many(vec!["name.asc".into(), "id.desc".into()]))
        );
        ds.clear_order();
        assert!(!nav.query().contains_key("order"));
    }

    #[test]
    fn test_remove_missing_order_leaves_location() {
        let nav = Arc::new(MemoryNavigator::at("/x?page=1&limit=10"));
        let ds = Datasource::new(
            &spec(json!({"route": "/x", "watchUrl": true})),
            None,
            &ctx(None, Some(nav.clone())),
        );
        let before = nav.history_len();

        ds.remove_order("nope");
        assert_eq!(nav.history_len(), before);

        ds.add_order("name", "asc");
        ds.remove_order("name");
        assert_eq!(nav.history_len(), before + 2);
        assert!(!nav.query().contains_key("order"));
    }

    #[test]
    fn test_state_survives_location_round_trip() {
        let nav = Arc::new(MemoryNavigator::at("/x"));
        let watching = json!({"route": "/x", "watchUrl": true});
        let source = Datasource::new(&spec(watching.clone()), None, &ctx(None, Some(nav.clone())));
        source.set_limit(50, false);
        source.set_order(vec!["name.asc".into()]);
        source.set_search("foo");
        source.add_filter("id", "9");
        source.set_page(2, false);

        let rebuilt = Datasource::new(&spec(watching), None, &ctx(None, Some(nav.clone())));
        assert_eq!(rebuilt.pagination().page, 2);
        assert_eq!(rebuilt.pagination().limit, 50);
        assert_eq!(rebuilt.pagination().page, source.pagination().page);
        assert_eq!(rebuilt.pagination().limit, source.pagination().limit);
        assert_eq!(rebuilt.order(), vec!["name.asc"]);
        assert_eq!(rebuilt.order(), source.order());
        assert_eq!(rebuilt.search(), "foo");
        assert_eq!(rebuilt.search(), source.search());
        assert_eq!(rebuilt.filter().get("id"), Some(&json!("9")));
        assert_eq!(rebuilt.filter(), source.filter());
        assert!(!rebuilt.query_string_has_changed());
    }

    #[tokio::test]
    async fn test_watch_url_without_navigator_keeps_state() {
        let transport = ScriptedTransport::with(Vec::new());
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.add_order("name", "asc");
        ds.set_search("jo");
        ds.add_filter("status", "open");
        ds.set_page(3, false);

        ds.fetch().await.unwrap();

        let requests = transport.requests.lock();
        let (_, params) = &requests[0];
        assert_eq!(params.get("page"), Some("3"));
        assert_eq!(params.get_all("order"), vec!["name.asc"]);
        assert_eq!(params.get("search"), Some("jo"));
        assert_eq!(params.get_all("status"), vec!["open"]);
        drop(requests);
        assert_eq!(ds.search(), "jo");
    }

    #[tokio::test]
    async fn test_collection_fetch_params() {
        let transport = ScriptedTransport::with(vec![Ok(json!({
            "data": rows(2),
            "pagination": {"total": 2}
        }))]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "order": ["name.asc"], "filter": {"status": ["open", "new"]}})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.set_search("jo");
        ds.set_search_in(vec!["name".into(), "email".into()]);

        ds.fetch().await.unwrap();

        let requests = transport.requests.lock();
        let (route, params) = &requests[0];
        assert_eq!(route, "/users");
        assert_eq!(params.get("page"), Some("1"));
        assert_eq!(params.get("limit"), Some("10"));
        assert_eq!(params.get_all("order"), vec!["name.asc"]);
        assert_eq!(params.get("search"), Some("jo"));
        assert_eq!(params.get_all("search_in"), vec!["name", "email"]);
        assert_eq!(params.get_all("status"), vec!["open", "new"]);
        assert_eq!(params.get_all("in"), vec!["status"]);
        drop(requests);

        assert_eq!(ds.data().len(), 2);
        assert_eq!(ds.last_page(), 1);
        assert!(!ds.loading());
    }

    #[tokio::test]
    async fn test_search_in_omitted_without_search() {
        let transport = ScriptedTransport::with(vec![]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "searchIn": ["name"]})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.fetch().await.unwrap();
        let requests = transport.requests.lock();
        assert!(!requests[0].1.contains_key("search"));
        assert!(!requests[0].1.contains_key("search_in"));
        assert!(!requests[0].1.contains_key("in"));
    }

    #[tokio::test]
    async fn test_out_of_range_page_clamps_and_refetches_once() {
        let transport = ScriptedTransport::with(vec![
            Ok(json!({"data": [], "pagination": {"total": 19}})),
            Ok(json!({"data": rows(9), "pagination": {"total": 19}})),
        ]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "page": 5})),
            None,
            &ctx(Some(transport.clone()), None),
        );

        ds.fetch().await.unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1.get("page"), Some("5"));
        assert_eq!(requests[1].1.get("page"), Some("2"));
        drop(requests);
        assert_eq!(ds.last_page(), 2);
        assert_eq!(ds.pagination().page, 2);
        assert_eq!(ds.data().len(), 9);
    }

    #[tokio::test]
    async fn test_clamp_replaces_location_page() {
        let nav = Arc::new(MemoryNavigator::at("/users?page=5&limit=10"));
        let transport = ScriptedTransport::with(vec![
            Ok(json!({"data": [], "pagination": {"total": 19}})),
            Ok(json!({"data": rows(9), "pagination": {"total": 19}})),
        ]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "watchUrl": true})),
            None,
            &ctx(Some(transport.clone()), Some(nav.clone())),
        );

        ds.fetch().await.unwrap();

        assert_eq!(nav.query().get_str("page"), Some("2"));
        assert_eq!(nav.history_len(), 0);
        assert_eq!(transport.requests.lock()[1].1.get("page"), Some("2"));
    }

    #[tokio::test]
    async fn test_zero_total_does_not_clamp() {
        let transport = ScriptedTransport::with(vec![Ok(json!({"data": [], "pagination": {"total": 0}}))]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "page": 3})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.fetch().await.unwrap();
        assert_eq!(transport.requests.lock().len(), 1);
        assert_eq!(ds.last_page(), 0);
        assert_eq!(ds.pagination().page, 3);
    }

    #[tokio::test]
    async fn test_row_fetch() {
        let transport = ScriptedTransport::with(vec![Ok(json!({"data": {"id": 7, "name": "Jane"}}))]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users/7", "type": "row"})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.fetch().await.unwrap();
        assert!(transport.requests.lock()[0].1.is_empty());
        assert_eq!(ds.current_row_value("name"), Some(json!("Jane")));
    }

    #[tokio::test]
    async fn test_failure_clears_loading() {
        let transport = ScriptedTransport::with(vec![Err(TransportError::HttpStatus {
            status: 500,
            message: None,
        })]);
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(Some(transport), None));
        let err = ds.fetch().await.unwrap_err();
        assert!(matches!(err, DatasourceError::Request { ref route, .. } if route == "/users"));
        assert!(!ds.loading());
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let transport = ScriptedTransport::with(vec![Ok(json!({"data": "nope"}))]);
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(Some(transport), None));
        assert!(matches!(
            ds.fetch().await,
            Err(DatasourceError::InvalidResponse { .. })
        ));
        assert!(!ds.loading());
    }

    #[tokio::test]
    async fn test_local_datasource_never_fetches() {
        let transport = ScriptedTransport::with(vec![]);
        let ds = Datasource::new(
            &spec(json!({"route": "/users", "rest": false, "lazyLoad": false, "data": rows(4)})),
            None,
            &ctx(Some(transport.clone()), None),
        );
        ds.start().await.unwrap();
        ds.fetch().await.unwrap();
        assert!(transport.requests.lock().is_empty());
        assert_eq!(ds.pagination().total, 4);
    }

    #[tokio::test]
    async fn test_writes_use_route_override() {
        let transport = ScriptedTransport::with(vec![Ok(json!({"ok": true})), Ok(json!({})), Ok(json!({}))]);
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(Some(transport.clone()), None));
        assert_eq!(ds.post(json!({"name": "a"}), None).await.unwrap(), json!({"ok": true}));
        ds.put(json!({"name": "b"}), Some("/users/1")).await.unwrap();
        ds.delete(Some("/users/1")).await.unwrap();

        let routes: Vec<String> = transport.requests.lock().iter().map(|(r, _)| r.clone()).collect();
        assert_eq!(routes, vec!["/users", "/users/1", "/users/1"]);
    }

    #[tokio::test]
    async fn test_missing_transport() {
        let ds = Datasource::new(&spec(json!({"route": "/users"})), None, &ctx(None, None));
        assert_eq!(
            ds.fetch().await.unwrap_err(),
            DatasourceError::NoTransport("/users".into())
        );
    }
}
