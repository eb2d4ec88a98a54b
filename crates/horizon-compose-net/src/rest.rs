//! REST transport.
//!
//! [`RestTransport`] implements the core [`Transport`] boundary over
//! `reqwest`: routes are appended to a base URL, request parameters become
//! query pairs (repeated keys stay repeated), bodies are sent as JSON and
//! responses are decoded as JSON.
//!
//! # Example
//!
//! ```ignore
//! use horizon_compose_net::RestTransport;
//!
//! let transport = RestTransport::builder("https://api.example.com")
//!     .bearer_auth("my-token")
//!     .json_api()
//!     .build()?;
//!
//! let session = BuildSession::builder()
//!     .transport(Arc::new(transport))
//!     .build();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use horizon_compose_core::{RequestParams, Transport, TransportError, TransportFuture};
use http::Method;
use serde_json::Value;
use url::Url;

use crate::error::{NetworkError, Result};

const TARGET: &str = "horizon_compose_net::rest";

/// Authentication method for REST APIs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiAuth {
    /// Bearer token authentication (Authorization: Bearer <token>).
    Bearer(String),
    /// API key in a custom header.
    ApiKey {
        /// Header name (e.g., "X-API-Key").
        header: String,
        /// API key value.
        value: String,
    },
    /// HTTP Basic authentication.
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// A request about to be sent, as request interceptors see it.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: http::HeaderMap,
    pub body: Option<Value>,
}

/// Called in order before each request is sent.
pub type RequestInterceptor = Arc<dyn Fn(&mut OutgoingRequest) + Send + Sync>;

/// Called in order after each successful response, with the status and the
/// decoded body. Returning an error fails the request.
pub type ResponseInterceptor = Arc<dyn Fn(u16, &Value) -> Result<()> + Send + Sync>;

/// Builder for [`RestTransport`].
pub struct RestTransportBuilder {
    base_url: String,
    default_headers: http::HeaderMap,
    auth: Option<ApiAuth>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
}

impl RestTransportBuilder {
    /// Create a builder. Relative routes are appended to `base_url`; an
    /// empty base URL accepts absolute routes only.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: http::HeaderMap::new(),
            auth: None,
            timeout: None,
            user_agent: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Add a header sent with every request. Invalid names or values are
    /// ignored.
    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Self {
        if let (Ok(name), Ok(value)) = (name.try_into(), value.try_into()) {
            self.default_headers.insert(name, value);
        }
        self
    }

    /// Set both Accept and Content-Type to application/json.
    pub fn json_api(self) -> Self {
        self.default_header("Accept", "application/json")
            .default_header("Content-Type", "application/json")
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(ApiAuth::Bearer(token.into()));
        self
    }

    pub fn api_key(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.auth = Some(ApiAuth::ApiKey {
            header: header.into(),
            value: key.into(),
        });
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<impl Into<String>>) -> Self {
        self.auth = Some(ApiAuth::Basic {
            username: username.into(),
            password: password.map(Into::into),
        });
        self
    }

    pub fn auth(mut self, auth: ApiAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Timeout applied to every request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn add_request_interceptor<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(&mut OutgoingRequest) + Send + Sync + 'static,
    {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn add_response_interceptor<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(u16, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> Result<RestTransport> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        if !base_url.is_empty() {
            Url::parse(&base_url)?;
        }

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            client = client.user_agent(user_agent);
        }

        Ok(RestTransport {
            inner: Arc::new(RestTransportInner {
                client: client.build()?,
                base_url,
                default_headers: self.default_headers,
                auth: self.auth,
                request_interceptors: self.request_interceptors,
                response_interceptors: self.response_interceptors,
            }),
        })
    }
}

struct RestTransportInner {
    client: reqwest::Client,
    base_url: String,
    default_headers: http::HeaderMap,
    auth: Option<ApiAuth>,
    request_interceptors: Vec<RequestInterceptor>,
    response_interceptors: Vec<ResponseInterceptor>,
}

/// JSON-over-HTTP implementation of [`Transport`].
#[derive(Clone)]
pub struct RestTransport {
    inner: Arc<RestTransportInner>,
}

impl RestTransport {
    pub fn builder(base_url: impl Into<String>) -> RestTransportBuilder {
        RestTransportBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Full URL for `route`. Absolute routes are used as they are.
    pub fn resolve(&self, route: &str) -> Result<Url> {
        if route.starts_with("http://") || route.starts_with("https://") {
            return Ok(Url::parse(route)?);
        }
        if self.inner.base_url.is_empty() {
            return Err(NetworkError::InvalidUrl(format!(
                "relative route '{route}' without a base URL"
            )));
        }
        let separator = if route.starts_with('/') { "" } else { "/" };
        Ok(Url::parse(&format!("{}{separator}{route}", self.inner.base_url))?)
    }

    /// Send one request and decode the JSON response.
    ///
    /// An empty response body decodes to `Value::Null`.
    pub async fn execute(
        &self,
        method: Method,
        route: &str,
        params: Option<&RequestParams>,
        body: Option<Value>,
    ) -> Result<Value> {
        let inner = &self.inner;
        let mut url = self.resolve(route)?;
        if let Some(params) = params.filter(|params| !params.is_empty()) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params.pairs() {
                pairs.append_pair(key, value);
            }
        }

        let mut request = OutgoingRequest {
            method,
            url,
            headers: inner.default_headers.clone(),
            body,
        };
        if let Some(ApiAuth::ApiKey { header, value }) = &inner.auth {
            let name = http::HeaderName::try_from(header.as_str())?;
            request.headers.insert(name, http::HeaderValue::try_from(value.as_str())?);
        }
        for interceptor in &inner.request_interceptors {
            interceptor(&mut request);
        }

        tracing::debug!(target: TARGET, method = %request.method, url = %request.url, "sending request");
        let mut builder = inner
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        match &inner.auth {
            Some(ApiAuth::Bearer(token)) => builder = builder.bearer_auth(token),
            Some(ApiAuth::Basic { username, password }) => {
                builder = builder.basic_auth(username, password.as_ref());
            }
            Some(ApiAuth::ApiKey { .. }) | None => {}
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::debug!(target: TARGET, status = status.as_u16(), "request failed");
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        for interceptor in &inner.response_interceptors {
            interceptor(status.as_u16(), &value)?;
        }
        Ok(value)
    }
}

/// The `message` of a JSON error body, or the raw body when it is not JSON.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(body.to_string())),
        _ => Some(body.to_string()),
    }
}

impl Transport for RestTransport {
    fn get(&self, route: String, params: RequestParams) -> TransportFuture<'_> {
        async move {
            self.execute(Method::GET, &route, Some(&params), None)
                .await
                .map_err(TransportError::from)
        }
        .boxed()
    }

    fn post(&self, route: String, body: Value) -> TransportFuture<'_> {
        async move {
            self.execute(Method::POST, &route, None, Some(body))
                .await
                .map_err(TransportError::from)
        }
        .boxed()
    }

    fn put(&self, route: String, body: Value) -> TransportFuture<'_> {
        async move {
            self.execute(Method::PUT, &route, None, Some(body))
                .await
                .map_err(TransportError::from)
        }
        .boxed()
    }

    fn delete(&self, route: String) -> TransportFuture<'_> {
        async move {
            self.execute(Method::DELETE, &route, None, None)
                .await
                .map_err(TransportError::from)
        }
        .boxed()
    }
}

impl fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTransport")
            .field("base_url", &self.inner.base_url)
            .field("has_auth", &self.inner.auth.is_some())
            .field("request_interceptors", &self.inner.request_interceptors.len())
            .field("response_interceptors", &self.inner.response_interceptors.len())
            .finish()
    }
}
