//! Error types for Horizon Compose.

use crate::hooks::Generation;

/// Errors raised when a widget or field cannot be found by name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No widget is registered under this name.
    #[error("Widget {0} not found")]
    WidgetNotFound(String),
    /// The widget exists but has no field under this name.
    #[error("Field {field} not found in widget {widget}")]
    FieldNotFound {
        /// The widget that was searched.
        widget: String,
        /// The missing field name.
        field: String,
    },
    /// The index was reset by a newer build; entries no longer refer to this container.
    #[error("Planned index belongs to generation {index}, container was built as generation {container}")]
    StaleGeneration {
        /// Generation currently held by the index.
        index: Generation,
        /// Generation of the container performing the lookup.
        container: Generation,
    },
}

/// Result type for name lookups.
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Errors raised while turning metadata into a component tree.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The metadata document is not valid JSON for the expected shape.
    #[error("Invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    /// An event handler reference is not of the form `Controller.method`.
    #[error("Malformed event handler '{handler}' for event '{event}'")]
    MalformedHandler {
        /// Event name.
        event: String,
        /// Handler reference as written in the metadata.
        handler: String,
    },
    /// The controller resolver does not know this handler.
    #[error("Method {method} not found on controller {controller} (event '{event}')")]
    UnresolvedHandler {
        /// Event name.
        event: String,
        /// Controller name.
        controller: String,
        /// Method name.
        method: String,
    },
    /// A field asked for a validation rule that is not registered.
    #[error("Validation {0} not found")]
    UnknownValidation(String),
    /// A lookup performed during the build failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Errors reported by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Optional error body.
        message: Option<String>,
    },
    /// The connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The request timed out.
    #[error("Request timed out")]
    Timeout,
    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),
    /// Any other transport failure.
    #[error("Request error: {0}")]
    Request(String),
}

impl TransportError {
    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by datasource network operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasourceError {
    /// The transport failed; the original error is kept as the source.
    #[error("Request to '{route}' failed: {source}")]
    Request {
        /// Route that was requested.
        route: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The response did not have the `{data, pagination?}` shape.
    #[error("Unexpected response from '{route}': {message}")]
    InvalidResponse {
        /// Route that was requested.
        route: String,
        /// Decoding problem.
        message: String,
    },
    /// The datasource has no transport to talk to.
    #[error("No transport configured for route '{0}'")]
    NoTransport(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON configuration could not be parsed.
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML configuration could not be parsed.
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// The main error type for Horizon Compose operations.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Lookup error.
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
    /// Build error.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),
    /// Datasource error.
    #[error("Datasource error: {0}")]
    Datasource(#[from] DatasourceError),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A specialized Result type for Horizon Compose operations.
pub type Result<T> = std::result::Result<T, ComposeError>;
