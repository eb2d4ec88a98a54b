//! Application configuration.
//!
//! Loaded from JSON or TOML. Keys are snake_case; the camelCase spellings
//! used by older configuration files are accepted as aliases.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::datasource::DEFAULT_LIMIT;
use crate::error::ConfigError;
use crate::logging::targets;

/// How the application is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

/// Settings shared by a build session and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Base URL datasource routes are resolved against.
    #[serde(alias = "endPoint")]
    pub endpoint: String,
    /// Base URL container metadata is fetched from.
    #[serde(alias = "metadataEndPoint")]
    pub metadata_endpoint: String,
    pub title: String,
    pub mode: RunMode,
    /// Page size for datasources whose metadata sets no limit.
    #[serde(alias = "datasourceLimit")]
    pub datasource_limit: u64,
    /// Metadata is bundled with the application instead of fetched.
    #[serde(alias = "staticAppMetadata")]
    pub static_metadata: bool,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            metadata_endpoint: String::new(),
            title: String::new(),
            mode: RunMode::default(),
            datasource_limit: DEFAULT_LIMIT,
            static_metadata: false,
        }
    }
}

impl ComposeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml)?)
    }

    /// Load from a file; `.toml` files are read as TOML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        tracing::debug!(target: targets::CONFIG, path = %path.display(), is_toml, "loading configuration");
        if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    pub fn is_development(&self) -> bool {
        self.mode == RunMode::Development
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = endpoint.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// A zero limit is ignored.
    pub fn with_datasource_limit(mut self, limit: u64) -> Self {
        if limit > 0 {
            self.datasource_limit = limit;
        }
        self
    }

    pub fn with_static_metadata(mut self, static_metadata: bool) -> Self {
        self.static_metadata = static_metadata;
        self
    }
}
