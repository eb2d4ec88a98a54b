//! Loading screen metadata over HTTP.

use std::sync::Arc;

use horizon_compose_core::{BuildError, BuildSession, ComposeConfig, ComposeError, Container, ContainerSpec};
use http::Method;

use crate::error::NetworkError;
use crate::rest::RestTransport;

const TARGET: &str = "horizon_compose_net::metadata";

/// Errors from [`MetadataLoader`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Metadata could not be fetched.
    #[error("Metadata request failed: {0}")]
    Network(#[from] NetworkError),
    /// The metadata document is not a valid container description.
    #[error("Invalid metadata for '{name}': {source}")]
    Metadata {
        name: String,
        #[source]
        source: BuildError,
    },
    /// Building or starting the container failed.
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Fetches container metadata by screen name.
///
/// Remote metadata lives at `{endpoint}{name}`. Local metadata lives at
/// `{origin}/metadata/{name}.json`. A missing document (HTTP 404) resolves
/// to [`ContainerSpec::not_found`].
#[derive(Debug, Clone)]
pub struct MetadataLoader {
    transport: RestTransport,
    endpoint: String,
    local_origin: Option<String>,
    prefer_local: bool,
    default_title: String,
}

impl MetadataLoader {
    pub fn new(transport: RestTransport, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            local_origin: None,
            prefer_local: false,
            default_title: String::new(),
        }
    }

    /// Loader for `config.metadata_endpoint`, using `config.title` as the
    /// fallback title and `config.static_metadata` to choose local files.
    pub fn from_config(config: &ComposeConfig) -> Result<Self, NetworkError> {
        let transport = RestTransport::builder("").json_api().build()?;
        Ok(Self {
            transport,
            endpoint: config.metadata_endpoint.clone(),
            local_origin: None,
            prefer_local: config.static_metadata,
            default_title: config.title.clone(),
        })
    }

    /// Origin serving bundled `metadata/*.json` files.
    pub fn with_local_origin(mut self, origin: impl Into<String>) -> Self {
        self.local_origin = Some(origin.into().trim_end_matches('/').to_string());
        self
    }

    pub fn prefer_local(mut self, prefer_local: bool) -> Self {
        self.prefer_local = prefer_local;
        self
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// URL of the metadata document for `name`.
    pub fn url(&self, name: &str, local: bool) -> Result<String, NetworkError> {
        if local {
            let origin = self
                .local_origin
                .as_deref()
                .ok_or_else(|| NetworkError::InvalidUrl("no local metadata origin".to_string()))?;
            Ok(format!("{origin}/metadata/{name}.json"))
        } else {
            Ok(format!("{}{name}", self.endpoint))
        }
    }

    /// Fetch metadata from the configured source.
    pub async fn load(&self, name: &str) -> Result<ContainerSpec, LoadError> {
        self.fetch(name, self.prefer_local).await
    }

    #[tracing::instrument(skip(self), target = "horizon_compose_net::metadata", level = "debug")]
    pub async fn fetch(&self, name: &str, local: bool) -> Result<ContainerSpec, LoadError> {
        let url = self.url(name, local)?;
        match self.transport.execute(Method::GET, &url, None, None).await {
            Ok(value) => ContainerSpec::from_value(value).map_err(|source| LoadError::Metadata {
                name: name.to_string(),
                source,
            }),
            Err(NetworkError::HttpStatus { status: 404, .. }) => {
                tracing::info!(target: TARGET, name, "metadata not found");
                Ok(ContainerSpec::not_found())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Page title: the container's own title, else the configured default.
    pub fn title_for(&self, spec: &ContainerSpec) -> String {
        spec.title
            .clone()
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| self.default_title.clone())
    }

    /// Load `name`, then build and start it in `session`.
    pub async fn open(&self, session: &BuildSession, name: &str) -> Result<Arc<Container>, LoadError> {
        let spec = self.load(name).await?;
        Ok(session.open_container(&spec).await?)
    }
}
