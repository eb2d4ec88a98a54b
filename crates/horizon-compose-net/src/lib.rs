//! HTTP plumbing for Horizon Compose.
//!
//! This crate provides the network side of a compose application:
//!
//! - **[`RestTransport`]**: a JSON-over-HTTP implementation of the core
//!   `Transport` boundary, used by datasources for their reads and writes
//! - **[`MetadataLoader`]**: fetches container metadata by screen name,
//!   falling back to the not-found container on HTTP 404
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use horizon_compose_core::{BuildSession, ComposeConfig};
//! use horizon_compose_net::{MetadataLoader, RestTransport};
//!
//! let config = ComposeConfig::from_file("compose.toml")?;
//! let transport = RestTransport::builder(&config.endpoint).json_api().build()?;
//! let session = BuildSession::builder()
//!     .config(config.clone())
//!     .transport(Arc::new(transport))
//!     .build();
//!
//! let loader = MetadataLoader::from_config(&config)?;
//! let container = loader.open(&session, "orders").await?;
//! ```

mod error;
pub mod metadata;
pub mod rest;

pub use error::{NetworkError, Result};
pub use metadata::{LoadError, MetadataLoader};
pub use rest::{ApiAuth, OutgoingRequest, RequestInterceptor, ResponseInterceptor, RestTransport, RestTransportBuilder};
