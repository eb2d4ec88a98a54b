//! Core systems for Horizon Compose.
//!
//! Horizon Compose turns a JSON description of a screen (a container of
//! widgets, which contain fields) into a live component tree that a
//! rendering layer displays. This crate provides:
//!
//! - **Tree Builder**: Depth-first construction from metadata, with a type
//!   registry of widget and field behaviors
//! - **Planned Index**: Name lookup of every built widget and field
//! - **Hook Barrier**: Fires container lifecycle phases once every top-level
//!   widget has reported them
//! - **Event Bus**: Named channels with synchronous, ordered listeners
//! - **Datasource Engine**: Pagination, filtering, ordering and search, kept
//!   in sync with the location's query string
//!
//! I/O is behind the [`Transport`] and [`Navigator`] traits; the
//! `horizon-compose-net` crate provides an HTTP transport.
//!
//! # Example
//!
//! ```
//! use horizon_compose_core::{BuildSession, CONTAINER_CHANGED, LifecyclePhase};
//!
//! let session = BuildSession::builder().build();
//! session.bus().on(CONTAINER_CHANGED, |payload| {
//!     if let Some(container) = payload.container() {
//!         println!("{} is ready", container.name());
//!     }
//! });
//!
//! let container = session
//!     .build_container_from_json(r#"{"name": "orders", "widgets": [{"name": "grid"}]}"#)
//!     .unwrap();
//!
//! // The rendering layer drives the lifecycle.
//! container.run_phase(LifecyclePhase::Created);
//! ```

mod builder;
pub mod config;
pub mod datasource;
mod error;
pub mod event_bus;
pub mod hooks;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod navigation;
pub mod planned_index;
pub mod registry;
mod session;
pub mod transport;
pub mod validation;

pub use builder::BuildContext;
pub use config::{ComposeConfig, RunMode};
pub use datasource::{
    Datasource, DatasourceContext, DatasourceType, FilterMap, Pagination, QueryMap, QueryValue,
    Row,
};
pub use error::{
    BuildError, ComposeError, ConfigError, DatasourceError, LookupError, LookupResult, Result,
    TransportError,
};
pub use event_bus::{Channel, ConnectionId, EventBus, Payload};
pub use hooks::{CONTAINER_CHANGED, Generation, HookBarrier, HookToken, LifecyclePhase};
pub use logging::{PerfSpan, TreeDump, TreeFormatOptions, TreeStyle};
pub use metadata::{ContainerSpec, DatasourceSpec, FieldSpec, WidgetSpec};
pub use model::{
    ComponentBase, ComponentTree, Container, ControllerRegistry, ControllerResolver,
    EventContext, EventHandler, Field, FieldId, Input, Parent, Widget, WidgetId,
};
pub use navigation::{Location, MemoryNavigator, Navigator};
pub use planned_index::PlannedIndex;
pub use registry::{FieldBehavior, TypeRegistry, WidgetBehavior};
pub use session::{BuildSession, BuildSessionBuilder};
pub use transport::{RequestParams, Transport, TransportFuture};
pub use validation::{Rule, ValidationRegistry};
