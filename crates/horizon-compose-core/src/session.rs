//! Build sessions.
//!
//! A [`BuildSession`] owns everything one application needs to turn metadata
//! into containers: the event bus, the planned index, the hook barrier, the
//! registries and the I/O collaborators. Sessions are independent of each
//! other; one process may hold several.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::builder::{BuildContext, TreeBuilder};
use crate::config::ComposeConfig;
use crate::datasource::DatasourceContext;
use crate::error::{BuildError, ComposeError};
use crate::event_bus::{ConnectionId, EventBus};
use crate::hooks::{HookBarrier, LifecyclePhase};
use crate::logging::{PerfSpan, targets};
use crate::metadata::ContainerSpec;
use crate::model::{ComponentTree, Container, ControllerRegistry, ControllerResolver, Parent};
use crate::navigation::Navigator;
use crate::planned_index::PlannedIndex;
use crate::registry::TypeRegistry;
use crate::transport::Transport;
use crate::validation::ValidationRegistry;

/// Owner of the active container and the services that build it.
pub struct BuildSession {
    config: ComposeConfig,
    bus: EventBus,
    barrier: HookBarrier,
    ctx: BuildContext,
    active: RwLock<Option<Arc<Container>>>,
    hook_subscriptions: Mutex<Vec<(LifecyclePhase, ConnectionId)>>,
}

impl BuildSession {
    pub fn builder() -> BuildSessionBuilder {
        BuildSessionBuilder::default()
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn barrier(&self) -> &HookBarrier {
        &self.barrier
    }

    pub fn index(&self) -> &PlannedIndex {
        &self.ctx.index
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.ctx.types
    }

    pub fn validations(&self) -> &Arc<ValidationRegistry> {
        &self.ctx.validations
    }

    pub fn navigator(&self) -> Option<&Arc<dyn Navigator>> {
        self.ctx.datasources.navigator.as_ref()
    }

    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.ctx.datasources.transport.as_ref()
    }

    /// The most recently built container.
    pub fn active(&self) -> Option<Arc<Container>> {
        self.active.read().clone()
    }

    /// Build `spec` and make it the active container.
    ///
    /// The planned index is reset first, so lookups through a previously
    /// built container fail from here on, even when this build fails.
    #[tracing::instrument(skip_all, fields(container = %spec.name), target = "horizon_compose_core::session", level = "debug")]
    pub fn build_container(&self, spec: &ContainerSpec) -> Result<Arc<Container>, BuildError> {
        let _perf = PerfSpan::new("build_container");
        let generation = self.ctx.index.reset();

        let mut tree = ComponentTree::default();
        let mut builder = TreeBuilder::new(&self.ctx, &mut tree);
        for widget in &spec.widgets {
            builder.build_widget(widget, Parent::Container)?;
        }

        self.barrier.arm(generation, tree.roots().len());
        let container = Arc::new(Container::new(
            spec,
            tree,
            generation,
            self.ctx.clone(),
            self.bus.clone(),
        ));
        self.barrier.attach(&container);
        self.subscribe_controller_hooks(spec.controller.as_deref());

        tracing::debug!(
            target: targets::SESSION,
            %generation,
            widgets = container.top_level_count(),
            "container built"
        );
        *self.active.write() = Some(Arc::clone(&container));
        Ok(container)
    }

    /// Parse and build a container from metadata JSON.
    pub fn build_container_from_json(&self, json: &str) -> Result<Arc<Container>, BuildError> {
        self.build_container(&ContainerSpec::from_json(json)?)
    }

    /// Build `spec`, then start every datasource (URL correction and eager
    /// fetches).
    pub async fn open_container(&self, spec: &ContainerSpec) -> Result<Arc<Container>, ComposeError> {
        let container = self.build_container(spec)?;
        container.start().await?;
        Ok(container)
    }

    fn subscribe_controller_hooks(&self, controller: Option<&str>) {
        let mut subscriptions = self.hook_subscriptions.lock();
        for (phase, id) in subscriptions.drain(..) {
            self.bus.off(phase.container_channel(), id);
        }
        let Some(controller) = controller else {
            return;
        };

        for phase in LifecyclePhase::ALL {
            let Some(hook) = self.ctx.controllers.resolve_hook(controller, phase) else {
                continue;
            };
            if let Some(id) = self.bus.on(phase.container_channel(), move |_| hook(phase)) {
                subscriptions.push((phase, id));
            }
        }
        tracing::debug!(
            target: targets::SESSION,
            controller,
            hooks = subscriptions.len(),
            "controller hooks subscribed"
        );
    }
}

impl fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSession")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("barrier", &self.barrier)
            .field("active", &self.active.read().as_ref().map(|c| c.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`BuildSession`].
#[derive(Default)]
pub struct BuildSessionBuilder {
    config: ComposeConfig,
    bus: Option<EventBus>,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
    controllers: Option<Arc<dyn ControllerResolver>>,
    types: Option<Arc<TypeRegistry>>,
    validations: Option<Arc<ValidationRegistry>>,
}

impl BuildSessionBuilder {
    pub fn config(mut self, config: ComposeConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing bus instead of creating one.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn controllers(mut self, controllers: Arc<dyn ControllerResolver>) -> Self {
        self.controllers = Some(controllers);
        self
    }

    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn validations(mut self, validations: Arc<ValidationRegistry>) -> Self {
        self.validations = Some(validations);
        self
    }

    pub fn build(self) -> BuildSession {
        let bus = self.bus.unwrap_or_default();
        let barrier = HookBarrier::new(bus.clone());
        let ctx = BuildContext {
            types: self.types.unwrap_or_default(),
            validations: self
                .validations
                .unwrap_or_else(|| Arc::new(ValidationRegistry::new())),
            controllers: self
                .controllers
                .unwrap_or_else(|| Arc::new(ControllerRegistry::new())),
            index: PlannedIndex::new(),
            datasources: DatasourceContext {
                transport: self.transport,
                navigator: self.navigator,
                default_limit: self.config.datasource_limit,
            },
        };
        BuildSession {
            config: self.config,
            bus,
            barrier,
            ctx,
            active: RwLock::new(None),
            hook_subscriptions: Mutex::new(Vec::new()),
        }
    }
}
