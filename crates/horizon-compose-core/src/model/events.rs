//! Event handlers and the controller boundary.
//!
//! Metadata names handlers as `"Controller.method"`. The build resolves each
//! reference through a [`ControllerResolver`]; an unknown reference fails the
//! build instead of producing a handler that errors when called.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::Container;
use crate::error::BuildError;
use crate::hooks::LifecyclePhase;
use crate::metadata::EventSpecs;

/// What a handler receives.
pub struct EventContext<'a> {
    pub container: &'a Container,
    /// Name of the widget the event belongs to.
    pub widget: &'a str,
    /// Name of the field, for field events.
    pub field: Option<&'a str>,
    pub event: &'a str,
    pub value: Option<&'a Value>,
}

/// A component event handler. Returning `true` prevents the default action.
pub type EventHandler = Arc<dyn Fn(&EventContext<'_>) -> bool + Send + Sync>;

/// A controller lifecycle method, run when a container phase fires.
pub type HookHandler = Arc<dyn Fn(LifecyclePhase) + Send + Sync>;

/// Event name to handler.
#[derive(Clone, Default)]
pub struct EventMap {
    handlers: BTreeMap<String, EventHandler>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, event: &str) -> Option<EventHandler> {
        self.handlers.get(event).cloned()
    }

    pub fn insert(&mut self, event: impl Into<String>, handler: EventHandler) {
        self.handlers.insert(event.into(), handler);
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Resolves handler references to callables.
pub trait ControllerResolver: Send + Sync {
    /// Handler for `controller.method`.
    fn resolve(&self, controller: &str, method: &str) -> Option<EventHandler>;

    /// The lifecycle method `controller` exposes for `phase`, if any.
    fn resolve_hook(&self, _controller: &str, _phase: LifecyclePhase) -> Option<HookHandler> {
        None
    }
}

/// In-memory [`ControllerResolver`].
#[derive(Default)]
pub struct ControllerRegistry {
    methods: RwLock<HashMap<String, HashMap<String, EventHandler>>>,
    hooks: RwLock<HashMap<String, HashMap<LifecyclePhase, HookHandler>>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `controller.method`.
    pub fn register<F>(&self, controller: &str, method: &str, handler: F)
    where
        F: Fn(&EventContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.methods
            .write()
            .entry(controller.to_string())
            .or_default()
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Register a controller lifecycle method.
    pub fn register_hook<F>(&self, controller: &str, phase: LifecyclePhase, hook: F)
    where
        F: Fn(LifecyclePhase) + Send + Sync + 'static,
    {
        self.hooks
            .write()
            .entry(controller.to_string())
            .or_default()
            .insert(phase, Arc::new(hook));
    }
}

impl ControllerResolver for ControllerRegistry {
    fn resolve(&self, controller: &str, method: &str) -> Option<EventHandler> {
        self.methods.read().get(controller)?.get(method).cloned()
    }

    fn resolve_hook(&self, controller: &str, phase: LifecyclePhase) -> Option<HookHandler> {
        self.hooks.read().get(controller)?.get(&phase).cloned()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self.methods.read();
        let mut controllers: Vec<&String> = methods.keys().collect();
        controllers.sort();
        f.debug_struct("ControllerRegistry")
            .field("controllers", &controllers)
            .finish()
    }
}

pub(crate) fn resolve_events(
    specs: &EventSpecs,
    resolver: &dyn ControllerResolver,
) -> Result<EventMap, BuildError> {
    let mut events = EventMap::new();
    for (event, reference) in specs {
        let (controller, method) = reference
            .split_once('.')
            .filter(|(controller, method)| !controller.is_empty() && !method.is_empty())
            .ok_or_else(|| BuildError::MalformedHandler {
                event: event.clone(),
                handler: reference.clone(),
            })?;
        let handler = resolver
            .resolve(controller, method)
            .ok_or_else(|| BuildError::UnresolvedHandler {
                event: event.clone(),
                controller: controller.to_string(),
                method: method.to_string(),
            })?;
        events.insert(event.clone(), handler);
    }
    Ok(events)
}
