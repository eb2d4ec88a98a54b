//! The root of a built screen.

use std::fmt;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;

use super::{ComponentBase, ComponentTree, EventContext, Field, FieldId, Parent, Widget, WidgetId};
use crate::builder::{BuildContext, TreeBuilder};
use crate::datasource::Datasource;
use crate::error::{BuildError, ComposeError, DatasourceError, LookupError, LookupResult};
use crate::event_bus::{EventBus, Payload};
use crate::hooks::{Generation, HookToken, LifecyclePhase};
use crate::logging::{TreeDump, targets};
use crate::metadata::{ContainerSpec, FieldSpec, WidgetSpec};
use crate::navigation::Location;

/// Event a widget runs when the location changes; returning `true` keeps
/// the widget from re-fetching.
pub const URL_CHANGED_EVENT: &str = "urlChanged";

/// A built screen: top-level widgets and everything below them.
///
/// Containers are shared as `Arc<Container>`. The arena sits behind a lock
/// that is released before any handler, behavior or bus listener runs.
pub struct Container {
    base: ComponentBase,
    title: Option<String>,
    controller: Option<String>,
    show_header: bool,
    show_menu: bool,
    show_footer: bool,
    generation: Generation,
    tree: RwLock<ComponentTree>,
    ctx: BuildContext,
    bus: EventBus,
}

impl Container {
    pub(crate) fn new(
        spec: &ContainerSpec,
        tree: ComponentTree,
        generation: Generation,
        ctx: BuildContext,
        bus: EventBus,
    ) -> Self {
        Self {
            base: ComponentBase::new(
                &spec.name,
                spec.css_class.as_ref(),
                spec.grid_size.as_ref(),
                &spec.extra,
            ),
            title: spec.title.clone(),
            controller: spec.controller.clone(),
            show_header: spec.show_header != Some(false),
            show_menu: spec.show_menu != Some(false),
            show_footer: spec.show_footer != Some(false),
            generation,
            tree: RwLock::new(tree),
            ctx,
            bus,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn base(&self) -> &ComponentBase {
        &self.base
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn show_header(&self) -> bool {
        self.show_header
    }

    pub fn show_menu(&self) -> bool {
        self.show_menu
    }

    pub fn show_footer(&self) -> bool {
        self.show_footer
    }

    /// The build this container came from.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Run `f` with read access to the arena.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ComponentTree) -> R) -> R {
        f(&self.tree.read())
    }

    /// Number of top-level widgets.
    pub fn top_level_count(&self) -> usize {
        self.tree.read().roots.len()
    }

    /// Names of the top-level widgets, in order.
    pub fn widget_names(&self) -> Vec<String> {
        let tree = self.tree.read();
        tree.roots
            .iter()
            .filter_map(|id| tree.widgets.get(*id))
            .map(|widget| widget.name().to_string())
            .collect()
    }

    /// Arena key of the widget registered under `name`.
    pub fn widget_id(&self, name: &str) -> LookupResult<WidgetId> {
        self.ctx.index.ensure_generation(self.generation)?;
        self.ctx.index.widget(name)
    }

    /// Arena key of field `field` of widget `widget`.
    pub fn field_id(&self, widget: &str, field: &str) -> LookupResult<FieldId> {
        self.ctx.index.ensure_generation(self.generation)?;
        self.ctx.index.field(widget, field)
    }

    /// Look up a widget by name.
    pub fn get_widget(&self, name: &str) -> LookupResult<MappedRwLockReadGuard<'_, Widget>> {
        let id = self.widget_id(name)?;
        RwLockReadGuard::try_map(self.tree.read(), |tree| tree.widgets.get(id))
            .map_err(|_| LookupError::WidgetNotFound(name.to_string()))
    }

    /// Look up a widget by name for modification.
    pub fn get_widget_mut(&self, name: &str) -> LookupResult<MappedRwLockWriteGuard<'_, Widget>> {
        let id = self.widget_id(name)?;
        RwLockWriteGuard::try_map(self.tree.write(), |tree| tree.widgets.get_mut(id))
            .map_err(|_| LookupError::WidgetNotFound(name.to_string()))
    }

    /// Look up a field by widget and field name.
    pub fn get_field(&self, widget: &str, field: &str) -> LookupResult<MappedRwLockReadGuard<'_, Field>> {
        let id = self.field_id(widget, field)?;
        RwLockReadGuard::try_map(self.tree.read(), |tree| tree.fields.get(id)).map_err(|_| {
            LookupError::FieldNotFound {
                widget: widget.to_string(),
                field: field.to_string(),
            }
        })
    }

    /// Look up a field for modification.
    pub fn get_field_mut(&self, widget: &str, field: &str) -> LookupResult<MappedRwLockWriteGuard<'_, Field>> {
        let id = self.field_id(widget, field)?;
        RwLockWriteGuard::try_map(self.tree.write(), |tree| tree.fields.get_mut(id)).map_err(|_| {
            LookupError::FieldNotFound {
                widget: widget.to_string(),
                field: field.to_string(),
            }
        })
    }

    /// Handle to a widget's datasource.
    pub fn datasource(&self, widget: &str) -> LookupResult<Datasource> {
        Ok(self.get_widget(widget)?.datasource().clone())
    }

    /// Build a top-level widget and append it.
    ///
    /// The hook barrier keeps the widget count captured at build time.
    pub fn add_widget(&self, spec: &WidgetSpec) -> Result<WidgetId, BuildError> {
        let mut tree = self.tree.write();
        TreeBuilder::new(&self.ctx, &mut tree).build_widget(spec, Parent::Container)
    }

    /// Replace every top-level widget.
    pub fn set_widgets(&self, specs: &[WidgetSpec]) -> Result<Vec<WidgetId>, BuildError> {
        let mut tree = self.tree.write();
        for id in std::mem::take(&mut tree.roots) {
            tree.remove_subtree(id);
        }
        let mut builder = TreeBuilder::new(&self.ctx, &mut tree);
        specs
            .iter()
            .map(|spec| builder.build_widget(spec, Parent::Container))
            .collect()
    }

    /// Build a widget nested under `parent`.
    pub fn add_child_widget(&self, parent: &str, spec: &WidgetSpec) -> Result<WidgetId, BuildError> {
        let parent = self.widget_id(parent)?;
        let mut tree = self.tree.write();
        TreeBuilder::new(&self.ctx, &mut tree).build_widget(spec, Parent::Widget(parent))
    }

    /// Replace every widget nested directly under `parent`.
    pub fn set_child_widgets(&self, parent: &str, specs: &[WidgetSpec]) -> Result<Vec<WidgetId>, BuildError> {
        let parent_id = self.widget_id(parent)?;
        let mut tree = self.tree.write();
        let old = tree
            .widgets
            .get_mut(parent_id)
            .map(|w| std::mem::take(&mut w.widgets))
            .ok_or_else(|| LookupError::WidgetNotFound(parent.to_string()))?;
        for id in old {
            tree.remove_subtree(id);
        }
        let mut builder = TreeBuilder::new(&self.ctx, &mut tree);
        specs
            .iter()
            .map(|spec| builder.build_widget(spec, Parent::Widget(parent_id)))
            .collect()
    }

    /// Build a field and append it to `widget`.
    pub fn add_field(&self, widget: &str, spec: &FieldSpec) -> Result<FieldId, BuildError> {
        let widget = self.widget_id(widget)?;
        let mut tree = self.tree.write();
        TreeBuilder::new(&self.ctx, &mut tree).build_field(spec, widget, true)
    }

    /// Replace every field of `widget`.
    pub fn set_fields(&self, widget: &str, specs: &[FieldSpec]) -> Result<Vec<FieldId>, BuildError> {
        let widget_id = self.widget_id(widget)?;
        let mut tree = self.tree.write();
        let old = tree
            .widgets
            .get_mut(widget_id)
            .map(|w| std::mem::take(&mut w.fields))
            .ok_or_else(|| LookupError::WidgetNotFound(widget.to_string()))?;
        for id in old {
            tree.fields.remove(id);
        }

        let mut builder = TreeBuilder::new(&self.ctx, &mut tree);
        let ids = specs
            .iter()
            .map(|spec| builder.build_field(spec, widget_id, false))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(owner) = tree.widgets.get_mut(widget_id) {
            owner.fields = ids.clone();
        }
        Ok(ids)
    }

    /// Run `phase` for the widget registered under `name`.
    ///
    /// The widget's behavior runs first, then its handler for the phase.
    /// A top-level widget then reports the phase on the bus.
    pub fn run_lifecycle(&self, name: &str, phase: LifecyclePhase) -> LookupResult<()> {
        let id = self.widget_id(name)?;
        self.run_lifecycle_for(id, phase)
    }

    /// Run `phase` for every widget, depth-first.
    pub fn run_phase(&self, phase: LifecyclePhase) {
        let ids = self.tree.read().preorder();
        for id in ids {
            if let Err(error) = self.run_lifecycle_for(id, phase) {
                tracing::debug!(target: targets::CONTAINER, %error, "widget removed during phase");
            }
        }
    }

    fn run_lifecycle_for(&self, id: WidgetId, phase: LifecyclePhase) -> LookupResult<()> {
        let (name, handler, top_level) = {
            let tree = self.tree.read();
            let widget = tree
                .widgets
                .get(id)
                .ok_or_else(|| LookupError::WidgetNotFound(format!("{id:?}")))?;
            if let Some(behavior) = &widget.behavior {
                behavior.on_lifecycle(widget, phase);
            }
            (
                widget.name().to_string(),
                widget.events.get(phase.as_str()),
                widget.is_top_level(),
            )
        };

        if let Some(handler) = handler {
            handler(&EventContext {
                container: self,
                widget: &name,
                field: None,
                event: phase.as_str(),
                value: None,
            });
        }

        if top_level {
            tracing::trace!(target: targets::CONTAINER, widget = %name, %phase, "reporting phase");
            self.bus.emit(
                phase.widget_channel(),
                Payload::Hook(HookToken {
                    phase,
                    generation: self.generation,
                }),
            );
        }
        Ok(())
    }

    /// Run the widget handler for `event`. Returns `true` when the handler
    /// prevented the default action, `false` when it did not or when the
    /// widget has no handler.
    pub fn trigger_widget_event(&self, widget: &str, event: &str, value: Option<&Value>) -> LookupResult<bool> {
        let handler = self.get_widget(widget)?.events.get(event);
        Ok(handler.is_some_and(|handler| {
            handler(&EventContext {
                container: self,
                widget,
                field: None,
                event,
                value,
            })
        }))
    }

    /// Run the field handler for `event` (`click`, `blur`, `focus`, ...).
    pub fn trigger_field_event(
        &self,
        widget: &str,
        field: &str,
        event: &str,
        value: Option<&Value>,
    ) -> LookupResult<bool> {
        let handler = self.get_field(widget, field)?.events.get(event);
        Ok(handler.is_some_and(|handler| {
            handler(&EventContext {
                container: self,
                widget,
                field: Some(field),
                event,
                value,
            })
        }))
    }

    /// React to a location change for `widget`.
    ///
    /// `current` is the navigator's location after the change. When the
    /// full path changed, the widget's `urlChanged` handler runs and may
    /// prevent the rest. A datasource watching the URL then re-fetches if
    /// the location's query no longer matches its state. Returns whether a
    /// fetch ran.
    pub async fn handle_route_change(
        &self,
        widget: &str,
        current: &Location,
        old: &Location,
    ) -> Result<bool, ComposeError> {
        let full_path = current.full_path();
        if full_path == old.full_path() {
            return Ok(false);
        }
        let value = Value::String(full_path);
        if self.trigger_widget_event(widget, URL_CHANGED_EVENT, Some(&value))? {
            return Ok(false);
        }

        let datasource = self.datasource(widget)?;
        if datasource.query_string_has_changed() {
            datasource.fetch().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Correct watched locations and run the eager fetches, depth-first.
    pub async fn start(&self) -> Result<(), DatasourceError> {
        let datasources: Vec<Datasource> = {
            let tree = self.tree.read();
            tree.preorder()
                .into_iter()
                .filter_map(|id| tree.widgets.get(id))
                .map(|widget| widget.datasource.clone())
                .collect()
        };
        for datasource in datasources {
            datasource.start().await?;
        }
        Ok(())
    }

    /// Text rendering of the component tree.
    pub fn dump_tree(&self) -> String {
        TreeDump::new().format(self)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.base.name)
            .field("generation", &self.generation)
            .field("widgets", &self.top_level_count())
            .finish_non_exhaustive()
    }
}
