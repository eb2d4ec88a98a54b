//! Turns metadata specs into arena nodes.
//!
//! Construction is depth-first pre-order: a widget registers itself in the
//! planned index before its datasource is built, then its fields, then its
//! nested widgets. Each widget constructs its own datasource.

use std::fmt;
use std::sync::Arc;

use crate::datasource::{Datasource, DatasourceContext};
use crate::error::{BuildError, LookupError};
use crate::logging::targets;
use crate::metadata::{DatasourceSpec, FieldSpec, WidgetSpec};
use crate::model::{
    ComponentTree, ControllerResolver, Field, FieldId, Input, Parent, Widget, WidgetId,
    resolve_events,
};
use crate::planned_index::PlannedIndex;
use crate::registry::{ComponentFactory, FieldBehavior, TypeRegistry, WidgetBehavior};
use crate::validation::ValidationRegistry;

/// Everything a build needs besides the arena.
#[derive(Clone)]
pub struct BuildContext {
    pub(crate) types: Arc<TypeRegistry>,
    pub(crate) validations: Arc<ValidationRegistry>,
    pub(crate) controllers: Arc<dyn ControllerResolver>,
    pub(crate) index: PlannedIndex,
    pub(crate) datasources: DatasourceContext,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("types", &self.types)
            .field("index", &self.index)
            .field("datasources", &self.datasources)
            .finish_non_exhaustive()
    }
}

pub(crate) struct TreeBuilder<'a> {
    ctx: &'a BuildContext,
    tree: &'a mut ComponentTree,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(ctx: &'a BuildContext, tree: &'a mut ComponentTree) -> Self {
        Self { ctx, tree }
    }

    fn widget_behavior(&self, spec: &WidgetSpec) -> (Option<Arc<dyn WidgetBehavior>>, Option<String>) {
        match self.ctx.types.lookup(&spec.widget_type) {
            Some(registered) => match registered.factory {
                ComponentFactory::Widget(factory) => (Some(factory(spec)), Some(registered.renderable)),
                ComponentFactory::Field(_) => {
                    tracing::warn!(
                        target: targets::BUILDER,
                        widget = %spec.name,
                        widget_type = %spec.widget_type,
                        "type is registered as a field; building a generic widget"
                    );
                    (None, None)
                }
            },
            None => (None, None),
        }
    }

    fn field_behavior(&self, spec: &FieldSpec) -> (Option<Arc<dyn FieldBehavior>>, Option<String>) {
        match self.ctx.types.lookup(&spec.field_type) {
            Some(registered) => match registered.factory {
                ComponentFactory::Field(factory) => (Some(factory(spec)), Some(registered.renderable)),
                ComponentFactory::Widget(_) => {
                    tracing::warn!(
                        target: targets::BUILDER,
                        field = %spec.name,
                        field_type = %spec.field_type,
                        "type is registered as a widget; building a generic field"
                    );
                    (None, None)
                }
            },
            None => (None, None),
        }
    }

    /// Build a widget subtree and attach it under `parent`.
    pub(crate) fn build_widget(&mut self, spec: &WidgetSpec, parent: Parent) -> Result<WidgetId, BuildError> {
        if let Parent::Widget(parent_id) = parent
            && !self.tree.widgets.contains_key(parent_id)
        {
            return Err(LookupError::WidgetNotFound(format!("{parent_id:?}")).into());
        }

        let (behavior, render_hint) = self.widget_behavior(spec);
        let events = resolve_events(&spec.events, self.ctx.controllers.as_ref())?;

        let index = &self.ctx.index;
        let datasources = &self.ctx.datasources;
        let default_spec = DatasourceSpec::default();
        let id = self.tree.widgets.insert_with_key(|id| {
            index.add_widget(&spec.name, id);
            let datasource = Datasource::new(
                spec.datasource.as_ref().unwrap_or(&default_spec),
                spec.current_row.clone(),
                datasources,
            );
            Widget::from_spec(spec, parent, datasource, events, render_hint, behavior)
        });

        match parent {
            Parent::Container => self.tree.roots.push(id),
            Parent::Widget(parent_id) => {
                if let Some(parent) = self.tree.widgets.get_mut(parent_id) {
                    parent.widgets.push(id);
                }
            }
        }

        for field in &spec.fields {
            self.build_field(field, id, true)?;
        }
        for child in &spec.widgets {
            self.build_widget(child, Parent::Widget(id))?;
        }

        tracing::debug!(
            target: targets::BUILDER,
            widget = %spec.name,
            widget_type = %spec.widget_type,
            fields = spec.fields.len(),
            "widget built"
        );
        Ok(id)
    }

    /// Build a field of `widget`. With `append`, the field is added to the
    /// widget's field list.
    pub(crate) fn build_field(
        &mut self,
        spec: &FieldSpec,
        widget: WidgetId,
        append: bool,
    ) -> Result<FieldId, BuildError> {
        let (widget_name, datasource) = {
            let owner = self
                .tree
                .widgets
                .get(widget)
                .ok_or_else(|| LookupError::WidgetNotFound(format!("{widget:?}")))?;
            (owner.name().to_string(), owner.datasource().clone())
        };

        let (behavior, render_hint) = self.field_behavior(spec);
        let events = resolve_events(&spec.events, self.ctx.controllers.as_ref())?;
        let input = match &behavior {
            Some(behavior) if behavior.binds_value() => Some(Input::bind(
                &spec.name,
                datasource,
                spec.value.clone(),
                spec.store_path.clone(),
                &spec.validations,
                &self.ctx.validations,
            )?),
            _ => None,
        };

        let field = Field::from_spec(spec, widget, events, render_hint, behavior, input);
        let id = self.tree.fields.insert(field);
        self.ctx.index.add_field(&widget_name, &spec.name, id)?;

        if append && let Some(owner) = self.tree.widgets.get_mut(widget) {
            owner.fields.push(id);
        }
        Ok(id)
    }
}
