use std::fmt;
use std::sync::Arc;

use super::{ComponentBase, EventMap, FieldId, WidgetId};
use crate::datasource::{Datasource, Row};
use crate::metadata::WidgetSpec;
use crate::registry::WidgetBehavior;

/// Who owns a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// A top-level widget.
    Container,
    /// A nested widget.
    Widget(WidgetId),
}

/// A widget node.
pub struct Widget {
    pub base: ComponentBase,
    pub is_visible: bool,
    pub show_as_card: bool,
    pub(crate) widget_type: String,
    pub(crate) events: EventMap,
    pub(crate) fields: Vec<FieldId>,
    pub(crate) widgets: Vec<WidgetId>,
    pub(crate) datasource: Datasource,
    pub(crate) parent: Parent,
    pub(crate) render_hint: Option<String>,
    pub(crate) behavior: Option<Arc<dyn WidgetBehavior>>,
}

impl Widget {
    pub(crate) fn from_spec(
        spec: &WidgetSpec,
        parent: Parent,
        datasource: Datasource,
        events: EventMap,
        render_hint: Option<String>,
        behavior: Option<Arc<dyn WidgetBehavior>>,
    ) -> Self {
        Self {
            base: ComponentBase::new(
                &spec.name,
                spec.css_class.as_ref(),
                spec.grid_size.as_ref(),
                &spec.extra,
            ),
            is_visible: spec.is_visible != Some(false),
            show_as_card: spec.show_as_card != Some(false),
            widget_type: spec.widget_type.clone(),
            events,
            fields: Vec::new(),
            widgets: Vec::new(),
            datasource,
            parent,
            render_hint,
            behavior,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn widget_type(&self) -> &str {
        &self.widget_type
    }

    pub fn parent(&self) -> Parent {
        self.parent
    }

    /// Whether the widget sits directly under the container.
    pub fn is_top_level(&self) -> bool {
        self.parent == Parent::Container
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    /// Nested widgets.
    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }

    pub fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    /// The datasource's current row.
    pub fn current_row(&self) -> Row {
        self.datasource.current_row()
    }

    pub fn events(&self) -> &EventMap {
        &self.events
    }

    /// Renderable registered for the widget's type.
    pub fn render_hint(&self) -> Option<&str> {
        self.render_hint.as_deref()
    }

    pub fn behavior(&self) -> Option<&Arc<dyn WidgetBehavior>> {
        self.behavior.as_ref()
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("name", &self.base.name)
            .field("type", &self.widget_type)
            .field("parent", &self.parent)
            .field("fields", &self.fields.len())
            .field("widgets", &self.widgets.len())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
