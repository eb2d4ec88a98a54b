use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{ComponentBase, EventMap, Input, WidgetId};
use crate::metadata::FieldSpec;
use crate::registry::FieldBehavior;

/// A field node.
pub struct Field {
    pub base: ComponentBase,
    pub label: String,
    pub is_visible: bool,
    pub readonly: bool,
    pub disabled: bool,
    pub sortable: bool,
    pub editable: bool,
    pub align: String,
    pub min_width: String,
    pub max_width: String,
    pub(crate) field_type: String,
    pub(crate) events: EventMap,
    pub(crate) parent: WidgetId,
    pub(crate) render_hint: Option<String>,
    pub(crate) behavior: Option<Arc<dyn FieldBehavior>>,
    pub(crate) input: Option<Input>,
}

impl Field {
    pub(crate) fn from_spec(
        spec: &FieldSpec,
        parent: WidgetId,
        events: EventMap,
        render_hint: Option<String>,
        behavior: Option<Arc<dyn FieldBehavior>>,
        input: Option<Input>,
    ) -> Self {
        Self {
            base: ComponentBase::new(
                &spec.name,
                spec.css_class.as_ref(),
                spec.grid_size.as_ref(),
                &spec.extra,
            ),
            label: spec.label.clone().unwrap_or_default(),
            is_visible: spec.is_visible != Some(false),
            readonly: spec.readonly == Some(true),
            disabled: spec.disabled == Some(true),
            sortable: spec.sortable != Some(false),
            editable: spec.editable == Some(true),
            align: spec.align.clone().unwrap_or_else(|| "left".to_string()),
            min_width: spec.min_width.clone().unwrap_or_default(),
            max_width: spec.max_width.clone().unwrap_or_default(),
            field_type: spec.field_type.clone(),
            events,
            parent,
            render_hint,
            behavior,
            input,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// The owning widget.
    pub fn parent(&self) -> WidgetId {
        self.parent
    }

    pub fn events(&self) -> &EventMap {
        &self.events
    }

    pub fn render_hint(&self) -> Option<&str> {
        self.render_hint.as_deref()
    }

    pub fn behavior(&self) -> Option<&Arc<dyn FieldBehavior>> {
        self.behavior.as_ref()
    }

    /// Value binding, for fields whose type binds a value.
    pub fn input(&self) -> Option<&Input> {
        self.input.as_ref()
    }

    pub fn input_mut(&mut self) -> Option<&mut Input> {
        self.input.as_mut()
    }

    pub fn value(&self) -> Option<Value> {
        self.input.as_ref().and_then(Input::value)
    }

    /// The value as the behavior's formatter presents it.
    pub fn display_value(&self) -> Option<Value> {
        let value = self.value()?;
        Some(match &self.behavior {
            Some(behavior) => behavior.format(&value),
            None => value,
        })
    }

    /// Parse `display` with the behavior's parser and store the result.
    ///
    /// Returns `false` when the field does not bind a value.
    pub fn set_display_value(&self, display: &Value) -> bool {
        let Some(input) = &self.input else {
            return false;
        };
        let value = match &self.behavior {
            Some(behavior) => behavior.parse(display),
            None => display.clone(),
        };
        input.set_value(value);
        true
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.base.name)
            .field("type", &self.field_type)
            .field("label", &self.label)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}
