//! Live component tree.
//!
//! Widgets and fields live in a per-container arena ([`ComponentTree`]) and
//! refer to each other by key. A widget's parent is either the container or
//! another widget; a field's parent is always a widget. Parents are plain
//! keys, never owning references.

mod component;
mod container;
mod events;
mod field;
mod input;
mod widget;

pub use component::ComponentBase;
pub use container::{Container, URL_CHANGED_EVENT};
pub use events::{
    ControllerRegistry, ControllerResolver, EventContext, EventHandler, EventMap, HookHandler,
};
pub(crate) use events::resolve_events;
pub use field::Field;
pub use input::{Input, InputBehavior};
pub use widget::{Parent, Widget};

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Arena key of a widget.
    pub struct WidgetId;

    /// Arena key of a field.
    pub struct FieldId;
}

/// Arena holding every widget and field of one container.
#[derive(Debug, Default)]
pub struct ComponentTree {
    pub(crate) widgets: SlotMap<WidgetId, Widget>,
    pub(crate) fields: SlotMap<FieldId, Field>,
    pub(crate) roots: Vec<WidgetId>,
}

impl ComponentTree {
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id)
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id)
    }

    /// Top-level widgets, in metadata order.
    pub fn roots(&self) -> &[WidgetId] {
        &self.roots
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Every widget, depth-first in construction order.
    pub fn preorder(&self) -> Vec<WidgetId> {
        let mut out = Vec::with_capacity(self.widgets.len());
        let mut stack: Vec<WidgetId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(widget) = self.widgets.get(id) {
                out.push(id);
                stack.extend(widget.widgets.iter().rev().copied());
            }
        }
        out
    }

    /// Fields of a widget, in order.
    pub fn fields_of(&self, id: WidgetId) -> impl Iterator<Item = &Field> {
        self.widgets
            .get(id)
            .into_iter()
            .flat_map(|widget| widget.fields.iter())
            .filter_map(|field| self.fields.get(*field))
    }

    /// Remove a widget, its fields and all nested widgets from the arena.
    pub(crate) fn remove_subtree(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.remove(id) else {
            return;
        };
        for field in widget.fields {
            self.fields.remove(field);
        }
        for child in widget.widgets {
            self.remove_subtree(child);
        }
    }
}
