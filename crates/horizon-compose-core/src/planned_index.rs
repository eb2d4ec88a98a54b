//! Name-based lookup of the widgets and fields of the current build.
//!
//! The index maps widget names to arena keys and, per widget, field names to
//! field keys. It is reset exactly once at the start of every build; a reset
//! advances the [`Generation`] so containers from an older build can tell
//! that the index no longer describes them.
//!
//! Names are not required to be unique. Registering a name twice silently
//! replaces the earlier entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{LookupError, LookupResult};
use crate::hooks::Generation;
use crate::logging::targets;
use crate::model::{FieldId, WidgetId};

#[derive(Debug, Clone)]
struct IndexEntry {
    widget: WidgetId,
    fields: HashMap<String, FieldId>,
}

#[derive(Debug, Default)]
struct IndexState {
    generation: Generation,
    widgets: HashMap<String, IndexEntry>,
}

/// Shared handle to the planned index of one build session.
#[derive(Debug, Clone, Default)]
pub struct PlannedIndex {
    state: Arc<RwLock<IndexState>>,
}

impl PlannedIndex {
    /// Create an empty index at the initial generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry and advance the generation.
    pub fn reset(&self) -> Generation {
        let mut state = self.state.write();
        state.widgets.clear();
        state.generation = state.generation.next();
        tracing::debug!(target: targets::INDEX, generation = %state.generation, "planned index reset");
        state.generation
    }

    /// Current generation.
    pub fn generation(&self) -> Generation {
        self.state.read().generation
    }

    /// Register a widget under `name`, replacing any earlier widget and its fields.
    pub fn add_widget(&self, name: &str, widget: WidgetId) {
        let previous = self.state.write().widgets.insert(
            name.to_string(),
            IndexEntry {
                widget,
                fields: HashMap::new(),
            },
        );
        if previous.is_some() {
            tracing::debug!(target: targets::INDEX, widget = name, "duplicate widget name replaced");
        }
    }

    /// Register a field under an already registered widget.
    pub fn add_field(&self, widget_name: &str, name: &str, field: FieldId) -> LookupResult<()> {
        let mut state = self.state.write();
        let entry = state
            .widgets
            .get_mut(widget_name)
            .ok_or_else(|| LookupError::WidgetNotFound(widget_name.to_string()))?;
        if entry.fields.insert(name.to_string(), field).is_some() {
            tracing::debug!(
                target: targets::INDEX,
                widget = widget_name,
                field = name,
                "duplicate field name replaced"
            );
        }
        Ok(())
    }

    /// Arena key of the widget registered under `name`.
    pub fn widget(&self, name: &str) -> LookupResult<WidgetId> {
        self.state
            .read()
            .widgets
            .get(name)
            .map(|entry| entry.widget)
            .ok_or_else(|| LookupError::WidgetNotFound(name.to_string()))
    }

    /// Arena key of field `name` of widget `widget_name`.
    pub fn field(&self, widget_name: &str, name: &str) -> LookupResult<FieldId> {
        let state = self.state.read();
        let entry = state
            .widgets
            .get(widget_name)
            .ok_or_else(|| LookupError::WidgetNotFound(widget_name.to_string()))?;
        entry
            .fields
            .get(name)
            .copied()
            .ok_or_else(|| LookupError::FieldNotFound {
                widget: widget_name.to_string(),
                field: name.to_string(),
            })
    }

    /// Fail with [`LookupError::StaleGeneration`] unless the index still
    /// describes the build `generation`.
    pub fn ensure_generation(&self, generation: Generation) -> LookupResult<()> {
        let current = self.generation();
        if current == generation {
            Ok(())
        } else {
            Err(LookupError::StaleGeneration {
                index: current,
                container: generation,
            })
        }
    }

    /// Number of registered widget names.
    pub fn len(&self) -> usize {
        self.state.read().widgets.len()
    }

    /// Whether no widget is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered widget names, sorted.
    pub fn widget_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().widgets.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_reset_clears_entries_and_advances_generation() {
        let index = PlannedIndex::new();
        let mut widgets: SlotMap<WidgetId, ()> = SlotMap::with_key();
        let mut fields: SlotMap<FieldId, ()> = SlotMap::with_key();

        let before = index.reset();
        let w = widgets.insert(());
        index.add_widget("grid", w);
        index.add_field("grid", "name", fields.insert(())).unwrap();
        assert_eq!(index.len(), 1);

        let after = index.reset();
        assert!(after > before);
        assert!(index.is_empty());
        assert_eq!(
            index.widget("grid"),
            Err(LookupError::WidgetNotFound("grid".into()))
        );
    }

    #[test]
    fn test_duplicate_name_keeps_latest() {
        let index = PlannedIndex::new();
        let mut widgets: SlotMap<WidgetId, ()> = SlotMap::with_key();
        let first = widgets.insert(());
        let second = widgets.insert(());

        index.add_widget("form", first);
        index.add_widget("form", second);
        assert_eq!(index.widget("form"), Ok(second));
    }

    #[test]
    fn test_field_lookup_errors() {
        let index = PlannedIndex::new();
        let mut widgets: SlotMap<WidgetId, ()> = SlotMap::with_key();
        let mut fields: SlotMap<FieldId, ()> = SlotMap::with_key();

        assert!(matches!(
            index.add_field("nope", "x", fields.insert(())),
            Err(LookupError::WidgetNotFound(_))
        ));

        index.add_widget("form", widgets.insert(()));
        assert_eq!(
            index.field("form", "email"),
            Err(LookupError::FieldNotFound {
                widget: "form".into(),
                field: "email".into()
            })
        );
    }

    #[test]
    fn test_ensure_generation() {
        let index = PlannedIndex::new();
        let g1 = index.reset();
        assert!(index.ensure_generation(g1).is_ok());
        let g2 = index.reset();
        assert_eq!(
            index.ensure_generation(g1),
            Err(LookupError::StaleGeneration {
                index: g2,
                container: g1
            })
        );
    }
}
