//! Component type registry.
//!
//! Maps a metadata `type` string to a renderable name and a factory. The
//! factory produces a capability object the builder attaches to the widget
//! or field. Types that are not registered still build, as generic
//! components with no behavior.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::hooks::LifecyclePhase;
use crate::metadata::{FieldSpec, WidgetSpec};
use crate::model::{InputBehavior, Widget};

/// Type-specific widget behavior.
pub trait WidgetBehavior: Send + Sync {
    /// Runs when the widget enters `phase`, before its event handler.
    fn on_lifecycle(&self, _widget: &Widget, _phase: LifecyclePhase) {}
}

/// Type-specific field behavior.
pub trait FieldBehavior: Send + Sync {
    /// Whether fields of this type bind a value in the datasource row.
    fn binds_value(&self) -> bool {
        false
    }

    /// Present a stored value.
    fn format(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Turn a presented value back into a stored one.
    fn parse(&self, value: &Value) -> Value {
        value.clone()
    }
}

pub type WidgetFactory = Arc<dyn Fn(&WidgetSpec) -> Arc<dyn WidgetBehavior> + Send + Sync>;
pub type FieldFactory = Arc<dyn Fn(&FieldSpec) -> Arc<dyn FieldBehavior> + Send + Sync>;

/// Which kind of component a type builds.
#[derive(Clone)]
pub enum ComponentFactory {
    Widget(WidgetFactory),
    Field(FieldFactory),
}

/// A registry entry.
#[derive(Clone)]
pub struct RegisteredComponent {
    /// Name of the renderable the rendering layer should use.
    pub renderable: String,
    pub factory: ComponentFactory,
}

impl fmt::Debug for RegisteredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.factory {
            ComponentFactory::Widget(_) => "widget",
            ComponentFactory::Field(_) => "field",
        };
        f.debug_struct("RegisteredComponent")
            .field("renderable", &self.renderable)
            .field("kind", &kind)
            .finish()
    }
}

/// Type name to registered component.
#[derive(Default)]
pub struct TypeRegistry {
    entries: RwLock<HashMap<String, RegisteredComponent>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_widget<F, B>(&self, type_name: &str, renderable: &str, factory: F)
    where
        F: Fn(&WidgetSpec) -> B + Send + Sync + 'static,
        B: WidgetBehavior + 'static,
    {
        let factory: WidgetFactory =
            Arc::new(move |spec: &WidgetSpec| Arc::new(factory(spec)) as Arc<dyn WidgetBehavior>);
        self.insert(type_name, renderable, ComponentFactory::Widget(factory));
    }

    pub fn register_field<F, B>(&self, type_name: &str, renderable: &str, factory: F)
    where
        F: Fn(&FieldSpec) -> B + Send + Sync + 'static,
        B: FieldBehavior + 'static,
    {
        let factory: FieldFactory =
            Arc::new(move |spec: &FieldSpec| Arc::new(factory(spec)) as Arc<dyn FieldBehavior>);
        self.insert(type_name, renderable, ComponentFactory::Field(factory));
    }

    /// Register a value-binding field type.
    pub fn register_input(&self, type_name: &str, renderable: &str) {
        self.register_field(type_name, renderable, |_spec| InputBehavior);
    }

    fn insert(&self, type_name: &str, renderable: &str, factory: ComponentFactory) {
        self.entries.write().insert(
            type_name.to_string(),
            RegisteredComponent {
                renderable: renderable.to_string(),
                factory,
            },
        );
    }

    pub fn lookup(&self, type_name: &str) -> Option<RegisteredComponent> {
        self.entries.read().get(type_name).cloned()
    }

    pub fn unregister(&self, type_name: &str) -> bool {
        self.entries.write().remove(type_name).is_some()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl FieldBehavior for Upper {
        fn format(&self, value: &Value) -> Value {
            match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other.clone(),
            }
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = TypeRegistry::new();
        registry.register_field("Upper", "upper-text", |_spec| Upper);
        registry.register_input("Text", "text-input");

        let entry = registry.lookup("Upper").unwrap();
        assert_eq!(entry.renderable, "upper-text");
        let ComponentFactory::Field(factory) = entry.factory else {
            panic!("expected a field factory");
        };
        let behavior = factory(&FieldSpec::default());
        assert!(!behavior.binds_value());
        assert_eq!(behavior.format(&Value::from("ab")), Value::from("AB"));

        assert!(registry.lookup("Missing").is_none());
        assert_eq!(registry.type_names(), vec!["Text", "Upper"]);
        assert!(registry.unregister("Text"));
    }
}
