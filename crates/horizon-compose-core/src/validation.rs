//! Named validation rules for inputs.
//!
//! A rule is a pure function of the value returning `Ok(())` or an error
//! message. Rules are produced by factories that receive the per-field
//! configuration (`message`, `limit`, ...), so a field's metadata may read
//! `{"validations": {"min": {"limit": 3, "message": "Too small"}}}`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::BuildError;

/// A validation rule.
pub type Rule = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Builds a rule from its configuration.
pub type RuleFactory = Arc<dyn Fn(&Map<String, Value>) -> Rule + Send + Sync>;

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[_a-z0-9-]+(\.[_a-z0-9-]+)*@[a-z0-9-]+(\.[a-z0-9-]+)*(\.[a-z]{2,4})$").ok()
});

fn message(config: &Map<String, Value>, default: String) -> String {
    config
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(default)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn format_limit(limit: f64) -> String {
    if limit.fract() == 0.0 && limit.abs() < 1e15 {
        format!("{}", limit as i64)
    } else {
        limit.to_string()
    }
}

/// Whether a value counts as filled in. Numbers always do, including zero.
fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn required(config: &Map<String, Value>) -> Rule {
    let message = message(config, "Required".to_string());
    Arc::new(move |value: &Value| {
        if is_filled(value) {
            Ok(())
        } else {
            Err(message.clone())
        }
    })
}

fn email(config: &Map<String, Value>) -> Rule {
    let message = message(config, "Invalid email".to_string());
    Arc::new(move |value: &Value| {
        let text = match value {
            Value::Null => return Ok(()),
            Value::String(s) if s.is_empty() => return Ok(()),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if EMAIL.as_ref().is_some_and(|pattern| pattern.is_match(&text)) {
            Ok(())
        } else {
            Err(message.clone())
        }
    })
}

fn bound(config: &Map<String, Value>, label: &str, accept: fn(f64, f64) -> bool) -> Rule {
    let limit = config.get("limit").and_then(as_number);
    let default = format!(
        "{label}: {}",
        limit.map(format_limit).unwrap_or_else(|| "NaN".to_string())
    );
    let message = message(config, default);
    Arc::new(move |value: &Value| match (limit, as_number(value)) {
        (Some(limit), Some(number)) if accept(number, limit) => Ok(()),
        _ => Err(message.clone()),
    })
}

fn min(config: &Map<String, Value>) -> Rule {
    bound(config, "Minimum value", |value, limit| value >= limit)
}

fn max(config: &Map<String, Value>) -> Rule {
    bound(config, "Maximum value", |value, limit| value <= limit)
}

/// Name to rule factory.
pub struct ValidationRegistry {
    factories: RwLock<HashMap<String, RuleFactory>>,
}

impl ValidationRegistry {
    /// A registry with `required`, `email`, `min` and `max`.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("required", required);
        registry.register("email", email);
        registry.register("min", min);
        registry.register("max", max);
        registry
    }

    /// A registry without built-in rules.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a rule factory.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Rule + Send + Sync + 'static,
    {
        self.factories.write().insert(name.into(), Arc::new(factory));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<RuleFactory, BuildError> {
        self.factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::UnknownValidation(name.to_string()))
    }

    /// Build the rule `name` with `config`.
    pub fn build(&self, name: &str, config: &Map<String, Value>) -> Result<Rule, BuildError> {
        let factory = self.get(name)?;
        Ok(factory(config))
    }
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValidationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self.factories.read();
        let mut names: Vec<&String> = factories.keys().collect();
        names.sort();
        f.debug_struct("ValidationRegistry").field("rules", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_required() {
        let registry = ValidationRegistry::new();
        let rule = registry.build("required", &Map::new()).unwrap();
        assert_eq!(rule(&json!(null)), Err("Required".to_string()));
        assert_eq!(rule(&json!("")), Err("Required".to_string()));
        assert_eq!(rule(&json!([])), Err("Required".to_string()));
        assert_eq!(rule(&json!(0)), Ok(()));
        assert_eq!(rule(&json!("x")), Ok(()));
        assert_eq!(rule(&json!([1])), Ok(()));
    }

    #[test]
    fn test_email() {
        let registry = ValidationRegistry::new();
        let rule = registry.build("email", &Map::new()).unwrap();
        assert_eq!(rule(&json!("")), Ok(()));
        assert_eq!(rule(&json!("jane.doe@example.com")), Ok(()));
        assert_eq!(rule(&json!("jane@")), Err("Invalid email".to_string()));
    }

    #[test]
    fn test_min_max_messages() {
        let registry = ValidationRegistry::new();
        let min = registry.build("min", &config(json!({"limit": 3}))).unwrap();
        assert_eq!(min(&json!(3)), Ok(()));
        assert_eq!(min(&json!("4")), Ok(()));
        assert_eq!(min(&json!(2)), Err("Minimum value: 3".to_string()));
        assert_eq!(min(&json!("abc")), Err("Minimum value: 3".to_string()));

        let max = registry
            .build("max", &config(json!({"limit": 2.5, "message": "Too big"})))
            .unwrap();
        assert_eq!(max(&json!(2)), Ok(()));
        assert_eq!(max(&json!(3)), Err("Too big".to_string()));
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ValidationRegistry::empty();
        assert!(matches!(
            registry.get("even"),
            Err(BuildError::UnknownValidation(name)) if name == "even"
        ));

        registry.register("even", |_config| -> Rule {
            Arc::new(|value: &Value| match value.as_i64() {
                Some(n) if n % 2 == 0 => Ok(()),
                _ => Err("Must be even".to_string()),
            })
        });
        let rule = registry.build("even", &Map::new()).unwrap();
        assert_eq!(rule(&json!(4)), Ok(()));
        assert!(registry.unregister("even"));
        assert!(!registry.contains("even"));
    }
}
