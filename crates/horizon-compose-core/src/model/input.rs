use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::datasource::Datasource;
use crate::error::BuildError;
use crate::registry::FieldBehavior;
use crate::validation::{Rule, ValidationRegistry};

/// Behavior of the built-in value-binding field.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputBehavior;

impl FieldBehavior for InputBehavior {
    fn binds_value(&self) -> bool {
        true
    }
}

/// Value binding of a field.
///
/// The value lives in the owning widget's datasource, under the field's
/// name in `current_row`.
pub struct Input {
    name: String,
    datasource: Datasource,
    store_path: Option<String>,
    rules: BTreeMap<String, Rule>,
}

impl Input {
    /// Bind `name` to the datasource row. `initial` is written only when
    /// the row has no value yet.
    pub(crate) fn bind(
        name: &str,
        datasource: Datasource,
        initial: Option<Value>,
        store_path: Option<String>,
        validations: &BTreeMap<String, Map<String, Value>>,
        registry: &ValidationRegistry,
    ) -> Result<Self, BuildError> {
        if let Some(initial) = initial
            && datasource.current_row_value(name).is_none()
        {
            datasource.set_current_row_value(name, initial);
        }

        let mut input = Self {
            name: name.to_string(),
            datasource,
            store_path,
            rules: BTreeMap::new(),
        };
        for (rule, config) in validations {
            input.add_validation(registry, rule, config)?;
        }
        Ok(input)
    }

    pub fn value(&self) -> Option<Value> {
        self.datasource.current_row_value(&self.name)
    }

    pub fn set_value(&self, value: Value) {
        self.datasource.set_current_row_value(self.name.clone(), value);
    }

    pub fn store_path(&self) -> Option<&str> {
        self.store_path.as_deref()
    }

    /// Attach the registered rule `name`.
    pub fn add_validation(
        &mut self,
        registry: &ValidationRegistry,
        name: &str,
        config: &Map<String, Value>,
    ) -> Result<(), BuildError> {
        let rule = registry.build(name, config)?;
        self.rules.insert(name.to_string(), rule);
        Ok(())
    }

    /// Attach an ad-hoc rule.
    pub fn add_rule(&mut self, name: impl Into<String>, rule: Rule) {
        self.rules.insert(name.into(), rule);
    }

    pub fn remove_validation(&mut self, name: &str) -> bool {
        self.rules.remove(name).is_some()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Run every rule against the current value; returns failure messages
    /// in rule-name order.
    pub fn validate(&self) -> Vec<String> {
        let value = self.value().unwrap_or(Value::Null);
        self.rules
            .values()
            .filter_map(|rule| rule(&value).err())
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("name", &self.name)
            .field("store_path", &self.store_path)
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DatasourceContext;
    use crate::metadata::DatasourceSpec;
    use serde_json::json;

    fn datasource(row: Value) -> Datasource {
        Datasource::new(
            &DatasourceSpec::default(),
            row.as_object().cloned(),
            &DatasourceContext::default(),
        )
    }

    #[test]
    fn test_row_value_wins_over_initial() {
        let ds = datasource(json!({"name": "Jane"}));
        let input = Input::bind("name", ds.clone(), Some(json!("default")), None, &BTreeMap::new(), &ValidationRegistry::new()).unwrap();
        assert_eq!(input.value(), Some(json!("Jane")));

        let other = Input::bind("city", ds.clone(), Some(json!("Paris")), None, &BTreeMap::new(), &ValidationRegistry::new()).unwrap();
        assert_eq!(other.value(), Some(json!("Paris")));
        assert_eq!(ds.current_row_value("city"), Some(json!("Paris")));
    }

    #[test]
    fn test_validate_collects_messages() {
        let ds = datasource(json!({}));
        let mut validations = BTreeMap::new();
        validations.insert("required".to_string(), Map::new());
        validations.insert("email".to_string(), Map::new());
        let input = Input::bind("email", ds, None, Some("user.email".into()), &validations, &ValidationRegistry::new()).unwrap();

        assert_eq!(input.store_path(), Some("user.email"));
        assert_eq!(input.validate(), vec!["Required".to_string()]);

        input.set_value(json!("nope"));
        assert_eq!(input.validate(), vec!["Invalid email".to_string()]);

        input.set_value(json!("a@b.io"));
        assert!(input.is_valid());
    }

    #[test]
    fn test_unknown_validation_fails_bind() {
        let mut validations = BTreeMap::new();
        validations.insert("zip".to_string(), Map::new());
        let result = Input::bind("zip", datasource(json!({})), None, None, &validations, &ValidationRegistry::new());
        assert!(matches!(result, Err(BuildError::UnknownValidation(_))));
    }
}
