//! Serde representation of container metadata.
//!
//! Keys are camelCase as they appear in metadata documents. Keys that do not
//! map onto a known property are kept verbatim in `extra` and copied onto the
//! built component.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::datasource::{DatasourceType, Row};
use crate::error::BuildError;

/// Unknown metadata keys, copied onto the component.
pub type Extra = Map<String, Value>;

/// Event name to `"Controller.method"` reference.
pub type EventSpecs = BTreeMap<String, String>;

/// Description of a container (one screen).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// CSS classes, space separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,
    /// Grid sizing hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<String>,
    /// Page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Controller whose lifecycle methods are subscribed to container phases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_menu: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_footer: Option<bool>,
    /// Top-level widgets, in order.
    #[serde(default)]
    pub widgets: Vec<WidgetSpec>,
    /// Unknown keys.
    #[serde(flatten)]
    pub extra: Extra,
}

impl ContainerSpec {
    /// Parse a metadata document.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, BuildError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The container shown when metadata for a screen does not exist.
    pub fn not_found() -> Self {
        Self {
            name: "notFound".to_string(),
            widgets: vec![WidgetSpec {
                name: "notFound".to_string(),
                widget_type: "NotFound".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

/// Description of a widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    pub name: String,
    /// Registered type name.
    #[serde(rename = "type", default)]
    pub widget_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_as_card: Option<bool>,
    /// Initial row for the widget's datasource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_row: Option<Row>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: EventSpecs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DatasourceSpec>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Nested widgets.
    #[serde(default)]
    pub widgets: Vec<WidgetSpec>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Description of a field. Input-specific keys are ignored for field types
/// that do not bind a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: EventSpecs,
    /// Initial value, used when the row has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    /// Validation name to rule configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validations: BTreeMap<String, Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Description of a widget's datasource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSpec {
    #[serde(default)]
    pub route: String,
    /// Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<bool>,
    /// Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_load: Option<bool>,
    /// Defaults to `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_url: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub datasource_type: Option<DatasourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_row: Option<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Extra,
}
