use serde_json::Value;

use crate::metadata::Extra;

/// Properties every component carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentBase {
    pub name: String,
    pub css_class: String,
    pub grid_size: String,
    /// Metadata keys with no matching property, kept verbatim.
    pub extra: Extra,
}

impl ComponentBase {
    pub(crate) fn new(
        name: &str,
        css_class: Option<&String>,
        grid_size: Option<&String>,
        extra: &Extra,
    ) -> Self {
        Self {
            name: name.to_string(),
            css_class: css_class.cloned().unwrap_or_default(),
            grid_size: grid_size.cloned().unwrap_or_default(),
            extra: extra.clone(),
        }
    }

    /// Append a CSS class.
    pub fn add_css_class(&mut self, class: &str) {
        if class.is_empty() {
            return;
        }
        if self.css_class.is_empty() {
            self.css_class = class.to_string();
        } else {
            self.css_class.push(' ');
            self.css_class.push_str(class);
        }
    }

    /// Whether the class list contains `class`.
    pub fn has_css_class(&self, class: &str) -> bool {
        self.css_class.split_whitespace().any(|c| c == class)
    }

    /// An unmapped metadata value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_css_class() {
        let mut base = ComponentBase::default();
        base.add_css_class("card");
        base.add_css_class("wide");
        base.add_css_class("");
        assert_eq!(base.css_class, "card wide");
        assert!(base.has_css_class("wide"));
        assert!(!base.has_css_class("car"));
    }
}
