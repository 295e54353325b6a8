//! Filter templates.

use serde_json::Value;

use super::target::stringify;
use crate::error::BindError;

/// A string template with one placeholder replaced by the live value.
///
/// ```
/// use serde_json::json;
/// use tether_core::binding::FilterTemplate;
///
/// let filter = FilterTemplate::new("/users/{}/avatar.png", "{}").unwrap();
/// assert_eq!(filter.apply(&json!(42)), json!("/users/42/avatar.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate {
    prefix: String,
    suffix: String,
}

impl FilterTemplate {
    /// Parse `template`, which must contain `placeholder` exactly once.
    pub fn new(template: &str, placeholder: &str) -> Result<Self, BindError> {
        let mut parts = template.splitn(2, placeholder);
        let prefix = parts.next().unwrap_or_default();
        let Some(suffix) = parts.next() else {
            return Err(filter_error(template, placeholder));
        };
        if placeholder.is_empty() || suffix.contains(placeholder) {
            return Err(filter_error(template, placeholder));
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
        })
    }

    /// Whether `text` looks like a template rather than an attribute name.
    pub fn is_template(text: &str, placeholder: &str) -> bool {
        !placeholder.is_empty() && text.contains(placeholder)
    }

    /// Substitute `value` into the template.
    pub fn apply(&self, value: &Value) -> Value {
        Value::String(format!("{}{}{}", self.prefix, stringify(value), self.suffix))
    }
}

fn filter_error(template: &str, placeholder: &str) -> BindError {
    BindError::Filter {
        template: template.to_owned(),
        placeholder: placeholder.to_owned(),
    }
}
