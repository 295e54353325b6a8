//! The bound-target contract.
//!
//! A target is anything outside the engine whose attributes mirror model
//! state: a UI node, a terminal widget, a test double. The rendering layer
//! implements [`BindTarget`] for its node type; the engine only ever talks
//! to targets through this trait.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::tracker::Owner;

/// Identifies one input listener on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Called when the user edits a target.
pub type InputListener = Arc<dyn Fn() + Send + Sync>;

/// Broad category of a target, used to pick its attribute strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A checkbox; bound through `checked`.
    Checkbox,
    /// A radio button; bound through `checked`.
    Radio,
    /// A single-line text field; bound through `value`.
    TextInput,
    /// A multi-line text field; bound through `value`.
    TextArea,
    /// A drop-down; bound through `value`.
    Select,
    /// Anything else; bound through its text content.
    Other,
}

impl TargetKind {
    /// The attribute a binding uses when none is named.
    pub fn default_attr(self) -> Attr {
        match self {
            Self::Checkbox | Self::Radio => Attr::Checked,
            Self::TextInput | Self::TextArea | Self::Select => Attr::Value,
            Self::Other => Attr::TextContent,
        }
    }

    /// Whether users can edit the target, making two-way binding the
    /// natural default.
    pub fn accepts_input(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A bindable attribute of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attr {
    /// Boolean checked state.
    Checked,
    /// The editable value of a form field.
    Value,
    /// The rendered text.
    TextContent,
    /// Any other named attribute (`href`, `class`, ...).
    Named(String),
}

impl Attr {
    /// Map an attribute name to an attribute.
    pub fn parse(name: &str) -> Self {
        match name {
            "checked" => Self::Checked,
            "value" => Self::Value,
            "text" | "textContent" => Self::TextContent,
            other => Self::Named(other.to_owned()),
        }
    }

    /// Shape `value` the way this attribute stores it.
    ///
    /// `checked` holds a boolean, text content holds a string, `value`
    /// holds whatever it is given except that `null` clears it. Named
    /// attributes are passed through untouched.
    pub fn coerce(&self, value: Value) -> Value {
        match self {
            Self::Checked => Value::Bool(truthy(&value)),
            Self::TextContent => Value::String(stringify(&value)),
            Self::Value if value.is_null() => Value::String(String::new()),
            Self::Value | Self::Named(_) => value,
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checked => f.write_str("checked"),
            Self::Value => f.write_str("value"),
            Self::TextContent => f.write_str("textContent"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Something the engine can bind to.
pub trait BindTarget: Owner + Send + Sync {
    /// The target's kind.
    fn kind(&self) -> TargetKind;

    /// Read an attribute. Unset attributes read as `null`.
    fn get_attr(&self, attr: &Attr) -> Value;

    /// Write an attribute on behalf of the engine.
    fn set_attr(&self, attr: &Attr, value: Value);

    /// Register a listener for user edits.
    fn add_input_listener(&self, listener: InputListener) -> ListenerId;

    /// Remove a listener. Returns whether it was registered.
    fn remove_input_listener(&self, id: ListenerId) -> bool;
}

/// Truthiness used for boolean attributes.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a value: strings unquoted, `null` empty, the rest as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_picks_strategy() {
        assert_eq!(TargetKind::Checkbox.default_attr(), Attr::Checked);
        assert_eq!(TargetKind::Radio.default_attr(), Attr::Checked);
        assert_eq!(TargetKind::TextInput.default_attr(), Attr::Value);
        assert_eq!(TargetKind::Select.default_attr(), Attr::Value);
        assert_eq!(TargetKind::Other.default_attr(), Attr::TextContent);
    }

    #[test]
    fn attr_names_round_trip() {
        for name in ["checked", "value", "textContent", "href"] {
            assert_eq!(Attr::parse(name).to_string(), name);
        }
        assert_eq!(Attr::parse("text"), Attr::TextContent);
    }

    #[test]
    fn coercion_per_attribute() {
        assert_eq!(Attr::Checked.coerce(json!(1)), json!(true));
        assert_eq!(Attr::Checked.coerce(json!("")), json!(false));
        assert_eq!(Attr::TextContent.coerce(json!(42)), json!("42"));
        assert_eq!(Attr::TextContent.coerce(json!(null)), json!(""));
        assert_eq!(Attr::Value.coerce(json!(null)), json!(""));
        assert_eq!(Attr::Value.coerce(json!(7)), json!(7));
        assert_eq!(Attr::Named("data".into()).coerce(json!([1])), json!([1]));
    }
}
