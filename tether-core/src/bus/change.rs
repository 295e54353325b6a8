//! Published messages and subscription tokens.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::tracker::OwnerId;

/// A per-topic subscriber callback.
pub type Callback = Arc<dyn Fn(&Change) + Send + Sync>;

/// The catch-all observer. Receives the topic ahead of the change.
pub type SinkCallback = Arc<dyn Fn(&str, &Change) + Send + Sync>;

/// Identifies one subscription for targeted removal.
///
/// Tokens come from a counter shared by the whole bus, so they increase
/// monotonically within every topic and are never handed out twice, even
/// after a topic is removed and re-populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub(crate) u64);

impl Token {
    /// Get the raw token value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The tuple delivered to subscribers.
///
/// `committer` names whoever originated the write. A binding compares it with
/// its own target to avoid re-applying a value that target just produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// The new value.
    pub value: Value,

    /// The originator of the write, if any.
    pub committer: Option<OwnerId>,

    /// The model path that changed, for model-originated publishes.
    pub path: Option<String>,
}

impl Change {
    /// A change carrying only a value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            committer: None,
            path: None,
        }
    }

    /// Tag the change with its originator.
    pub fn committed_by(mut self, committer: Option<OwnerId>) -> Self {
        self.committer = committer;
        self
    }

    /// Record the model path the change applies to.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether `owner` originated this change.
    pub fn is_from(&self, owner: OwnerId) -> bool {
        self.committer == Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn committer_matches_only_its_owner() {
        let a = OwnerId::new();
        let b = OwnerId::new();
        let change = Change::new(json!(1)).committed_by(Some(a));

        assert!(change.is_from(a));
        assert!(!change.is_from(b));
        assert!(!Change::new(json!(1)).is_from(a));
    }

    #[test]
    fn builder_sets_path() {
        let change = Change::new("x").at_path("items[0]");
        assert_eq!(change.path.as_deref(), Some("items[0]"));
        assert_eq!(change.value, Value::String("x".into()));
    }
}
