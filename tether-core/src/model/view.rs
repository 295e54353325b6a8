//! Lazy model views.
//!
//! A view is `(model, scope, steps)`: a handle plus the accessor steps that
//! lead to it. It holds no reference into the tree. Every read and write
//! walks down from the root again, so a view whose subtree has been
//! replaced wholesale sees the replacement, and a view whose subtree has
//! disappeared reads as missing and ignores writes.

use std::fmt;

use serde_json::Value;

use super::observable::{extend, Model, Scope};
use super::tree;
use crate::path::{self, PathKey, Steps};
use crate::tracker::OwnerId;

/// Result of reading one key through a view.
#[derive(Debug, Clone)]
pub enum Access {
    /// A scalar (`null`, bool, number or string), cloned out of the tree.
    Value(Value),
    /// An object or array, wrapped in a fresh view.
    View(View),
    /// Nothing at that key, or the view itself is stale.
    Missing,
}

impl Access {
    /// The value, snapshotting views.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::View(view) => view.value(),
            Self::Missing => None,
        }
    }

    /// The view, if the key held a container.
    pub fn into_view(self) -> Option<View> {
        match self {
            Self::View(view) => Some(view),
            _ => None,
        }
    }

    /// Whether the key was missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// A path-scoped window onto a [`Model`].
#[derive(Clone)]
pub struct View {
    model: Model,
    /// `None` for the top-level view, where each key picks its own scope.
    scope: Option<Scope>,
    steps: Steps,
    path: String,
}

impl View {
    pub(crate) fn top(model: Model) -> Self {
        Self {
            model,
            scope: None,
            steps: Steps::new(),
            path: String::new(),
        }
    }

    pub(crate) fn scoped(model: Model, scope: Scope, steps: Steps) -> Self {
        let path = path::resolve_all(&steps);
        Self {
            model,
            scope: Some(scope),
            steps,
            path,
        }
    }

    /// The model this view belongs to.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Canonical path of this view; empty for the top level.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Accessor steps leading to this view.
    pub fn steps(&self) -> &[PathKey] {
        &self.steps
    }

    /// Path of `key` below this view.
    pub fn path_of(&self, key: impl Into<PathKey>) -> String {
        path::resolve(&self.path, &key.into())
    }

    /// Read `key`.
    pub fn get(&self, key: impl Into<PathKey>) -> Access {
        let (scope, steps) = self.child(key.into());
        self.model
            .with_at(scope, &steps, |value| {
                if tree::is_container(value) {
                    None
                } else {
                    Some(value.clone())
                }
            })
            .map_or(Access::Missing, |scalar| match scalar {
                Some(value) => Access::Value(value),
                None => Access::View(View::scoped(self.model.clone(), scope, steps)),
            })
    }

    /// Read `key` as a nested view.
    pub fn view(&self, key: impl Into<PathKey>) -> Option<View> {
        self.get(key).into_view()
    }

    /// Snapshot of the subtree under this view.
    pub fn value(&self) -> Option<Value> {
        match self.scope {
            None => Some(self.model.snapshot()),
            Some(scope) => self.model.read_at(scope, &self.steps),
        }
    }

    /// Number of elements or fields, if this view is a container.
    pub fn len(&self) -> Option<usize> {
        let count = |value: &Value| match value {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        };
        match self.scope {
            None => self.model.with_value(count),
            Some(scope) => self.model.with_at(scope, &self.steps, count).flatten(),
        }
    }

    /// Whether the view is an empty container. Stale views are not empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Whether the slot this view addresses still exists.
    pub fn is_live(&self) -> bool {
        match self.scope {
            None => true,
            Some(scope) => self.model.with_at(scope, &self.steps, |_| ()).is_some(),
        }
    }

    /// Write `value` at `key` and publish it, tagged with `committer`.
    ///
    /// Returns `false`, without publishing, if this view is stale.
    pub fn set(&self, key: impl Into<PathKey>, value: Value, committer: Option<OwnerId>) -> bool {
        let (scope, steps) = self.child(key.into());
        self.model.write_at(scope, &steps, value, committer)
    }

    /// Append `value` to the array this view addresses.
    ///
    /// Returns `false` if the view is not an array.
    pub fn push(&self, value: Value, committer: Option<OwnerId>) -> bool {
        let Some(scope) = self.scope else {
            return false;
        };
        let Some(len) = self
            .model
            .with_at(scope, &self.steps, |value| value.as_array().map(Vec::len))
            .flatten()
        else {
            return false;
        };
        self.set(len, value, committer)
    }

    /// Remove `key` and publish the removal.
    pub fn remove(&self, key: impl Into<PathKey>, committer: Option<OwnerId>) -> bool {
        let (scope, steps) = self.child(key.into());
        self.model.remove_at(scope, &steps, committer)
    }

    fn child(&self, key: PathKey) -> (Scope, Steps) {
        match self.scope {
            Some(scope) => (scope, extend(&self.steps, key)),
            None => {
                let scope = self.model.scope_for(&key);
                let mut steps = Steps::new();
                steps.push(key);
                (scope, steps)
            }
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("model", self.model.id())
            .field("path", &self.path)
            .finish()
    }
}
