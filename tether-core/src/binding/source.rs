//! Sources: the two ends of a binding.
//!
//! A [`Source`] can be read, written, and watched. A connection pairs a
//! [`ModelSource`] with a [`TargetSource`] and forwards changes between
//! them.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::filter::FilterTemplate;
use super::target::{Attr, BindTarget, ListenerId};
use crate::bus::{Callback, Change, Token};
use crate::logging::targets;
use crate::model::Model;
use crate::tracker::OwnerId;

/// Derives a bound value from the whole model.
pub type Accessor = Arc<dyn Fn(&Model) -> Value + Send + Sync>;

/// The read/write/watch capability of one end of a binding.
pub trait Source: Send + Sync {
    /// Current value.
    fn get(&self) -> Value;

    /// Apply an incoming value that `committer` produced.
    fn set(&self, value: Value, committer: Option<OwnerId>);

    /// Start reporting changes on this side to `callback`.
    ///
    /// A source holds at most one subscription; subscribing again replaces
    /// the previous one.
    fn subscribe(&self, callback: Callback);

    /// Stop reporting changes. Safe to call repeatedly.
    fn unsubscribe(&self);

    /// Whether a subscription is active.
    fn is_subscribed(&self) -> bool;
}

/// What a [`ModelSource`] reads.
#[derive(Clone)]
pub enum Bindable {
    /// A path into the model; readable and writable.
    Path(String),
    /// A derived value; read-only, recomputed on every model write.
    Accessor(Accessor),
}

impl Bindable {
    /// Wrap an accessor function.
    pub fn accessor<F>(f: F) -> Self
    where
        F: Fn(&Model) -> Value + Send + Sync + 'static,
    {
        Self::Accessor(Arc::new(f))
    }

    /// The path, for path bindings.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Accessor(_) => None,
        }
    }
}

impl From<&str> for Bindable {
    fn from(path: &str) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<String> for Bindable {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl fmt::Debug for Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

// ----------------------------------------------------------------------------
// Model side
// ----------------------------------------------------------------------------

/// The model end of a binding.
pub struct ModelSource {
    model: Model,
    bindable: Bindable,
    subscription: Mutex<Option<(String, Token)>>,
}

impl ModelSource {
    /// A source reading `bindable` from `model`.
    pub fn new(model: Model, bindable: Bindable) -> Self {
        Self {
            model,
            bindable,
            subscription: Mutex::new(None),
        }
    }

    /// The topic this source listens on.
    pub fn topic(&self) -> String {
        match &self.bindable {
            Bindable::Path(path) => self.model.topic(path),
            Bindable::Accessor(_) => self.model.change_topic(),
        }
    }

    /// The model this source reads.
    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl Source for ModelSource {
    fn get(&self) -> Value {
        match &self.bindable {
            Bindable::Path(path) => self.model.get_path(path).unwrap_or(Value::Null),
            Bindable::Accessor(accessor) => accessor(&self.model),
        }
    }

    fn set(&self, value: Value, committer: Option<OwnerId>) {
        let Bindable::Path(path) = &self.bindable else {
            tracing::debug!(
                target: targets::BINDING,
                model = %self.model.id(),
                "write to accessor binding ignored"
            );
            return;
        };
        match self.model.set_path(path, value, committer) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                target: targets::BINDING,
                model = %self.model.id(),
                path = path.as_str(),
                "target edit landed on a stale path"
            ),
            Err(err) => tracing::warn!(
                target: targets::BINDING,
                model = %self.model.id(),
                error = %err,
                "target edit on malformed path"
            ),
        }
    }

    fn subscribe(&self, callback: Callback) {
        self.unsubscribe();

        let topic = self.topic();
        let callback: Callback = match &self.bindable {
            Bindable::Path(_) => callback,
            Bindable::Accessor(accessor) => {
                // Whole-model changes carry the written value; replace it
                // with the derived one.
                let accessor = Arc::clone(accessor);
                let model = self.model.clone();
                Arc::new(move |change: &Change| {
                    let derived = Change {
                        value: accessor(&model),
                        committer: change.committer,
                        path: change.path.clone(),
                    };
                    callback(&derived);
                })
            }
        };
        let token = self.model.bus().on_arc(&topic, callback);
        *self.subscription.lock() = Some((topic, token));
    }

    fn unsubscribe(&self) {
        let taken = self.subscription.lock().take();
        if let Some((topic, token)) = taken {
            self.model.bus().off(&topic, token);
        }
    }

    fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSource")
            .field("model", self.model.id())
            .field("bindable", &self.bindable)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Target side
// ----------------------------------------------------------------------------

/// The target end of a binding.
pub struct TargetSource {
    target: Arc<dyn BindTarget>,
    attr: Attr,
    filter: Option<FilterTemplate>,
    listener: Mutex<Option<ListenerId>>,
}

impl TargetSource {
    /// A source writing `attr` on `target`, optionally through `filter`.
    pub fn new(target: Arc<dyn BindTarget>, attr: Attr, filter: Option<FilterTemplate>) -> Self {
        Self {
            target,
            attr,
            filter,
            listener: Mutex::new(None),
        }
    }

    /// The owning target's id.
    pub fn owner(&self) -> OwnerId {
        self.target.owner_id()
    }

    /// The attribute this source writes.
    pub fn attr(&self) -> &Attr {
        &self.attr
    }
}

impl Source for TargetSource {
    fn get(&self) -> Value {
        self.target.get_attr(&self.attr)
    }

    fn set(&self, value: Value, committer: Option<OwnerId>) {
        let owner = self.owner();
        if committer == Some(owner) {
            tracing::trace!(
                target: targets::BINDING,
                %owner,
                attr = %self.attr,
                "echo suppressed"
            );
            return;
        }
        let value = match &self.filter {
            Some(filter) => filter.apply(&value),
            None => value,
        };
        self.target.set_attr(&self.attr, self.attr.coerce(value));
    }

    fn subscribe(&self, callback: Callback) {
        self.unsubscribe();

        let owner = self.owner();
        let attr = self.attr.clone();
        let target = Arc::downgrade(&self.target);
        let id = self.target.add_input_listener(Arc::new(move || {
            let Some(target) = target.upgrade() else {
                return;
            };
            let change = Change::new(target.get_attr(&attr)).committed_by(Some(owner));
            callback(&change);
        }));
        *self.listener.lock() = Some(id);
    }

    fn unsubscribe(&self) {
        let taken = self.listener.lock().take();
        if let Some(id) = taken {
            self.target.remove_input_listener(id);
        }
    }

    fn is_subscribed(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl fmt::Debug for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSource")
            .field("owner", &self.owner())
            .field("attr", &self.attr)
            .field("filter", &self.filter)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
