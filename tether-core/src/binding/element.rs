//! A headless bound target.
//!
//! `Element` keeps its attributes in memory and lets callers simulate user
//! edits. Collaborators without a real widget tree (command-line front ends,
//! server-side renderers) bind against it directly, and it is the target
//! used throughout the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::target::{Attr, BindTarget, InputListener, ListenerId, TargetKind};
use crate::tracker::{Owner, OwnerId, OwnerSlot};

/// An in-memory target.
pub struct Element {
    owner: OwnerSlot,
    kind: TargetKind,
    attrs: RwLock<HashMap<Attr, Value>>,
    listeners: Mutex<IndexMap<ListenerId, InputListener>>,
    next_listener: AtomicU64,
    /// Number of engine-driven attribute writes.
    writes: AtomicUsize,
}

impl Element {
    /// Create an element of the given kind.
    pub fn new(kind: TargetKind) -> Arc<Self> {
        Arc::new(Self {
            owner: OwnerSlot::new(),
            kind,
            attrs: RwLock::new(HashMap::new()),
            listeners: Mutex::new(IndexMap::new()),
            next_listener: AtomicU64::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    /// A single-line text field.
    pub fn text_input() -> Arc<Self> {
        Self::new(TargetKind::TextInput)
    }

    /// A checkbox.
    pub fn checkbox() -> Arc<Self> {
        Self::new(TargetKind::Checkbox)
    }

    /// A plain text node.
    pub fn text() -> Arc<Self> {
        Self::new(TargetKind::Other)
    }

    /// Simulate a user edit of the element's primary attribute.
    ///
    /// The attribute is stored directly (this is not an engine write) and
    /// every input listener is then notified.
    pub fn input(&self, value: Value) {
        let attr = self.kind.default_attr();
        self.attrs.write().insert(attr, value);

        let listeners: Vec<InputListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of writes the engine has made to this element.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of registered input listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Owner for Element {
    fn owner_id(&self) -> OwnerId {
        self.owner.id()
    }
}

impl BindTarget for Element {
    fn kind(&self) -> TargetKind {
        self.kind
    }

    fn get_attr(&self, attr: &Attr) -> Value {
        self.attrs.read().get(attr).cloned().unwrap_or(Value::Null)
    }

    fn set_attr(&self, attr: &Attr, value: Value) {
        self.attrs.write().insert(attr.clone(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn add_input_listener(&self, listener: InputListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, listener);
        id
    }

    fn remove_input_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("owner", &self.owner.peek())
            .field("kind", &self.kind)
            .field("write_count", &self.write_count())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_updates_attr_and_notifies() {
        let element = Element::text_input();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        element.add_input_listener(Arc::new(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        element.input(json!("typed"));
        assert_eq!(element.get_attr(&Attr::Value), json!("typed"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(element.write_count(), 0);
    }

    #[test]
    fn removed_listener_is_silent() {
        let element = Element::checkbox();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let id = element.add_input_listener(Arc::new(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(element.remove_input_listener(id));
        assert!(!element.remove_input_listener(id));
        element.input(json!(true));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn owner_id_is_stable() {
        let element = Element::text();
        assert_eq!(element.owner_id(), element.owner_id());
        assert_ne!(element.owner_id(), Element::text().owner_id());
    }
}
