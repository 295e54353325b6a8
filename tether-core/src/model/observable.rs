//! Observable Model Implementation

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::id::ModelId;
use super::options::ModelOptions;
use super::tree;
use super::view::View;
use crate::bus::{Change, ChangeBus, Token};
use crate::error::PathError;
use crate::logging::targets;
use crate::path::{self, PathKey, Steps};
use crate::tracker::OwnerId;

/// Suffix of the whole-model topic.
pub const CHANGE_SUFFIX: &str = "change";

/// Separates a model id from [`CHANGE_SUFFIX`]. Path topics use `:`, so no
/// field name can collide with the whole-model topic.
const CHANGE_SEPARATOR: char = '/';

/// Which bucket of the backing tree a path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// The literal root object.
    Root,
    /// The configured data-root bucket.
    Data,
}

struct ModelInner {
    id: ModelId,
    data: RwLock<Value>,
    data_root: Option<String>,
    bus: Arc<ChangeBus>,
}

/// An observable wrapper around a JSON tree.
///
/// Reads go through [`View`]s; writes resolve the written path, mutate the
/// tree and then publish a [`Change`] on `modelId:path`. Cloning a `Model`
/// is cheap and yields another handle to the same tree.
///
/// # Data Root
///
/// A model may keep its bindable state in a nested bucket (the *data root*)
/// next to non-reactive root-level fields. A top-level key is looked up
/// among the root's own keys first and then inside the bucket, so both
/// kinds of field are addressed uniformly. A key that exists in both
/// places resolves to the root-level one; this precedence is deliberate.
/// New keys written at the top level go into the bucket.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tether_core::bus::ChangeBus;
/// use tether_core::model::{Model, ModelOptions};
/// use std::sync::Arc;
///
/// let bus = Arc::new(ChangeBus::new());
/// let model = Model::with_bus(json!({ "items": [] }), ModelOptions::new(), bus);
///
/// model.set_path("items[0]", json!({ "name": "a" }), None).unwrap();
/// assert_eq!(model.get_path("items[0].name"), Some(json!("a")));
/// ```
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Wrap `initial`, publishing on the process-wide bus.
    pub fn new(initial: Value, options: ModelOptions) -> Self {
        Self::with_bus(initial, options, ChangeBus::global())
    }

    /// Wrap `initial`, publishing on `bus`.
    pub fn with_bus(initial: Value, options: ModelOptions, bus: Arc<ChangeBus>) -> Self {
        let id = ModelId::next(options.kind_or_default());
        let mut data = initial;
        if let (Some(root_key), Value::Object(map)) = (&options.data_root, &mut data) {
            map.entry(root_key.clone())
                .or_insert_with(|| Value::Object(Default::default()));
        }

        tracing::debug!(target: targets::MODEL, model = %id, "model created");
        Self {
            inner: Arc::new(ModelInner {
                id,
                data: RwLock::new(data),
                data_root: options.data_root,
                bus,
            }),
        }
    }

    /// Get the model's unique ID.
    pub fn id(&self) -> &ModelId {
        &self.inner.id
    }

    /// The data-root key, if one is configured.
    pub fn data_root(&self) -> Option<&str> {
        self.inner.data_root.as_deref()
    }

    /// The bus this model publishes on.
    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.inner.bus
    }

    /// Topic for `path`: `modelId:path`.
    pub fn topic(&self, path: &str) -> String {
        format!("{}:{path}", self.inner.id)
    }

    /// Topic that receives every write to this model: `modelId/change`.
    pub fn change_topic(&self) -> String {
        format!("{}{CHANGE_SEPARATOR}{CHANGE_SUFFIX}", self.inner.id)
    }

    /// Subscribe to writes at exactly `path` (and wholesale writes above it).
    pub fn on<F>(&self, path: &str, callback: F) -> Token
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.bus.on(&self.topic(path), callback)
    }

    /// Subscribe to every write to this model.
    pub fn on_change<F>(&self, callback: F) -> Token
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.inner.bus.on(&self.change_topic(), callback)
    }

    /// Whether two handles share one tree.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A view over the top level of the model.
    pub fn root(&self) -> View {
        View::top(self.clone())
    }

    /// A view at `path`. The path is not checked against the tree.
    pub fn view(&self, path: &str) -> Result<View, PathError> {
        let steps = path::parse(path)?;
        Ok(match steps.first() {
            None => self.root(),
            Some(first) => {
                let scope = self.scope_for(first);
                View::scoped(self.clone(), scope, steps)
            }
        })
    }

    /// Clone of the whole backing tree.
    pub fn snapshot(&self) -> Value {
        self.inner.data.read().clone()
    }

    /// Run `f` against the backing tree without cloning it.
    pub fn with_value<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Value) -> R,
    {
        f(&self.inner.data.read())
    }

    /// Read the value at `path`. Malformed and missing paths read as `None`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let steps = path::parse(path).ok()?;
        match steps.first() {
            None => Some(self.snapshot()),
            Some(first) => {
                let scope = self.scope_for(first);
                self.read_at(scope, &steps)
            }
        }
    }

    /// Write `value` at `path`. The empty path replaces the whole tree.
    ///
    /// Returns `Ok(false)` when the path is well formed but cannot be
    /// written (a missing or scalar intermediate container).
    pub fn set_path(
        &self,
        path: &str,
        value: Value,
        committer: Option<OwnerId>,
    ) -> Result<bool, PathError> {
        let steps = path::parse(path)?;
        Ok(match steps.first() {
            None => {
                self.replace(value, committer);
                true
            }
            Some(first) => {
                let scope = self.scope_for(first);
                self.write_at(scope, &steps, value, committer)
            }
        })
    }

    /// Replace the whole tree and republish every subscribed topic.
    pub fn replace(&self, value: Value, committer: Option<OwnerId>) {
        {
            let mut data = self.inner.data.write();
            *data = value.clone();
            if let (Some(root_key), Value::Object(map)) = (&self.inner.data_root, &mut *data) {
                map.entry(root_key.clone())
                    .or_insert_with(|| Value::Object(Default::default()));
            }
        }
        tracing::debug!(target: targets::MODEL, model = %self.inner.id, "model replaced");
        self.notify_descendants(Scope::Root, "", committer);
        self.publish_model_change("", value, committer);
    }

    // ------------------------------------------------------------------------
    // Internal access used by views
    // ------------------------------------------------------------------------

    /// Decide whether a top-level key lives at the root or in the data root.
    ///
    /// This takes its own read lock, separate from the write that follows.
    /// A concurrent write adding a root-level key in between can only move
    /// the next write to the other bucket; it never tears the tree.
    pub(crate) fn scope_for(&self, first: &PathKey) -> Scope {
        let Some(root_key) = &self.inner.data_root else {
            return Scope::Root;
        };
        let field = first.as_field();
        let at_root = field == *root_key
            || self
                .inner
                .data
                .read()
                .as_object()
                .is_some_and(|map| map.contains_key(&field));
        if at_root {
            Scope::Root
        } else {
            Scope::Data
        }
    }

    /// Run `f` against the value at `steps`, if it exists.
    pub(crate) fn with_at<F, R>(&self, scope: Scope, steps: &[PathKey], f: F) -> Option<R>
    where
        F: FnOnce(&Value) -> R,
    {
        let data = self.inner.data.read();
        let base = self.base(&data, scope)?;
        tree::lookup(base, steps).map(f)
    }

    pub(crate) fn read_at(&self, scope: Scope, steps: &[PathKey]) -> Option<Value> {
        self.with_at(scope, steps, Value::clone)
    }

    /// Assign `value` at `steps` and publish.
    pub(crate) fn write_at(
        &self,
        scope: Scope,
        steps: &[PathKey],
        value: Value,
        committer: Option<OwnerId>,
    ) -> bool {
        let Some((last, parents)) = steps.split_last() else {
            return false;
        };
        let path = path::resolve_all(steps);

        let applied = {
            let mut data = self.inner.data.write();
            self.base_mut(&mut data, scope)
                .and_then(|base| tree::lookup_mut(base, parents))
                .is_some_and(|parent| tree::assign(parent, last, value.clone()))
        };

        if !applied {
            tracing::debug!(
                target: targets::MODEL,
                model = %self.inner.id,
                path = path.as_str(),
                "write through stale path ignored"
            );
            return false;
        }

        self.notify(scope, &path, value, committer);
        true
    }

    /// Remove the slot at `steps` and publish.
    ///
    /// Removing an array element shifts its siblings, so the whole array is
    /// republished; removing an object key publishes `null` for that key.
    pub(crate) fn remove_at(
        &self,
        scope: Scope,
        steps: &[PathKey],
        committer: Option<OwnerId>,
    ) -> bool {
        let Some((last, parents)) = steps.split_last() else {
            return false;
        };

        let shifted = {
            let mut data = self.inner.data.write();
            let Some(parent) = self
                .base_mut(&mut data, scope)
                .and_then(|base| tree::lookup_mut(base, parents))
            else {
                return false;
            };
            let shifted = parent.is_array();
            if tree::detach(parent, last).is_none() {
                return false;
            }
            shifted
        };

        if shifted {
            let parent_path = path::resolve_all(parents);
            let parent_value = self.read_at(scope, parents).unwrap_or(Value::Null);
            self.notify(scope, &parent_path, parent_value, committer);
        } else {
            self.notify(scope, &path::resolve_all(steps), Value::Null, committer);
        }
        true
    }

    fn base<'a>(&self, data: &'a Value, scope: Scope) -> Option<&'a Value> {
        match (scope, &self.inner.data_root) {
            (Scope::Data, Some(root_key)) => data.get(root_key),
            _ => Some(data),
        }
    }

    fn base_mut<'a>(&self, data: &'a mut Value, scope: Scope) -> Option<&'a mut Value> {
        match (scope, &self.inner.data_root) {
            (Scope::Data, Some(root_key)) => data.get_mut(root_key),
            _ => Some(data),
        }
    }

    // ------------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------------

    /// Publish a committed write at `path`.
    ///
    /// Order: the exact topic, then every subscribed topic below `path`
    /// (with its freshly read value), then the whole-model topic.
    fn notify(&self, scope: Scope, path: &str, value: Value, committer: Option<OwnerId>) {
        let topic = self.topic(path);
        self.inner.bus.publish(
            &topic,
            Change::new(value.clone())
                .committed_by(committer)
                .at_path(path),
        );
        self.notify_descendants(scope, path, committer);
        self.publish_model_change(path, value, committer);
    }

    /// Republish every subscribed topic at or below the written slot, other
    /// than `path` itself.
    ///
    /// With a data root, one slot has two spellings: `data.count` from the
    /// root and `count` from the bucket. Topics under the other spelling are
    /// republished too, so writing the bucket key reaches every binding
    /// inside it.
    fn notify_descendants(&self, scope: Scope, path: &str, committer: Option<OwnerId>) {
        let prefix = self.topic("");
        let alias = self.alias(scope, path);

        for topic in self.inner.bus.topics_with_prefix(&prefix) {
            let sub_path = &topic[prefix.len()..];
            let below = path::is_descendant(path, sub_path)
                || alias.as_ref().is_some_and(|(alias_scope, alias_path)| {
                    let covered = sub_path == alias_path.as_str()
                        || path::is_descendant(alias_path, sub_path);
                    covered && self.scope_of(sub_path) == Some(*alias_scope)
                });
            if !below {
                continue;
            }
            let current = self.get_path(sub_path).unwrap_or(Value::Null);
            self.inner.bus.publish(
                &topic,
                Change::new(current)
                    .committed_by(committer)
                    .at_path(sub_path),
            );
        }
    }

    /// The same slot as `path` in `scope`, spelled from the other bucket.
    fn alias(&self, scope: Scope, path: &str) -> Option<(Scope, String)> {
        let root_key = self.inner.data_root.as_deref()?;
        match scope {
            Scope::Root => {
                let rest = path.strip_prefix(root_key)?;
                match rest.as_bytes().first() {
                    None => Some((Scope::Data, String::new())),
                    Some(b'.') => Some((Scope::Data, rest[1..].to_owned())),
                    Some(b'[') => Some((Scope::Data, rest.to_owned())),
                    Some(_) => None,
                }
            }
            Scope::Data if path.starts_with('[') => {
                Some((Scope::Root, format!("{root_key}{path}")))
            }
            Scope::Data => Some((Scope::Root, format!("{root_key}.{path}"))),
        }
    }

    /// Bucket a subscribed path string resolves in, if it parses.
    fn scope_of(&self, path: &str) -> Option<Scope> {
        let steps = path::parse(path).ok()?;
        steps.first().map(|first| self.scope_for(first))
    }

    fn publish_model_change(&self, path: &str, value: Value, committer: Option<OwnerId>) {
        self.inner.bus.publish(
            &self.change_topic(),
            Change::new(value).committed_by(committer).at_path(path),
        );
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.inner.id)
            .field("data_root", &self.inner.data_root)
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Model {}

/// Steps of a view extended by one key.
pub(crate) fn extend(steps: &Steps, key: PathKey) -> Steps {
    let mut next = steps.clone();
    next.push(key);
    next
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn model(initial: Value) -> Model {
        Model::with_bus(initial, ModelOptions::new(), Arc::new(ChangeBus::new()))
    }

    fn record(model: &Model, path: &str) -> Arc<Mutex<Vec<Value>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        model.on(path, move |change| log_clone.lock().push(change.value.clone()));
        log
    }

    #[test]
    fn set_path_mutates_then_publishes() {
        let m = model(json!({ "user": { "name": "ada" } }));
        let seen = Arc::new(Mutex::new(None));

        let m_clone = m.clone();
        let seen_clone = seen.clone();
        m.on("user.name", move |_| {
            // Subscribers observe the committed value.
            *seen_clone.lock() = m_clone.get_path("user.name");
        });

        assert!(m.set_path("user.name", json!("grace"), None).unwrap());
        assert_eq!(*seen.lock(), Some(json!("grace")));
    }

    #[test]
    fn topics_use_model_id() {
        let m = Model::with_bus(
            json!({}),
            ModelOptions::new().kind("topic-test"),
            Arc::new(ChangeBus::new()),
        );
        assert_eq!(m.topic("a[0]"), format!("topic-test#{}:a[0]", m.id().seq()));
        assert_eq!(m.change_topic(), format!("topic-test#{}/change", m.id().seq()));
    }

    #[test]
    fn wholesale_write_reaches_descendant_topics() {
        let m = model(json!({ "items": [] }));
        let names = record(&m, "items[0].name");
        let other = record(&m, "items[1].name");

        m.set_path("items[0]", json!({ "name": "a" }), None).unwrap();

        assert_eq!(*names.lock(), vec![json!("a")]);
        assert!(other.lock().is_empty());
    }

    #[test]
    fn change_topic_sees_every_write_with_path() {
        let m = model(json!({ "a": 1, "b": 2 }));
        let paths = Arc::new(Mutex::new(Vec::new()));
        let paths_clone = paths.clone();
        m.on_change(move |change| paths_clone.lock().push(change.path.clone().unwrap()));

        m.set_path("a", json!(10), None).unwrap();
        m.set_path("b", json!(20), None).unwrap();
        assert_eq!(*paths.lock(), vec!["a", "b"]);
    }

    #[test]
    fn committer_travels_with_change() {
        let m = model(json!({ "x": 0 }));
        let owner = OwnerId::new();
        let committers = Arc::new(Mutex::new(Vec::new()));
        let committers_clone = committers.clone();
        m.on("x", move |change| committers_clone.lock().push(change.committer));

        m.set_path("x", json!(1), Some(owner)).unwrap();
        m.set_path("x", json!(2), None).unwrap();
        assert_eq!(*committers.lock(), vec![Some(owner), None]);
    }

    #[test]
    fn stale_write_is_a_quiet_no_op() {
        let m = model(json!({ "user": null }));
        let log = record(&m, "user.name");

        assert!(!m.set_path("user.name", json!("x"), None).unwrap());
        assert!(!m.set_path("missing.deep.name", json!("x"), None).unwrap());
        assert!(log.lock().is_empty());
        assert_eq!(m.snapshot(), json!({ "user": null }));
    }

    #[test]
    fn malformed_path_is_an_error() {
        let m = model(json!({}));
        assert!(m.set_path("a[", json!(1), None).is_err());
        assert_eq!(m.get_path("a["), None);
    }

    #[test]
    fn data_root_falls_back_after_root_keys() {
        let m = Model::with_bus(
            json!({ "title": "meta", "data": { "title": "shadowed", "count": 1 } }),
            ModelOptions::new().data_root("data"),
            Arc::new(ChangeBus::new()),
        );

        // Root-level keys win.
        assert_eq!(m.get_path("title"), Some(json!("meta")));
        // Everything else falls into the bucket.
        assert_eq!(m.get_path("count"), Some(json!(1)));

        m.set_path("fresh", json!(true), None).unwrap();
        assert_eq!(m.snapshot()["data"]["fresh"], json!(true));
    }

    #[test]
    fn data_root_bucket_is_created() {
        let m = Model::with_bus(
            json!({ "meta": 1 }),
            ModelOptions::new().data_root("state"),
            Arc::new(ChangeBus::new()),
        );
        assert_eq!(m.snapshot(), json!({ "meta": 1, "state": {} }));
    }

    #[test]
    fn replace_republishes_subscribed_paths() {
        let m = model(json!({ "a": { "b": 1 } }));
        let log = record(&m, "a.b");

        m.replace(json!({ "a": { "b": 2 } }), None);
        m.replace(json!({}), None);
        assert_eq!(*log.lock(), vec![json!(2), Value::Null]);
    }

    #[test]
    fn removing_array_element_republishes_siblings() {
        let m = model(json!({ "items": ["a", "b"] }));
        let first = record(&m, "items[0]");

        assert!(m.root().view("items").unwrap().remove(0, None));
        assert_eq!(*first.lock(), vec![json!("b")]);
        assert_eq!(m.get_path("items"), Some(json!(["b"])));
    }

    #[test]
    fn removing_object_key_publishes_null() {
        let m = model(json!({ "a": 1 }));
        let log = record(&m, "a");

        assert!(m.root().remove("a", None));
        assert!(!m.root().remove("a", None));
        assert_eq!(*log.lock(), vec![Value::Null]);
        assert_eq!(m.snapshot(), json!({}));
    }

    #[test]
    fn field_named_change_has_its_own_topic() {
        let m = model(json!({ "change": "c", "other": 0 }));
        let field = record(&m, "change");
        let whole = Arc::new(Mutex::new(0));
        let whole_clone = whole.clone();
        m.on_change(move |_: &Change| *whole_clone.lock() += 1);

        m.set_path("other", json!(99), None).unwrap();
        assert!(field.lock().is_empty());
        assert_eq!(*whole.lock(), 1);

        m.set_path("change", json!("d"), None).unwrap();
        assert_eq!(*field.lock(), vec![json!("d")]);
        assert_eq!(*whole.lock(), 2);
    }

    #[test]
    fn writing_data_root_key_reaches_bucket_bindings() {
        let m = Model::with_bus(
            json!({ "title": "meta", "data": { "count": 1, "user": { "name": "ada" } } }),
            ModelOptions::new().data_root("data"),
            Arc::new(ChangeBus::new()),
        );
        let count = record(&m, "count");
        let name = record(&m, "user.name");
        let title = record(&m, "title");

        m.set_path("data", json!({ "count": 5, "user": { "name": "grace" } }), None)
            .unwrap();

        assert_eq!(m.get_path("count"), Some(json!(5)));
        assert_eq!(*count.lock(), vec![json!(5)]);
        assert_eq!(*name.lock(), vec![json!("grace")]);
        assert!(title.lock().is_empty());
    }

    #[test]
    fn bucket_and_root_spellings_notify_each_other() {
        let m = Model::with_bus(
            json!({ "data": { "count": 1 } }),
            ModelOptions::new().data_root("data"),
            Arc::new(ChangeBus::new()),
        );
        let short = record(&m, "count");
        let long = record(&m, "data.count");

        m.set_path("data.count", json!(2), None).unwrap();
        m.set_path("count", json!(3), None).unwrap();

        assert_eq!(*short.lock(), vec![json!(2), json!(3)]);
        assert_eq!(*long.lock(), vec![json!(2), json!(3)]);
    }

    #[test]
    fn oversized_index_is_a_refused_write() {
        let m = model(json!({ "items": [] }));
        let log = record(&m, &format!("items[{}]", usize::MAX));

        let written = m.set_path(&format!("items[{}]", usize::MAX), json!(1), None);
        assert_eq!(written, Ok(false));
        assert!(!m.set_path("items[1000000000]", json!(1), None).unwrap());
        assert!(log.lock().is_empty());
        assert_eq!(m.get_path("items"), Some(json!([])));

        // Modest gaps are still padded.
        assert!(m.set_path("items[2]", json!("c"), None).unwrap());
        assert_eq!(m.get_path("items"), Some(json!([null, null, "c"])));
    }
}
