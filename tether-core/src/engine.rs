//! Engine
//!
//! The engine is the entry point collaborators use: it creates models, binds
//! targets to them, and tears bindings down when a target goes away.
//!
//! # How It Fits Together
//!
//! ```text
//!   Engine ──owns──▶ ChangeBus        (topics: modelId:path, modelId/change,
//!     │                                 lifecycle:destroy, anything else)
//!     └────owns──▶ ResourceTracker  (owner id ─▶ "bindings" ─▶ [Connection])
//! ```
//!
//! Every connection made by [`Engine::bind`] is tracked under the target's
//! owner id with the type [`BINDINGS`]. Unbinding, or publishing the owner id
//! on the configured destroy topic, removes the owner from the tracker and
//! the registered disposer unsubscribes each connection.
//!
//! # Global vs Isolated
//!
//! [`Engine::global`] shares the process-wide bus and tracker, so models and
//! routes created anywhere in the process see each other. [`Engine::new`]
//! builds a fresh bus and tracker, which is what tests want.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::binding::{
    BindMode, BindOptions, BindTarget, Bindable, Connection, ConnectionHandle, FilterTemplate,
    ModelSource, TargetSource,
};
use crate::bus::{Change, ChangeBus, Token};
use crate::config::EngineConfig;
use crate::error::{BindError, ConfigError, PathError};
use crate::logging::targets;
use crate::model::{Model, ModelOptions};
use crate::path;
use crate::tracker::{Owner, OwnerId, Payload, ResourceTracker};

/// Tracker type under which connections are stored.
pub const BINDINGS: &str = "bindings";

/// The process-wide engine.
static GLOBAL_ENGINE: OnceLock<Engine> = OnceLock::new();

/// Models, bindings and their teardown, over one bus and one tracker.
pub struct Engine {
    config: EngineConfig,
    bus: Arc<ChangeBus>,
    tracker: Arc<ResourceTracker>,
    destroy_route: Mutex<Option<Token>>,
}

impl Engine {
    /// An engine with its own bus and tracker.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = Arc::new(ChangeBus::with_max_depth(config.max_publish_depth));
        Ok(Self::with_parts(config, bus, Arc::new(ResourceTracker::new())))
    }

    /// An engine over an existing bus and tracker.
    ///
    /// The configuration is used as given; call
    /// [`EngineConfig::validate`] first if it comes from outside.
    pub fn with_parts(config: EngineConfig, bus: Arc<ChangeBus>, tracker: Arc<ResourceTracker>) -> Self {
        let engine = Self {
            config,
            bus,
            tracker,
            destroy_route: Mutex::new(None),
        };
        engine.install_routes();
        engine
    }

    /// The process-wide engine, created with the default configuration on
    /// first use.
    pub fn global() -> &'static Engine {
        GLOBAL_ENGINE.get_or_init(|| {
            Self::with_parts(EngineConfig::default(), ChangeBus::global(), ResourceTracker::global())
        })
    }

    /// Configure the process-wide engine.
    ///
    /// Must run before the first call to [`global`](Self::global). If the
    /// global engine already exists it is returned unchanged and `config`
    /// is ignored. The global bus keeps its default depth cap either way.
    pub fn install(config: EngineConfig) -> Result<&'static Engine, ConfigError> {
        config.validate()?;
        let mut config = Some(config);
        let engine = GLOBAL_ENGINE.get_or_init(|| {
            let config = config.take().unwrap_or_default();
            Self::with_parts(config, ChangeBus::global(), ResourceTracker::global())
        });
        if config.is_some() {
            tracing::warn!(
                target: targets::CORE,
                "global engine already initialised; configuration ignored"
            );
        }
        Ok(engine)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The change bus.
    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// The resource tracker.
    pub fn tracker(&self) -> &Arc<ResourceTracker> {
        &self.tracker
    }

    // ------------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------------

    /// Wrap `initial` in an observable model on this engine's bus.
    ///
    /// Unset options fall back to the engine configuration.
    pub fn create_model(&self, initial: Value, options: ModelOptions) -> Model {
        Model::with_bus(initial, options.or_config(&self.config), Arc::clone(&self.bus))
    }

    // ------------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------------

    /// Keep one attribute of `target` in step with `bindable` in `model`.
    ///
    /// The attribute is `options.attr`, or the target kind's default. Any
    /// live connection on the same target attribute is disposed first. The
    /// returned handle is also tracked under the target's owner id, so
    /// dropping it does not unbind.
    ///
    /// # Errors
    ///
    /// Fails on an empty or malformed path, or on a filter template without
    /// exactly one placeholder.
    pub fn bind(
        &self,
        target: Arc<dyn BindTarget>,
        model: &Model,
        bindable: impl Into<Bindable>,
        options: BindOptions,
    ) -> Result<ConnectionHandle, BindError> {
        let bindable = bindable.into();
        if let Some(raw) = bindable.path() {
            if raw.is_empty() {
                return Err(PathError::Empty.into());
            }
            path::parse(raw)?;
        }

        let filter = options
            .filter
            .as_deref()
            .map(|template| FilterTemplate::new(template, &self.config.filter_placeholder))
            .transpose()?;

        let kind = target.kind();
        let attr = options.attr.unwrap_or_else(|| kind.default_attr());
        let read_only = filter.is_some() || matches!(bindable, Bindable::Accessor(_));
        let mode = match (read_only, options.mode) {
            (true, requested) => {
                if requested == Some(BindMode::TwoWay) {
                    tracing::debug!(
                        target: targets::BINDING,
                        %attr,
                        "two-way requested on a filtered or derived binding; using one-way"
                    );
                }
                BindMode::OneWay
            }
            (false, Some(mode)) => mode,
            (false, None) if kind.accepts_input() => BindMode::TwoWay,
            (false, None) => BindMode::OneWay,
        };

        let owner = target.owner_id();
        let replaced = self.tracker.remove_where(owner, BINDINGS, |payload| {
            payload
                .downcast_ref::<Connection>()
                .is_some_and(|connection| connection.attr() == &attr)
        });
        if replaced > 0 {
            tracing::debug!(target: targets::BINDING, %owner, %attr, "rebinding");
        }

        let connection = Connection::bind(
            ModelSource::new(model.clone(), bindable),
            TargetSource::new(target, attr, filter),
            mode,
        );
        let payload: Payload = connection.clone();
        self.tracker.add_arc(owner, BINDINGS, payload);
        Ok(connection)
    }

    /// Live connections of `target`, in bind order.
    pub fn connections(&self, target: &dyn Owner) -> Vec<ConnectionHandle> {
        self.tracker.get_as::<Connection>(target.owner_id(), BINDINGS)
    }

    /// Dispose everything tracked for `target`: connections and any other
    /// resources registered under its owner id.
    ///
    /// Returns the number of items disposed. Calling it again is a no-op.
    pub fn unbind(&self, target: &dyn Owner) -> usize {
        self.tracker.remove(target.owner_id(), None)
    }

    /// Dispose only the connections of `target`.
    pub fn unbind_connections(&self, target: &dyn Owner) -> usize {
        self.tracker.remove(target.owner_id(), Some(BINDINGS))
    }

    /// Announce that `owner` is gone by publishing its id on the destroy
    /// topic. Every engine sharing this bus disposes the owner's resources.
    pub fn destroy(&self, owner: &dyn Owner) -> usize {
        let id = owner.owner_id();
        self.bus
            .publish(&self.config.destroy_topic, Change::new(id.raw()).committed_by(Some(id)))
    }

    // ------------------------------------------------------------------------
    // Raw bus
    // ------------------------------------------------------------------------

    /// Subscribe to an arbitrary topic.
    pub fn on<F>(&self, topic: &str, callback: F) -> Token
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.bus.on(topic, callback)
    }

    /// Remove one subscription.
    pub fn off(&self, topic: &str, token: Token) -> bool {
        self.bus.off(topic, token)
    }

    /// Publish `value` on `topic` with no committer.
    pub fn publish(&self, topic: &str, value: impl Into<Value>) -> usize {
        self.bus.publish(topic, Change::new(value))
    }

    /// Drop every subscription on `topic`.
    pub fn remove(&self, topic: &str) -> usize {
        self.bus.remove(topic)
    }

    /// Clear the bus and tracker, then register the engine's own routes
    /// again. Disposers do not run.
    pub fn reset(&self) {
        *self.destroy_route.lock() = None;
        self.bus.reset();
        self.tracker.reset();
        self.install_routes();
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    fn install_routes(&self) {
        self.tracker.add_type(BINDINGS, |payload| {
            if let Ok(connection) = payload.downcast::<Connection>() {
                connection.unsubscribe();
            }
        });

        let mut route = self.destroy_route.lock();
        if let Some(token) = route.take() {
            self.bus.off(&self.config.destroy_topic, token);
        }
        let tracker: Weak<ResourceTracker> = Arc::downgrade(&self.tracker);
        let token = self.bus.on(&self.config.destroy_topic, move |change| {
            let owner = match serde_json::from_value::<OwnerId>(change.value.clone()) {
                Ok(owner) => owner,
                Err(err) => {
                    tracing::warn!(
                        target: targets::TRACKER,
                        value = %change.value,
                        error = %err,
                        "destroy payload is not an owner id"
                    );
                    return;
                }
            };
            if let Some(tracker) = tracker.upgrade() {
                tracker.remove(owner, None);
            }
        });
        *route = Some(token);
    }
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        let bus = Arc::new(ChangeBus::with_max_depth(config.max_publish_depth));
        Self::with_parts(config, bus, Arc::new(ResourceTracker::new()))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(token) = self.destroy_route.get_mut().take() {
            self.bus.off(&self.config.destroy_topic, token);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("tracker", &self.tracker)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Attr, Element, TargetKind};
    use serde_json::json;

    fn engine() -> Engine {
        Engine::default()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = EngineConfig {
            max_publish_depth: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn create_model_uses_config_defaults() {
        let engine = Engine::new(EngineConfig {
            model_kind: "store".into(),
            data_root: Some("data".into()),
            ..EngineConfig::default()
        })
        .unwrap();
        let model = engine.create_model(json!({}), ModelOptions::new());

        assert_eq!(model.id().kind(), "store");
        assert_eq!(model.data_root(), Some("data"));
        assert!(Arc::ptr_eq(model.bus(), engine.bus()));
    }

    #[test]
    fn default_mode_follows_target_kind() {
        let engine = engine();
        let model = engine.create_model(json!({ "on": true, "label": "x" }), ModelOptions::new());

        let checkbox = Element::checkbox();
        let connection = engine.bind(checkbox.clone(), &model, "on", BindOptions::new()).unwrap();
        assert_eq!(connection.mode(), BindMode::TwoWay);
        assert_eq!(connection.attr(), &Attr::Checked);

        let text = Element::text();
        let connection = engine.bind(text.clone(), &model, "label", BindOptions::new()).unwrap();
        assert_eq!(connection.mode(), BindMode::OneWay);
        assert_eq!(connection.attr(), &Attr::TextContent);
    }

    #[test]
    fn filters_and_accessors_force_one_way() {
        let engine = engine();
        let model = engine.create_model(json!({ "id": 3 }), ModelOptions::new());
        let link = Element::new(TargetKind::TextInput);

        let options = BindOptions::new()
            .attr(Attr::Named("href".into()))
            .filter("/users/{}")
            .two_way();
        let connection = engine.bind(link.clone(), &model, "id", options).unwrap();
        assert_eq!(connection.mode(), BindMode::OneWay);
        assert_eq!(link.get_attr(&Attr::Named("href".into())), json!("/users/3"));

        let input = Element::text_input();
        let derived = Bindable::accessor(|model| model.get_path("id").unwrap_or_default());
        let connection = engine.bind(input.clone(), &model, derived, BindOptions::new()).unwrap();
        assert_eq!(connection.mode(), BindMode::OneWay);
        assert_eq!(input.listener_count(), 0);
    }

    #[test]
    fn bind_rejects_bad_paths_and_filters() {
        let engine = engine();
        let model = engine.create_model(json!({}), ModelOptions::new());
        let element = Element::text();

        assert!(matches!(
            engine.bind(element.clone(), &model, "", BindOptions::new()),
            Err(BindError::Path(PathError::Empty))
        ));
        assert!(matches!(
            engine.bind(element.clone(), &model, "a..b", BindOptions::new()),
            Err(BindError::Path(_))
        ));
        assert!(matches!(
            engine.bind(element.clone(), &model, "a", BindOptions::new().filter("no marker")),
            Err(BindError::Filter { .. })
        ));
        assert!(engine.connections(&*element).is_empty());
    }

    #[test]
    fn rebinding_an_attribute_replaces_the_connection() {
        let engine = engine();
        let model = engine.create_model(json!({ "a": "first", "b": "second" }), ModelOptions::new());
        let element = Element::text();

        let old = engine.bind(element.clone(), &model, "a", BindOptions::new()).unwrap();
        let new = engine.bind(element.clone(), &model, "b", BindOptions::new()).unwrap();

        assert!(!old.is_bound());
        assert!(new.is_bound());
        assert_eq!(engine.connections(&*element).len(), 1);
        assert_eq!(element.get_attr(&Attr::TextContent), json!("second"));

        model.set_path("a", json!("ignored"), None).unwrap();
        assert_eq!(element.get_attr(&Attr::TextContent), json!("second"));
    }

    #[test]
    fn separate_attributes_coexist() {
        let engine = engine();
        let model = engine.create_model(json!({ "name": "n", "tip": "t" }), ModelOptions::new());
        let element = Element::text();

        engine.bind(element.clone(), &model, "name", BindOptions::new()).unwrap();
        engine
            .bind(element.clone(), &model, "tip", BindOptions::parse("title", "{}"))
            .unwrap();

        assert_eq!(engine.connections(&*element).len(), 2);
        assert_eq!(element.get_attr(&Attr::Named("title".into())), json!("t"));
    }

    #[test]
    fn unbind_disposes_everything_once() {
        let engine = engine();
        let model = engine.create_model(json!({ "n": 1 }), ModelOptions::new());
        let element = Element::text();
        let connection = engine.bind(element.clone(), &model, "n", BindOptions::new()).unwrap();
        engine.tracker().add(element.owner_id(), "timers", 5_u32);

        assert_eq!(engine.unbind(&*element), 2);
        assert_eq!(engine.unbind(&*element), 0);
        assert!(!connection.is_bound());
        assert_eq!(model.bus().subscriber_count(&model.topic("n")), 0);
    }

    #[test]
    fn destroy_topic_tears_down_owner() {
        let engine = engine();
        let model = engine.create_model(json!({ "n": 1 }), ModelOptions::new());
        let element = Element::text();
        let connection = engine.bind(element.clone(), &model, "n", BindOptions::new()).unwrap();

        engine.publish(&engine.config().destroy_topic, element.owner_id().raw());
        assert!(!connection.is_bound());
        assert!(!engine.tracker().has(element.owner_id()));

        model.set_path("n", json!(2), None).unwrap();
        assert_eq!(element.get_attr(&Attr::TextContent), json!("1"));
    }

    #[test]
    fn destroy_helper_and_bad_payloads() {
        let engine = engine();
        let model = engine.create_model(json!({ "n": 1 }), ModelOptions::new());
        let element = Element::text();
        let connection = engine.bind(element.clone(), &model, "n", BindOptions::new()).unwrap();

        engine.publish(&engine.config().destroy_topic, "not an owner");
        assert!(connection.is_bound());

        assert_eq!(engine.destroy(&*element), 1);
        assert!(!connection.is_bound());
    }

    #[test]
    fn reset_reinstalls_routes() {
        let engine = engine();
        engine.on("custom", |_| {});
        engine.reset();

        assert_eq!(engine.bus().subscriber_count("custom"), 0);
        assert_eq!(engine.bus().subscriber_count(&engine.config().destroy_topic), 1);
        assert!(engine.tracker().has_type(BINDINGS));
    }

    #[test]
    fn raw_bus_round_trip() {
        let engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let token = engine.on("router:navigate", move |change| {
            seen_clone.lock().push(change.value.clone());
        });

        assert_eq!(engine.publish("router:navigate", "/home"), 1);
        assert!(engine.off("router:navigate", token));
        assert_eq!(engine.publish("router:navigate", "/away"), 0);
        assert_eq!(*seen.lock(), vec![json!("/home")]);
    }
}
