//! Connection Implementation
//!
//! A connection is the lifetime-managed link between one model source and
//! one target source.
//!
//! # Lifecycle
//!
//! ```text
//! Unbound --bind()--> Bound --unsubscribe()--> Unbound (terminal)
//! ```
//!
//! Binding happens inside one synchronous call: the target receives the
//! current model value, then the model side subscribes, then (two-way only)
//! the target side subscribes. Unsubscribing drops both sources; a new
//! binding needs a new connection.
//!
//! # Ownership
//!
//! The connection holds the only strong references to its sources. The
//! callbacks it installs on the bus and on the target hold weak ones, and
//! dropping the last handle unsubscribes, so an abandoned connection never
//! keeps its sources alive.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::source::{ModelSource, Source, TargetSource};
use super::target::Attr;
use crate::bus::{Callback, Change};
use crate::logging::targets;
use crate::tracker::OwnerId;

/// Counter for generating unique connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Direction of propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMode {
    /// Model to target only.
    OneWay,
    /// Model to target, and target edits back into the model.
    TwoWay,
}

/// State of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet bound, or unbound for good.
    Unbound,
    /// Forwarding changes.
    Bound,
}

struct Sides {
    model: Option<Arc<ModelSource>>,
    target: Option<Arc<TargetSource>>,
    state: ConnectionState,
}

/// One model-to-target link.
pub struct Connection {
    id: u64,
    owner: OwnerId,
    attr: Attr,
    mode: BindMode,
    sides: Mutex<Sides>,
}

/// Shared handle returned by [`Engine::bind`](crate::Engine::bind).
pub type ConnectionHandle = Arc<Connection>;

impl Connection {
    /// Pair `model` with `target` and start forwarding.
    pub fn bind(model: ModelSource, target: TargetSource, mode: BindMode) -> ConnectionHandle {
        let connection = Arc::new(Self {
            id: CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            owner: target.owner(),
            attr: target.attr().clone(),
            mode,
            sides: Mutex::new(Sides {
                model: None,
                target: None,
                state: ConnectionState::Unbound,
            }),
        });

        let model = Arc::new(model);
        let target = Arc::new(target);

        // Initial sync.
        target.set(model.get(), None);

        model.subscribe(forward_to(Arc::downgrade(&target)));
        if mode == BindMode::TwoWay {
            target.subscribe(forward_to(Arc::downgrade(&model)));
        }

        {
            let mut sides = connection.sides.lock();
            sides.model = Some(model);
            sides.target = Some(target);
            sides.state = ConnectionState::Bound;
        }

        tracing::debug!(
            target: targets::BINDING,
            connection = connection.id,
            owner = %connection.owner,
            attr = %connection.attr,
            ?mode,
            "bound"
        );
        connection
    }

    /// Get the connection's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The bound target's owner id.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// The bound attribute.
    pub fn attr(&self) -> &Attr {
        &self.attr
    }

    /// Propagation direction.
    pub fn mode(&self) -> BindMode {
        self.mode
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.sides.lock().state
    }

    /// Whether the connection is still forwarding.
    pub fn is_bound(&self) -> bool {
        self.state() == ConnectionState::Bound
    }

    /// Unsubscribe and drop both sides. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        let (model, target) = {
            let mut sides = self.sides.lock();
            if sides.state == ConnectionState::Unbound {
                return;
            }
            sides.state = ConnectionState::Unbound;
            (sides.model.take(), sides.target.take())
        };

        if let Some(model) = model {
            model.unsubscribe();
        }
        if let Some(target) = target {
            target.unsubscribe();
        }

        tracing::debug!(
            target: targets::BINDING,
            connection = self.id,
            owner = %self.owner,
            "unbound"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// A callback that applies each change to `destination`, if it still exists.
fn forward_to<S>(destination: Weak<S>) -> Callback
where
    S: Source + 'static,
{
    Arc::new(move |change: &Change| {
        if let Some(destination) = destination.upgrade() {
            destination.set(change.value.clone(), change.committer);
        }
    })
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("attr", &self.attr)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindTarget, Element};
    use crate::bus::ChangeBus;
    use crate::model::{Model, ModelOptions};
    use serde_json::{json, Value};

    fn model(initial: Value) -> Model {
        Model::with_bus(initial, ModelOptions::new(), Arc::new(ChangeBus::new()))
    }

    fn connect(m: &Model, path: &str, element: &Arc<Element>, mode: BindMode) -> ConnectionHandle {
        Connection::bind(
            ModelSource::new(m.clone(), path.into()),
            TargetSource::new(element.clone(), element.kind().default_attr(), None),
            mode,
        )
    }

    #[test]
    fn bind_syncs_initial_value() {
        let m = model(json!({ "name": "ada" }));
        let element = Element::text_input();
        let connection = connect(&m, "name", &element, BindMode::OneWay);

        assert!(connection.is_bound());
        assert_eq!(element.get_attr(&Attr::Value), json!("ada"));
    }

    #[test]
    fn one_way_ignores_target_edits() {
        let m = model(json!({ "name": "ada" }));
        let element = Element::text_input();
        let _connection = connect(&m, "name", &element, BindMode::OneWay);

        element.input(json!("typed"));
        assert_eq!(m.get_path("name"), Some(json!("ada")));
        assert_eq!(element.listener_count(), 0);
    }

    #[test]
    fn two_way_round_trip_without_echo() {
        let m = model(json!({ "name": "ada" }));
        let element = Element::text_input();
        let _connection = connect(&m, "name", &element, BindMode::TwoWay);
        let writes_after_bind = element.write_count();

        element.input(json!("grace"));
        assert_eq!(m.get_path("name"), Some(json!("grace")));
        assert_eq!(element.write_count(), writes_after_bind);

        m.set_path("name", json!("hopper"), None).unwrap();
        assert_eq!(element.get_attr(&Attr::Value), json!("hopper"));
        assert_eq!(element.write_count(), writes_after_bind + 1);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_releases_both_sides() {
        let m = model(json!({ "name": "ada" }));
        let element = Element::text_input();
        let connection = connect(&m, "name", &element, BindMode::TwoWay);
        assert_eq!(m.bus().subscriber_count(&m.topic("name")), 1);
        assert_eq!(element.listener_count(), 1);

        connection.unsubscribe();
        connection.unsubscribe();

        assert_eq!(connection.state(), ConnectionState::Unbound);
        assert_eq!(m.bus().subscriber_count(&m.topic("name")), 0);
        assert_eq!(element.listener_count(), 0);

        m.set_path("name", json!("later"), None).unwrap();
        assert_eq!(element.get_attr(&Attr::Value), json!("ada"));
    }

    #[test]
    fn dropped_connection_stops_forwarding() {
        let m = model(json!({ "n": 1 }));
        let element = Element::text();
        let connection = connect(&m, "n", &element, BindMode::OneWay);
        drop(connection);
        assert_eq!(m.bus().subscriber_count(&m.topic("n")), 0);

        m.set_path("n", json!(2), None).unwrap();
        assert_eq!(element.get_attr(&Attr::TextContent), json!("1"));
    }
}
