//! Change Bus Implementation

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::change::{Callback, Change, SinkCallback, Token};
use super::guard::PublishGuard;
use crate::config::DEFAULT_MAX_PUBLISH_DEPTH;
use crate::logging::targets;

/// Counter for generating unique bus IDs.
static BUS_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The process-wide bus.
static GLOBAL_BUS: OnceLock<Arc<ChangeBus>> = OnceLock::new();

type Subscribers = IndexMap<Token, Callback>;

#[derive(Default)]
struct BusState {
    /// Topic -> subscribers, both in registration order.
    topics: IndexMap<String, Subscribers>,
    sink: Option<SinkCallback>,
}

/// A publish/subscribe registry keyed by topic.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tether_core::bus::{Change, ChangeBus};
///
/// let bus = ChangeBus::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let hits_clone = hits.clone();
///
/// let token = bus.on("user:name", move |_change| {
///     hits_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish("user:name", Change::new("ada"));
/// bus.off("user:name", token);
/// bus.publish("user:name", Change::new("grace"));
///
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct ChangeBus {
    id: u64,
    next_token: AtomicU64,
    max_depth: usize,
    state: Mutex<BusState>,
}

impl ChangeBus {
    /// Create an empty bus with the default nesting cap.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_PUBLISH_DEPTH)
    }

    /// Create an empty bus that refuses publishes nested deeper than
    /// `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            id: BUS_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            next_token: AtomicU64::new(0),
            max_depth: max_depth.max(1),
            state: Mutex::new(BusState::default()),
        }
    }

    /// The process-wide bus, created on first use.
    pub fn global() -> Arc<ChangeBus> {
        GLOBAL_BUS.get_or_init(|| Arc::new(ChangeBus::new())).clone()
    }

    /// Get the bus's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribe `callback` to `topic`.
    pub fn on<F>(&self, topic: &str, callback: F) -> Token
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.on_arc(topic, Arc::new(callback))
    }

    /// Subscribe an already shared callback.
    pub fn on_arc(&self, topic: &str, callback: Callback) -> Token {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.state
            .lock()
            .topics
            .entry(topic.to_owned())
            .or_default()
            .insert(token, callback);

        tracing::trace!(target: targets::BUS, topic, %token, "subscribed");
        token
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn off(&self, topic: &str, token: Token) -> bool {
        let mut state = self.state.lock();
        let Some(subscribers) = state.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.shift_remove(&token).is_some();
        if subscribers.is_empty() {
            state.topics.shift_remove(topic);
        }
        drop(state);

        if removed {
            tracing::trace!(target: targets::BUS, topic, %token, "unsubscribed");
        }
        removed
    }

    /// Drop every subscriber of `topic`. Returns how many were removed.
    pub fn remove(&self, topic: &str) -> usize {
        let removed = self
            .state
            .lock()
            .topics
            .shift_remove(topic)
            .map_or(0, |subscribers| subscribers.len());

        tracing::debug!(target: targets::BUS, topic, removed, "topic removed");
        removed
    }

    /// Install the catch-all observer, replacing any previous one.
    pub fn set_sink<F>(&self, sink: F)
    where
        F: Fn(&str, &Change) + Send + Sync + 'static,
    {
        self.state.lock().sink = Some(Arc::new(sink));
    }

    /// Remove the catch-all observer.
    pub fn clear_sink(&self) {
        self.state.lock().sink = None;
    }

    /// Deliver `change` to every subscriber of `topic`, then to the sink.
    ///
    /// Returns the number of per-topic subscribers invoked. A refused
    /// re-entrant publish returns 0 and reaches neither subscribers nor sink.
    pub fn publish(&self, topic: &str, change: Change) -> usize {
        let Some(_guard) = PublishGuard::enter(self.id, topic, self.max_depth) else {
            return 0;
        };

        let (subscribers, sink) = {
            let state = self.state.lock();
            let subscribers: Vec<(Token, Callback)> = state
                .topics
                .get(topic)
                .map(|subs| subs.iter().map(|(t, cb)| (*t, Arc::clone(cb))).collect())
                .unwrap_or_default();
            (subscribers, state.sink.clone())
        };

        tracing::trace!(
            target: targets::BUS,
            topic,
            subscribers = subscribers.len(),
            committer = ?change.committer,
            "publish"
        );

        for (token, callback) in &subscribers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&change))) {
                tracing::error!(
                    target: targets::BUS,
                    topic,
                    %token,
                    reason = panic_message(payload.as_ref()),
                    "subscriber panicked"
                );
            }
        }

        if let Some(sink) = sink {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink(topic, &change))) {
                tracing::error!(
                    target: targets::BUS,
                    topic,
                    reason = panic_message(payload.as_ref()),
                    "sink panicked"
                );
            }
        }

        subscribers.len()
    }

    /// Number of subscribers currently on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |subscribers| subscribers.len())
    }

    /// Whether `token` is still subscribed to `topic`.
    pub fn is_subscribed(&self, topic: &str, token: Token) -> bool {
        self.state
            .lock()
            .topics
            .get(topic)
            .is_some_and(|subscribers| subscribers.contains_key(&token))
    }

    /// Topics with at least one subscriber, in first-subscription order.
    pub fn topics(&self) -> Vec<String> {
        self.state.lock().topics.keys().cloned().collect()
    }

    /// Topics starting with `prefix`, in first-subscription order.
    pub fn topics_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .topics
            .keys()
            .filter(|topic| topic.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Drop every subscription and the sink.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.topics.clear();
        state.sink = None;
    }

    /// Alias of [`clear`](Self::clear), for test isolation.
    pub fn reset(&self) {
        self.clear();
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChangeBus")
            .field("id", &self.id)
            .field("topic_count", &state.topics.len())
            .field("has_sink", &state.sink.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &'static str| -> Callback {
            let log = log_clone.clone();
            Arc::new(move |change: &Change| {
                log.lock().push(format!("{name}={}", change.value));
            })
        };
        (log, make)
    }

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        bus.on_arc("t", make("a"));
        bus.on_arc("t", make("b"));
        bus.on_arc("t", make("c"));

        assert_eq!(bus.publish("t", Change::new(json!(1))), 3);
        assert_eq!(*log.lock(), vec!["a=1", "b=1", "c=1"]);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        bus.on_arc("m:a", make("a"));
        bus.on_arc("m:b", make("b"));

        bus.publish("m:a", Change::new(json!("x")));
        assert_eq!(*log.lock(), vec![r#"a="x""#]);
    }

    #[test]
    fn off_silences_only_that_token() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        let a = bus.on_arc("t", make("a"));
        bus.on_arc("t", make("b"));

        assert!(bus.off("t", a));
        assert!(!bus.off("t", a));
        bus.publish("t", Change::new(json!(2)));
        assert_eq!(*log.lock(), vec!["b=2"]);
    }

    #[test]
    fn remove_drops_whole_topic() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        bus.on_arc("t", make("a"));
        bus.on_arc("t", make("b"));

        assert_eq!(bus.remove("t"), 2);
        assert_eq!(bus.remove("t"), 0);
        assert_eq!(bus.publish("t", Change::new(json!(0))), 0);
        assert!(log.lock().is_empty());
        assert!(bus.topics().is_empty());
    }

    #[test]
    fn tokens_are_never_reused() {
        let bus = ChangeBus::new();
        let first = bus.on("t", |_| {});
        bus.remove("t");
        let second = bus.on("t", |_| {});
        assert!(second > first);
        assert!(!bus.off("t", first));
        assert!(bus.is_subscribed("t", second));
    }

    #[test]
    fn panicking_subscriber_does_not_block_siblings() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        bus.on_arc("t", make("before"));
        bus.on("t", |_| panic!("boom"));
        bus.on_arc("t", make("after"));

        assert_eq!(bus.publish("t", Change::new(json!(1))), 3);
        assert_eq!(*log.lock(), vec!["before=1", "after=1"]);
    }

    #[test]
    fn sink_runs_once_after_subscribers() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        bus.on_arc("t", make("sub"));
        let sink_log = log.clone();
        bus.set_sink(move |topic, change| {
            sink_log.lock().push(format!("sink:{topic}={}", change.value));
        });

        bus.publish("t", Change::new(json!(5)));
        bus.publish("unsubscribed", Change::new(json!(6)));
        assert_eq!(*log.lock(), vec!["sub=5", "sink:t=5", "sink:unsubscribed=6"]);

        bus.clear_sink();
        bus.publish("t", Change::new(json!(7)));
        assert_eq!(log.lock().len(), 4);
    }

    #[test]
    fn unsubscribing_during_publish_is_tolerated() {
        let bus = Arc::new(ChangeBus::new());
        let (log, make) = recorder();

        let bus_clone = bus.clone();
        let victim = Arc::new(Mutex::new(None::<Token>));
        let victim_clone = victim.clone();
        bus.on("t", move |_| {
            if let Some(token) = victim_clone.lock().take() {
                bus_clone.off("t", token);
            }
        });
        *victim.lock() = Some(bus.on_arc("t", make("victim")));
        bus.on_arc("t", make("tail"));

        // The in-progress publish still reaches the victim.
        bus.publish("t", Change::new(json!(1)));
        assert_eq!(*log.lock(), vec!["victim=1", "tail=1"]);

        // Later publishes do not.
        bus.publish("t", Change::new(json!(2)));
        assert_eq!(*log.lock(), vec!["victim=1", "tail=1", "tail=2"]);
    }

    #[test]
    fn same_topic_reentry_is_dropped() {
        let bus = Arc::new(ChangeBus::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let bus_clone = bus.clone();
        let calls_clone = calls.clone();
        bus.on("loop", move |change| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            bus_clone.publish("loop", change.clone());
        });

        bus.publish("loop", Change::new(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_publish_on_other_topic_runs() {
        let bus = Arc::new(ChangeBus::new());
        let (log, make) = recorder();
        bus.on_arc("inner", make("inner"));

        let bus_clone = bus.clone();
        bus.on("outer", move |change| {
            bus_clone.publish("inner", change.clone());
        });

        bus.publish("outer", Change::new(json!(9)));
        assert_eq!(*log.lock(), vec!["inner=9"]);
    }

    #[test]
    fn depth_cap_stops_chains() {
        let bus = Arc::new(ChangeBus::with_max_depth(3));
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let bus_clone = bus.clone();
            let calls_clone = calls.clone();
            bus.on(&format!("t{i}"), move |change| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                bus_clone.publish(&format!("t{}", i + 1), change.clone());
            });
        }

        bus.publish("t0", Change::new(json!(0)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn prefix_query_preserves_order() {
        let bus = ChangeBus::new();
        bus.on("m1:b", |_| {});
        bus.on("m2:a", |_| {});
        bus.on("m1:a", |_| {});

        assert_eq!(bus.topics_with_prefix("m1:"), vec!["m1:b", "m1:a"]);
        assert_eq!(bus.subscriber_count("m1:a"), 1);
    }
}
