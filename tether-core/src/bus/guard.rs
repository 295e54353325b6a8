//! Publish Guard
//!
//! Tracks which topics are being published on the current thread. A
//! subscriber that writes to a model may trigger a nested publish on a
//! different topic, which is fine; a nested publish on the *same* topic of
//! the same bus would recurse without bound, so it is refused.
//!
//! # Implementation
//!
//! We use a thread-local stack of `(bus, topic)` entries. Entering a publish
//! pushes an entry; the returned guard pops it when dropped, which also
//! keeps the stack balanced if a subscriber unwinds.

use std::cell::RefCell;

use crate::logging::targets;

thread_local! {
    static IN_FLIGHT: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone)]
struct Entry {
    bus: u64,
    topic: String,
}

/// Guard that marks a topic as in flight until dropped.
#[derive(Debug)]
pub struct PublishGuard {
    bus: u64,
    topic: String,
}

impl PublishGuard {
    /// Try to enter a publish of `topic` on bus `bus`.
    ///
    /// Returns `None`, after logging a warning, when the topic is already in
    /// flight or the nesting depth has reached `max_depth`.
    pub fn enter(bus: u64, topic: &str, max_depth: usize) -> Option<Self> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|e| e.bus == bus && e.topic == topic) {
                tracing::warn!(
                    target: targets::BUS,
                    topic,
                    "dropping re-entrant publish on in-flight topic"
                );
                return None;
            }
            if stack.len() >= max_depth {
                tracing::warn!(
                    target: targets::BUS,
                    topic,
                    depth = stack.len(),
                    "dropping publish nested beyond depth cap"
                );
                return None;
            }
            stack.push(Entry {
                bus,
                topic: topic.to_owned(),
            });
            Some(Self {
                bus,
                topic: topic.to_owned(),
            })
        })
    }

    /// Current nesting depth on this thread.
    pub fn depth() -> usize {
        IN_FLIGHT.with(|stack| stack.borrow().len())
    }

    /// Whether `topic` on `bus` is being published on this thread.
    pub fn is_in_flight(bus: u64, topic: &str) -> bool {
        IN_FLIGHT.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|e| e.bus == bus && e.topic == topic)
        })
    }
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert!(
                    entry.bus == self.bus && entry.topic == self.topic,
                    "PublishGuard mismatch: expected {}, got {}",
                    self.topic,
                    entry.topic
                );
            }
        });
    }
}
