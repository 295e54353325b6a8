//! Change Bus
//!
//! The bus is a keyed registry of subscriber lists. Publishing to a topic
//! hands a [`Change`] to every subscriber of that topic, in registration
//! order, and then to the optional global sink.
//!
//! # Topics
//!
//! Models publish on `modelId:path` and `modelId/change`, but the bus itself
//! attaches no meaning to topic strings. Routers, stores and other
//! collaborators publish on whatever keys they agree on.
//!
//! # Delivery Guarantees
//!
//! - Each publish iterates a snapshot of the subscriber list, so a callback
//!   may subscribe or unsubscribe (itself or a sibling) without skipping or
//!   double-visiting anyone in the current publish.
//! - Unsubscribing takes effect for future publishes only.
//! - A panicking subscriber is caught and logged; the rest still run.
//! - A publish on a topic that is already being published on the current
//!   thread is dropped, as is any publish nested deeper than the bus's
//!   depth cap. See [`PublishGuard`].
//!
//! No lock is held while callbacks run, so callbacks may freely call back
//! into the bus or into models.

mod change;
mod change_bus;
mod guard;

pub use change::{Callback, Change, SinkCallback, Token};
pub use change_bus::ChangeBus;
pub use guard::PublishGuard;
