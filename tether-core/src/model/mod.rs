//! Observable Models
//!
//! A model wraps a caller-supplied JSON tree and turns writes into
//! notifications on the change bus.
//!
//! # Concepts
//!
//! ## Views
//!
//! Reading a key through a [`View`] yields the scalar itself, or, for an
//! object or array, a new view scoped to the deeper path. Views are built on
//! demand and never cached, so there is no long-lived reference into the
//! tree that could go stale when a subtree is replaced.
//!
//! ## Writes
//!
//! A write resolves its path with [`crate::path`], mutates the tree under the
//! write lock, releases the lock and only then publishes. Subscribers that
//! read the model from inside their callback therefore see the new value.
//!
//! ## Committers
//!
//! Every write carries an optional [`OwnerId`](crate::tracker::OwnerId)
//! naming whoever made it. Bindings use it to skip re-applying a value to
//! the target that produced it.
//!
//! ## Stale Access
//!
//! Writing through a path whose intermediate containers are missing or are
//! scalars does nothing and returns `false`; reading through one yields
//! [`Access::Missing`]. Neither is an error, since teardown races between a
//! model and its views are expected.

mod id;
mod observable;
mod options;
mod tree;
mod view;

pub use id::ModelId;
pub use observable::{Model, CHANGE_SUFFIX};
pub use options::ModelOptions;
pub use view::{Access, View};
