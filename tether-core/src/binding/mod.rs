//! Bindings
//!
//! A binding keeps one attribute of a target in step with one path (or one
//! derived value) of a model.
//!
//! # How Bindings Work
//!
//! 1. The engine builds two [`Source`]s: a [`ModelSource`] listening on the
//!    model's topic for the bound path, and a [`TargetSource`] writing the
//!    chosen attribute of the target.
//!
//! 2. A [`Connection`] pairs them. Binding copies the current model value
//!    into the target, then forwards every later model change.
//!
//! 3. In two-way mode the target side also listens for user input and
//!    writes it back into the model, tagged with the target's owner id.
//!
//! 4. When that write is published, the target side sees its own owner id
//!    as the committer and skips it. Nothing loops.
//!
//! # Attribute Strategy
//!
//! Unless an attribute is named, the target's [`TargetKind`] decides:
//! checkboxes and radios bind `checked`, text fields and selects bind
//! `value`, and everything else binds its text content.

mod connection;
mod element;
mod filter;
mod options;
mod source;
mod target;

pub use connection::{BindMode, Connection, ConnectionHandle, ConnectionState};
pub use element::Element;
pub use filter::FilterTemplate;
pub use options::BindOptions;
pub use source::{Accessor, Bindable, ModelSource, Source, TargetSource};
pub use target::{stringify, truthy, Attr, BindTarget, InputListener, ListenerId, TargetKind};
