//! Tether Core
//!
//! This crate provides the runtime for the Tether data-binding engine.
//! It implements:
//!
//! - Observable models over plain JSON values, with lazily built views
//! - A topic-keyed change bus with re-entrancy protection
//! - Per-owner resource tracking for deterministic teardown
//! - One-way and two-way bindings between model paths and target attributes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `path`: canonical path strings built from accessor steps
//! - `bus`: topics, subscriptions and synchronous publish
//! - `tracker`: owner ids and typed, disposable resources
//! - `model`: observable JSON trees and their views
//! - `binding`: sources, connections and the target contract
//! - `engine`: the entry point tying the above together
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tether_core::binding::{Attr, BindOptions, BindTarget, Element};
//! use tether_core::model::ModelOptions;
//! use tether_core::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let model = engine.create_model(json!({ "user": { "name": "Ada" } }), ModelOptions::new());
//!
//! // Bind a text field; input-like targets default to two-way.
//! let field = Element::text_input();
//! engine.bind(field.clone(), &model, "user.name", BindOptions::new()).unwrap();
//! assert_eq!(field.get_attr(&Attr::Value), json!("Ada"));
//!
//! // Model writes reach the field...
//! model.set_path("user.name", json!("Grace"), None).unwrap();
//! assert_eq!(field.get_attr(&Attr::Value), json!("Grace"));
//!
//! // ...and user edits reach the model.
//! field.input(json!("Hopper"));
//! assert_eq!(model.get_path("user.name"), Some(json!("Hopper")));
//!
//! // Tear everything down for the field.
//! engine.unbind(&*field);
//! ```

pub mod binding;
pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod path;
pub mod tracker;

pub use binding::{BindMode, BindOptions, BindTarget, Bindable, ConnectionHandle};
pub use bus::{Change, ChangeBus, Token};
pub use config::EngineConfig;
pub use engine::{Engine, BINDINGS};
pub use error::{BindError, ConfigError, PathError};
pub use model::{Access, Model, ModelId, ModelOptions, View};
pub use tracker::{Owner, OwnerId, ResourceTracker};
