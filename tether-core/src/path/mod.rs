//! Path Resolution
//!
//! A path is the canonical string form of a sequence of property accessors,
//! relative to a model root: `items[2].name`, `user.address.city`, `[0]`.
//! Paths are the second half of every bus topic, so two accessor sequences
//! that address the same slot must always produce the same string.
//!
//! # Rules
//!
//! - Numeric keys are wrapped in brackets: `[n]`.
//! - Every other key is joined with a dot.
//! - Resolving against an empty parent yields the bare form (`name`, `[0]`).
//! - A string key that spells a canonical array index (`"3"`, but not
//!   `"03"`) is the same key as the number `3`.
//!
//! Everything in this module is pure; nothing is cached.

mod key;
mod resolve;

pub use key::{PathKey, Steps};
pub use resolve::{is_descendant, parse, resolve, resolve_all};
