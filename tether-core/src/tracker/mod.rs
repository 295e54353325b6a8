//! Resource Tracking
//!
//! The tracker associates an owner (usually a bound target) with lists of
//! typed, disposable items: connections, event listeners, timers, route
//! registrations. When the owner is torn down, one call releases all of them.
//!
//! # Types and Disposers
//!
//! How to release an item is registered once per *type*, globally, with
//! [`ResourceTracker::add_type`]. Items stored under a type with no disposer
//! are still stored and can be queried, but removing them performs no
//! cleanup beyond dropping the tracker's reference.
//!
//! # Ownership
//!
//! The tracker is an indirection table `owner id -> type -> items`. Nothing
//! stored in it points back at the owner, so disposing an owner is a single
//! map removal followed by the disposers, with no cycles to break by hand.
//! Items are taken out of the table before any disposer runs, so a disposer
//! never observes a half-removed collection and may itself call back into
//! the tracker.

mod owner;
mod resource_tracker;

pub use owner::{Owner, OwnerId, OwnerSlot};
pub use resource_tracker::{Disposer, Payload, ResourceTracker};
