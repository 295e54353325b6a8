//! Logging targets.
//!
//! Tether logs through the `tracing` crate and never installs a subscriber
//! itself. Applications opt in with whatever subscriber they already use:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("tether_core::bus=debug")
//!     .init();
//! ```
//!
//! Absorbed faults (stale writes, panicking subscribers, dropped re-entrant
//! publishes) are only visible here, so enabling `warn` for
//! [`targets::CORE`] is recommended during development.

/// Target names for log filtering.
pub mod targets {
    /// Whole-crate target.
    pub const CORE: &str = "tether_core";
    /// Change bus: subscriptions, publishes, subscriber faults.
    pub const BUS: &str = "tether_core::bus";
    /// Observable models: writes, stale views.
    pub const MODEL: &str = "tether_core::model";
    /// Resource tracker: owners, disposal.
    pub const TRACKER: &str = "tether_core::tracker";
    /// Bindings: connections, sources, echo suppression.
    pub const BINDING: &str = "tether_core::binding";
}
