//! Owner identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Unique identifier for a disposal scope.
///
/// Owner ids double as committer identities on published changes, so a
/// target that writes into a model can recognise its own echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Generate a new unique owner ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for OwnerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner{}", self.0)
    }
}

/// Anything that can scope tracked resources.
pub trait Owner {
    /// The owner's id. Must return the same id for the owner's whole life.
    fn owner_id(&self) -> OwnerId;
}

impl Owner for OwnerId {
    fn owner_id(&self) -> OwnerId {
        *self
    }
}

/// Lazily assigned owner id, for embedding in target types.
///
/// The id is generated on the first call to [`id`](Self::id) and never
/// changes afterwards.
#[derive(Debug, Default)]
pub struct OwnerSlot(OnceLock<OwnerId>);

impl OwnerSlot {
    /// An empty slot.
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// The id, assigning one on first use.
    pub fn id(&self) -> OwnerId {
        *self.0.get_or_init(OwnerId::new)
    }

    /// The id if it has already been assigned.
    pub fn peek(&self) -> Option<OwnerId> {
        self.0.get().copied()
    }
}
