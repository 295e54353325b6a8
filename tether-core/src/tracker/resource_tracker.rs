//! Resource Tracker Implementation

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::owner::OwnerId;
use crate::logging::targets;

/// One tracked item.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Releases one tracked item of a given type.
pub type Disposer = Arc<dyn Fn(Payload) + Send + Sync>;

/// The process-wide tracker.
static GLOBAL_TRACKER: OnceLock<Arc<ResourceTracker>> = OnceLock::new();

/// Items of one owner, grouped by type in first-added order.
type Buckets = IndexMap<String, Vec<Payload>>;

#[derive(Default)]
struct TrackerState {
    disposers: HashMap<String, Disposer>,
    owners: HashMap<OwnerId, Buckets>,
}

/// Registry of disposable items per owner.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tether_core::tracker::{OwnerId, ResourceTracker};
///
/// let tracker = ResourceTracker::new();
/// let released = Arc::new(AtomicUsize::new(0));
/// let released_clone = released.clone();
/// tracker.add_type("timers", move |_item| {
///     released_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// let owner = OwnerId::new();
/// tracker.add(owner, "timers", 17_u32);
/// tracker.add(owner, "timers", 18_u32);
///
/// assert_eq!(tracker.remove(owner, None), 2);
/// assert_eq!(tracker.remove(owner, None), 0);
/// assert_eq!(released.load(Ordering::SeqCst), 2);
/// ```
pub struct ResourceTracker {
    state: Mutex<TrackerState>,
}

impl ResourceTracker {
    /// Create an empty tracker with no registered types.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// The process-wide tracker, created on first use.
    pub fn global() -> Arc<ResourceTracker> {
        GLOBAL_TRACKER
            .get_or_init(|| Arc::new(ResourceTracker::new()))
            .clone()
    }

    /// Register how to release one item of type `ty`.
    ///
    /// The disposer is called exactly once per stored item when that item is
    /// removed. Registering a type again replaces its disposer.
    pub fn add_type<F>(&self, ty: &str, disposer: F)
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        let previous = self
            .state
            .lock()
            .disposers
            .insert(ty.to_owned(), Arc::new(disposer));
        if previous.is_some() {
            tracing::debug!(target: targets::TRACKER, ty, "disposer replaced");
        }
    }

    /// Whether a disposer is registered for `ty`.
    pub fn has_type(&self, ty: &str) -> bool {
        self.state.lock().disposers.contains_key(ty)
    }

    /// Track `payload` under `owner` and `ty`.
    pub fn add<T>(&self, owner: OwnerId, ty: &str, payload: T)
    where
        T: Any + Send + Sync,
    {
        self.add_arc(owner, ty, Arc::new(payload));
    }

    /// Track an already shared payload.
    pub fn add_arc(&self, owner: OwnerId, ty: &str, payload: Payload) {
        let mut state = self.state.lock();
        if !state.disposers.contains_key(ty) {
            tracing::trace!(
                target: targets::TRACKER,
                %owner,
                ty,
                "tracking item of a type with no disposer"
            );
        }
        state
            .owners
            .entry(owner)
            .or_default()
            .entry(ty.to_owned())
            .or_default()
            .push(payload);
    }

    /// Items of type `ty` tracked under `owner`, in insertion order.
    pub fn get(&self, owner: OwnerId, ty: &str) -> Vec<Payload> {
        self.state
            .lock()
            .owners
            .get(&owner)
            .and_then(|buckets| buckets.get(ty))
            .cloned()
            .unwrap_or_default()
    }

    /// Items of type `ty` under `owner` that are a `T`.
    pub fn get_as<T>(&self, owner: OwnerId, ty: &str) -> Vec<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get(owner, ty)
            .into_iter()
            .filter_map(|payload| payload.downcast::<T>().ok())
            .collect()
    }

    /// Types tracked under `owner`, in first-added order.
    pub fn types(&self, owner: OwnerId) -> Vec<String> {
        self.state
            .lock()
            .owners
            .get(&owner)
            .map(|buckets| buckets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether anything is tracked under `owner`.
    pub fn has(&self, owner: OwnerId) -> bool {
        self.state.lock().owners.contains_key(&owner)
    }

    /// Number of owners with tracked items.
    pub fn owner_count(&self) -> usize {
        self.state.lock().owners.len()
    }

    /// Dispose items tracked under `owner`.
    ///
    /// With `Some(ty)`, only that type is disposed and the owner entry is
    /// dropped if nothing else remains. With `None`, every type is disposed
    /// and the owner is forgotten. Unknown owners and types are a no-op.
    ///
    /// Returns the number of items removed.
    pub fn remove(&self, owner: OwnerId, ty: Option<&str>) -> usize {
        let batches = {
            let mut state = self.state.lock();
            let taken: Vec<(String, Vec<Payload>)> = match ty {
                Some(ty) => {
                    let Some(buckets) = state.owners.get_mut(&owner) else {
                        return 0;
                    };
                    let items = buckets.shift_remove(ty);
                    if buckets.is_empty() {
                        state.owners.remove(&owner);
                    }
                    items.map(|items| vec![(ty.to_owned(), items)]).unwrap_or_default()
                }
                None => state
                    .owners
                    .remove(&owner)
                    .map(|buckets| buckets.into_iter().collect())
                    .unwrap_or_default(),
            };
            with_disposers(&state.disposers, taken)
        };

        let removed = dispose(owner, batches);
        if removed > 0 {
            tracing::debug!(target: targets::TRACKER, %owner, ty, removed, "disposed");
        }
        removed
    }

    /// Dispose the items of type `ty` under `owner` for which `pred` holds.
    ///
    /// Returns the number of items removed.
    pub fn remove_where<P>(&self, owner: OwnerId, ty: &str, pred: P) -> usize
    where
        P: Fn(&Payload) -> bool,
    {
        let batches = {
            let mut state = self.state.lock();
            let Some(buckets) = state.owners.get_mut(&owner) else {
                return 0;
            };
            let Some(items) = buckets.get_mut(ty) else {
                return 0;
            };
            let (taken, kept): (Vec<Payload>, Vec<Payload>) =
                items.drain(..).partition(|payload| pred(payload));
            *items = kept;
            if items.is_empty() {
                buckets.shift_remove(ty);
            }
            if buckets.is_empty() {
                state.owners.remove(&owner);
            }
            with_disposers(&state.disposers, vec![(ty.to_owned(), taken)])
        };

        dispose(owner, batches)
    }

    /// Forget every owner and disposer without running any disposer.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.owners.clear();
        state.disposers.clear();
    }

    /// Alias of [`clear`](Self::clear), for test isolation.
    pub fn reset(&self) {
        self.clear();
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourceTracker")
            .field("owner_count", &state.owners.len())
            .field("type_count", &state.disposers.len())
            .finish()
    }
}

type Batch = (String, Option<Disposer>, Vec<Payload>);

fn with_disposers(
    disposers: &HashMap<String, Disposer>,
    taken: Vec<(String, Vec<Payload>)>,
) -> Vec<Batch> {
    taken
        .into_iter()
        .map(|(ty, items)| {
            let disposer = disposers.get(&ty).cloned();
            (ty, disposer, items)
        })
        .collect()
}

/// Run disposers outside the lock. Each item is moved into its disposer, so
/// the tracker holds no reference to it by the time the disposer runs.
fn dispose(owner: OwnerId, batches: Vec<Batch>) -> usize {
    let mut removed = 0;
    for (ty, disposer, items) in batches {
        removed += items.len();
        let Some(disposer) = disposer else {
            tracing::trace!(
                target: targets::TRACKER,
                %owner,
                ty = ty.as_str(),
                "no disposer registered"
            );
            continue;
        };
        for item in items {
            if let Err(_payload) = catch_unwind(AssertUnwindSafe(|| disposer(item))) {
                tracing::error!(
                    target: targets::TRACKER,
                    %owner,
                    ty = ty.as_str(),
                    "disposer panicked"
                );
            }
        }
    }
    removed
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
