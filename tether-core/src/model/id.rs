//! Model identities.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Per-kind sequence counters.
static KIND_COUNTERS: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

fn kind_counters() -> &'static Mutex<HashMap<String, u64>> {
    KIND_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Stable identity of a model, used as the first half of its topics.
///
/// Ids are `kind#sequence`, where the sequence is a monotonic counter kept
/// separately for every kind. An id is assigned once, when the model is
/// created, and is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    kind: Arc<str>,
    seq: u64,
}

impl ModelId {
    /// Allocate the next id for `kind`.
    pub fn next(kind: &str) -> Self {
        let seq = {
            let mut counters = kind_counters().lock();
            let counter = counters.entry(kind.to_owned()).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };
        Self {
            kind: Arc::from(kind),
            seq,
        }
    }

    /// The kind this id was allocated for.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Position of this id within its kind.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.seq)
    }
}
