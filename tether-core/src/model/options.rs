//! Model construction options.

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, DEFAULT_MODEL_KIND};

/// Options accepted by [`Model::new`](super::Model::new).
///
/// Unset fields fall back to the engine configuration when the model is
/// created through an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Kind used to allocate the model id.
    pub kind: Option<String>,

    /// Key of the nested bucket holding the bindable state.
    pub data_root: Option<String>,
}

impl ModelOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model kind.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the data-root key.
    pub fn data_root(mut self, key: impl Into<String>) -> Self {
        self.data_root = Some(key.into());
        self
    }

    /// Fill unset fields from `config`.
    pub fn or_config(self, config: &EngineConfig) -> Self {
        Self {
            kind: self.kind.or_else(|| Some(config.model_kind.clone())),
            data_root: self.data_root.or_else(|| config.data_root.clone()),
        }
    }

    pub(crate) fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_MODEL_KIND)
    }
}
