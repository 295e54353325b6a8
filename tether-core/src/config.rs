//! Engine configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use tether_core::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "data_root": "data" }"#).unwrap();
//! assert_eq!(config.data_root.as_deref(), Some("data"));
//! assert_eq!(config.model_kind, "model");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default model kind used for id generation.
pub const DEFAULT_MODEL_KIND: &str = "model";

/// Default placeholder substituted by filter templates.
pub const DEFAULT_PLACEHOLDER: &str = "{}";

/// Default topic on which owner ids are published for teardown.
pub const DEFAULT_DESTROY_TOPIC: &str = "lifecycle:destroy";

/// Default cap on nested publishes within one cycle.
pub const DEFAULT_MAX_PUBLISH_DEPTH: usize = 64;

/// Settings shared by every model and binding an [`Engine`](crate::Engine)
/// creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Kind given to models created without explicit options.
    pub model_kind: String,

    /// Data-root key given to models created without explicit options.
    pub data_root: Option<String>,

    /// Maximum number of publishes that may be nested inside one another.
    pub max_publish_depth: usize,

    /// Marker replaced by the live value in filter templates.
    pub filter_placeholder: String,

    /// Topic whose payload is an owner id to tear down.
    pub destroy_topic: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_kind: DEFAULT_MODEL_KIND.to_owned(),
            data_root: None,
            max_publish_depth: DEFAULT_MAX_PUBLISH_DEPTH,
            filter_placeholder: DEFAULT_PLACEHOLDER.to_owned(),
            destroy_topic: DEFAULT_DESTROY_TOPIC.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_kind.is_empty() {
            return Err(ConfigError::Invalid {
                field: "model_kind",
                reason: "must not be empty".into(),
            });
        }
        if self.max_publish_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_publish_depth",
                reason: "must be at least 1".into(),
            });
        }
        if self.filter_placeholder.is_empty() {
            return Err(ConfigError::Invalid {
                field: "filter_placeholder",
                reason: "must not be empty".into(),
            });
        }
        if matches!(self.data_root.as_deref(), Some("")) {
            return Err(ConfigError::Invalid {
                field: "data_root",
                reason: "must not be empty when set".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn rejects_zero_depth() {
        let err = EngineConfig::from_json(r#"{ "max_publish_depth": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_publish_depth",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = EngineConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let config = EngineConfig {
            data_root: Some("state".into()),
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
