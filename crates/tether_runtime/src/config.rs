//! Runtime Configuration
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # Example Config File
//!
//! ```toml
//! wire_format = "binary"   # json, binary
//! lazy_constants = true
//! dispose_policy = "drain" # drain, discard
//! log_filter = "tether=debug"
//!
//! [queues.script]
//! name = "app.script"
//! stack_size = 8388608
//!
//! [queues.layout]
//! name = "app.layout"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use tether_core::WireFormat;
use tether_modules::ConstantsPolicy;
use tether_queue::{DisposePolicy, QueueSetSpec};

use crate::RuntimeResult;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Encoding used between the bridge and the script engine
    pub wire_format: WireFormat,
    /// Collect module constants on first request instead of at startup
    pub lazy_constants: bool,
    /// What happens to queued tasks on teardown
    pub dispose_policy: DisposePolicy,
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Queue names and stack sizes
    pub queues: QueueSetSpec,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wire_format: WireFormat::Json,
            lazy_constants: false,
            dispose_policy: DisposePolicy::Drain,
            log_filter: "info".to_string(),
            queues: QueueSetSpec::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> RuntimeResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        log::info!("Loading runtime config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> RuntimeResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn with_lazy_constants(mut self, lazy: bool) -> Self {
        self.lazy_constants = lazy;
        self
    }

    pub fn with_dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.dispose_policy = policy;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_queues(mut self, queues: QueueSetSpec) -> Self {
        self.queues = queues;
        self
    }

    /// Constants policy implied by `lazy_constants`
    pub fn constants_policy(&self) -> ConstantsPolicy {
        if self.lazy_constants {
            ConstantsPolicy::Lazy
        } else {
            ConstantsPolicy::Eager
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_parse_config() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            wire_format = "binary"
            lazy_constants = true
            dispose_policy = "discard"

            [queues.script]
            name = "app.script"
            stack_size = 4194304
            "#,
        )
        .unwrap();

        assert_eq!(config.wire_format, WireFormat::Binary);
        assert_eq!(config.constants_policy(), ConstantsPolicy::Lazy);
        assert_eq!(config.dispose_policy, DisposePolicy::Discard);
        assert_eq!(config.queues.script.name, "app.script");
        assert_eq!(config.queues.script.stack_size, Some(4 * 1024 * 1024));
        assert_eq!(config.queues.layout.name, "tether.layout");
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(RuntimeConfig::from_toml_str("wire_format = \"xml\"").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RuntimeConfig::default()
            .with_wire_format(WireFormat::Binary)
            .with_log_filter("debug");
        let text = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }
}
