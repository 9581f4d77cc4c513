//! Engine configuration types.
//!
//! `EngineConfig` is the `[engine]` table of `flowsmith.toml`. Every field has
//! a default, so an empty file (or no file at all) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::workflow::DEFAULT_NODE_TIMEOUT_SECS;

/// Default maximum sub-workflow nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowsmithConfig {
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Tunables for the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum sub-workflow nesting depth; the top level is depth 0.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Timeout applied by tooling that builds nodes without an explicit one.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Upper bound on nodes running at once within a wave. `None` is unbounded.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Base delay between retry attempts; attempt `n` waits `n * base`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Agent outputs longer than this are truncated (with a warning).
    #[serde(default)]
    pub max_output_bytes: Option<usize>,

    /// Extra agent capability tags accepted besides the built-ins.
    #[serde(default)]
    pub custom_capabilities: Vec<String>,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_timeout_secs() -> u64 {
    DEFAULT_NODE_TIMEOUT_SECS
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            default_timeout_secs: default_timeout_secs(),
            max_concurrency: None,
            retry_backoff_ms: default_retry_backoff_ms(),
            max_output_bytes: None,
            custom_capabilities: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.default_timeout_secs, 300);
        assert_eq!(config.retry_backoff_ms, 500);
        assert!(config.max_concurrency.is_none());
        assert!(config.custom_capabilities.is_empty());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: FlowsmithConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
[engine]
max_depth = 3
max_concurrency = 4
retry_backoff_ms = 50
max_output_bytes = 65536
custom_capabilities = ["critic", "summarizer"]
"#;
        let config: FlowsmithConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.max_depth, 3);
        assert_eq!(config.engine.max_concurrency, Some(4));
        assert_eq!(config.engine.retry_backoff_ms, 50);
        assert_eq!(config.engine.max_output_bytes, Some(65536));
        assert_eq!(config.engine.custom_capabilities, vec!["critic", "summarizer"]);
        assert_eq!(config.engine.default_timeout_secs, 300);
    }
}
