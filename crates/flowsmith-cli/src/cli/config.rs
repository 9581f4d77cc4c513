//! Configuration file loading.
//!
//! `flowsmith.toml` is optional. A missing file means defaults; a file that
//! cannot be read or parsed is reported with a warning and also yields
//! defaults, so a broken config never blocks validation or formatting.

use std::path::Path;

use flowsmith_types::config::FlowsmithConfig;

/// Looked up in the working directory unless `--config` says otherwise.
pub const DEFAULT_CONFIG_FILE: &str = "flowsmith.toml";

/// Load the configuration at `path`, falling back to defaults.
pub async fn load_config(path: &Path) -> FlowsmithConfig {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return FlowsmithConfig::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read config file; using defaults");
            return FlowsmithConfig::default();
        }
    };

    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config file; using defaults");
            FlowsmithConfig::default()
        }
    }
}
