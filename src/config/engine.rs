//! Engine (backend adapter) configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-adapter-kind install/launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory the adapter's engine binary is installed into.
    pub install_dir: PathBuf,
    /// Minimum acceptable installed engine version; below this,
    /// `ensure_installed` re-downloads.
    pub min_version: String,
    /// `.tar.gz` URL template `ensure_installed` downloads when the engine
    /// binary is missing or below `min_version`. `{version}` is substituted
    /// with `min_version`. Left `None`, a missing/stale binary is reported as
    /// an install failure instead of fetched automatically.
    pub download_url: Option<String>,
    /// Seconds to wait for the engine's health endpoint to return 200 after
    /// spawn before treating startup as failed.
    pub startup_timeout_seconds: u64,
    /// Context window size passed to the CPU/GPU engine at startup
    /// (`--ctx-size`). `None` leaves it at the engine's own default.
    pub ctx_size: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from(".gatehouse-cache/engines"),
            min_version: "0.0.0".to_string(),
            download_url: None,
            startup_timeout_seconds: 120,
            ctx_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.startup_timeout_seconds, 120);
    }
}
