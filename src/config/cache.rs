//! Artifact cache and download configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_cache_root() -> PathBuf {
    if let Ok(dir) = std::env::var("LEMONADE_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cache").join("gatehouse");
    }
    PathBuf::from(".gatehouse-cache")
}

/// Artifact cache and download behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
    /// When true, the ArtifactFetcher never reaches the network and treats
    /// any cache miss as `offline_cache_miss`.
    pub offline: bool,
    pub hf_token: Option<String>,
    /// Override the artifact hub's base URL, e.g. to point at a private
    /// mirror. Defaults to the public hub when unset.
    pub hub_base_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            offline: false,
            hf_token: None,
            hub_base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_defaults_not_offline() {
        let config = CacheConfig::default();
        assert!(!config.offline);
        assert!(config.hf_token.is_none());
    }
}
