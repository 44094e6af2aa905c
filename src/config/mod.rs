//! Configuration module for the gateway
//!
//! Provides layered configuration loading from a TOML file, environment
//! variables, and CLI overrides (applied in that order by the caller).

pub mod cache;
pub mod engine;
pub mod error;
pub mod logging;
pub mod server;

pub use cache::CacheConfig;
pub use engine::EngineConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, merging all sub-configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatehouseConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub engine: EngineConfig,
}

impl GatehouseConfig {
    /// Load configuration from a TOML file.
    ///
    /// If `path` is `None`, returns the default configuration. If `path` is
    /// `Some` and the file does not exist, returns `ConfigError::NotFound`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `LEMONADE_*`/`GATEHOUSE_*` environment variable overrides.
    ///
    /// Invalid values are silently ignored and the existing value (file or
    /// default) is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("GATEHOUSE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("GATEHOUSE_HOST") {
            self.server.host = host;
        }
        if let Ok(level) = std::env::var("GATEHOUSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEHOUSE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(dir) = std::env::var("LEMONADE_CACHE_DIR") {
            self.cache.root = dir.into();
        }
        if let Ok(token) = std::env::var("HF_TOKEN") {
            self.cache.hf_token = Some(token);
        }
        if let Ok(offline) = std::env::var("LEMONADE_OFFLINE") {
            self.cache.offline = offline == "1" || offline.to_lowercase() == "true";
        }

        self
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::Validation {
                field: "server.max_concurrent_requests".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
