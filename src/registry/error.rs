//! Registry error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("model already registered: {0}")]
    Conflict(String),

    #[error("model name conflicts with a shipped catalog entry: {0}")]
    ShippedNameConflict(String),

    #[error("failed to read user catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse user catalog: {0}")]
    Parse(String),
}
