//! Backend adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{0}")]
    Unsupported(&'static str),

    #[error("unknown recipe tag: {0}")]
    UnknownRecipe(String),

    #[error("engine install failed: {0}")]
    InstallFailed(String),

    #[error("engine did not become ready within {0:?}")]
    StartupTimeout(std::time::Duration),

    #[error("backend process exited unexpectedly: {0}")]
    Crashed(String),

    #[error("process supervisor error: {0}")]
    Supervisor(#[from] crate::supervisor::SupervisorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
