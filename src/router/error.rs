//! Router error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no model is currently loaded")]
    NothingLoaded,

    #[error("model '{0}' is not registered")]
    ModelNotFound(String),

    #[error(transparent)]
    Adapter(#[from] crate::adapter::AdapterError),

    #[error(transparent)]
    Supervisor(#[from] crate::supervisor::SupervisorError),

    #[error(transparent)]
    Download(#[from] crate::artifact::DownloadError),
}
