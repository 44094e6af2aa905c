//! Single-instance guard and graceful shutdown
//!
//! Grounded in the teacher's `cli::serve::shutdown_signal` (a
//! `tokio::select!` over ctrl-c and SIGTERM driving a `CancellationToken`)
//! plus `fs2`'s advisory exclusive file lock for the single-instance
//! requirement the teacher's multi-backend gateway never needed (it isn't
//! itself a singleton resource the way a backend process is).

use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Holds an advisory exclusive lock on a stable path for the lifetime of the
/// process. Dropping the guard releases the lock.
pub struct InstanceGuard {
    _file: File,
    path: PathBuf,
}

impl InstanceGuard {
    /// Attempt to acquire the lock non-blockingly. Returns `None` if another
    /// instance already holds it.
    pub fn try_acquire(path: impl Into<PathBuf>) -> std::io::Result<Option<Self>> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default lock-file path under the cache root.
pub fn default_lock_path(cache_root: &Path) -> PathBuf {
    cache_root.join("gatehouse.lock")
}

/// Waits for Ctrl-C or SIGTERM, then cancels `cancel_token`. Mirrors the
/// teacher's `shutdown_signal`, generalized to the same token used to tear
/// down the router's loaded backend and release the instance lock.
pub async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    cancel_token.cancel();
}
