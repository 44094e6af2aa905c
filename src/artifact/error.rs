//! Artifact store/fetch error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("offline mode enabled and {0} is not fully cached")]
    OfflineCacheMiss(String),

    #[error("transient network error after {attempts} attempts: {source}")]
    TransientNetwork {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to acquire cache lock for {0}")]
    LockContended(String),

    #[error("no file in {repo_id} matched the requested variant")]
    NoMatchingVariant { repo_id: String },
}
