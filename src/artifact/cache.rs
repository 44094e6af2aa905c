//! Content-addressed artifact cache entry types
//!
//! Mirrors the well-known model-hub on-disk layout so existing tooling that
//! understands that layout can read this cache directly:
//! `<cache_root>/models--<org>--<repo>/snapshots/<revision>/<file>` with the
//! real content living under `blobs/` and `snapshots/` entries linking (or,
//! where symlinks aren't available, copying) into it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    NotCached,
    Partial,
    Cached,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheFile {
    pub size: u64,
    pub etag: Option<String>,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactCacheEntry {
    pub repo_id: String,
    pub revision: String,
    pub files: HashMap<String, CacheFile>,
    pub status: CacheStatus,
}

/// Turn a hub-style `org/repo` id into the `models--org--repo` directory
/// name segment used by the cache layout.
pub fn repo_dir_name(repo_id: &str) -> String {
    format!("models--{}", repo_id.replace('/', "--"))
}

pub fn repo_root(cache_root: &Path, repo_id: &str) -> PathBuf {
    cache_root.join(repo_dir_name(repo_id))
}

pub fn blobs_dir(cache_root: &Path, repo_id: &str) -> PathBuf {
    repo_root(cache_root, repo_id).join("blobs")
}

pub fn snapshot_dir(cache_root: &Path, repo_id: &str, revision: &str) -> PathBuf {
    repo_root(cache_root, repo_id).join("snapshots").join(revision)
}

pub fn snapshot_file(cache_root: &Path, repo_id: &str, revision: &str, file: &str) -> PathBuf {
    snapshot_dir(cache_root, repo_id, revision).join(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_dir_name_replaces_slash() {
        assert_eq!(repo_dir_name("org/repo"), "models--org--repo");
    }

    #[test]
    fn snapshot_file_path_layout() {
        let root = Path::new("/cache");
        let path = snapshot_file(root, "org/repo", "main", "model.gguf");
        assert_eq!(
            path,
            Path::new("/cache/models--org--repo/snapshots/main/model.gguf")
        );
    }
}
