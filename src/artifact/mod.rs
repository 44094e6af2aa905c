//! Artifact store and fetcher
//!
//! `ArtifactStore` answers "is this model on disk" against the
//! content-addressed cache layout in [`cache`]; `ArtifactFetcher` is the
//! thing that makes that answer become `Cached`. Split the way the teacher
//! splits read-side registry lookups from the write-side health checker: one
//! type inspects shared state, a different type mutates it.
//!
//! This subsystem replaces a third-party model-hub client rather than
//! wrapping one, per the single-backend gateway's requirement for custom
//! variant filtering, resume, and offline-mode semantics that such a client
//! does not expose as a library API. The on-disk layout is kept
//! wire-compatible with that hub's client so any cache populated by this
//! store can be read by other tooling that understands the layout.

pub mod cache;
pub mod error;
pub mod fetcher;

pub use cache::{ArtifactCacheEntry, CacheFile, CacheStatus};
pub use error::DownloadError;
pub use fetcher::{ArtifactFetcher, DownloadOptions, ProgressEvent};

use std::collections::HashMap;
use std::path::PathBuf;

/// Read-side view over the on-disk artifact cache.
pub struct ArtifactStore {
    cache_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &PathBuf {
        &self.cache_root
    }

    /// Compute cache status for a repo/revision against the given required
    /// file list (sizes are advisory; `None` means "presence only").
    pub fn status(
        &self,
        repo_id: &str,
        revision: &str,
        required_files: &[(&str, Option<u64>)],
    ) -> CacheStatus {
        if required_files.is_empty() {
            return CacheStatus::NotCached;
        }
        let mut present = 0usize;
        for (file, expected_size) in required_files {
            let path = cache::snapshot_file(&self.cache_root, repo_id, revision, file);
            match std::fs::metadata(&path) {
                Ok(meta) => {
                    if let Some(expected) = expected_size {
                        if meta.len() == *expected {
                            present += 1;
                        }
                    } else {
                        present += 1;
                    }
                }
                Err(_) => continue,
            }
        }
        if present == 0 {
            CacheStatus::NotCached
        } else if present == required_files.len() {
            CacheStatus::Cached
        } else {
            CacheStatus::Partial
        }
    }

    /// Build an [`ArtifactCacheEntry`] snapshot of what's on disk for a repo.
    pub fn entry(
        &self,
        repo_id: &str,
        revision: &str,
        required_files: &[(&str, Option<u64>)],
    ) -> ArtifactCacheEntry {
        let status = self.status(repo_id, revision, required_files);
        let mut files = HashMap::new();
        for (file, _) in required_files {
            let path = cache::snapshot_file(&self.cache_root, repo_id, revision, file);
            if let Ok(meta) = std::fs::metadata(&path) {
                files.insert(
                    file.to_string(),
                    CacheFile {
                        size: meta.len(),
                        etag: None,
                        local_path: path,
                    },
                );
            }
        }
        ArtifactCacheEntry {
            repo_id: repo_id.to_string(),
            revision: revision.to_string(),
            files,
            status,
        }
    }

    /// Whether any files at all are cached for `repo_id`@`main`, for
    /// listing purposes where the caller doesn't know the adapter-specific
    /// required file set (e.g. `GET /api/v1/models`).
    pub fn is_downloaded(&self, repo_id: &str) -> bool {
        let dir = cache::snapshot_dir(&self.cache_root, repo_id, "main");
        std::fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Remove a repo's entire cache directory (all revisions/blobs).
    pub fn delete(&self, repo_id: &str) -> std::io::Result<()> {
        let root = cache::repo_root(&self.cache_root, repo_id);
        if root.exists() {
            std::fs::remove_dir_all(root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_downloaded_false_when_nothing_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(!store.is_downloaded("org/repo"));
    }

    #[test]
    fn is_downloaded_true_when_any_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = cache::snapshot_file(dir.path(), "org/repo", "main", "model.gguf");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"1234").unwrap();
        assert!(store.is_downloaded("org/repo"));
    }

    #[test]
    fn status_not_cached_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let status = store.status("org/repo", "main", &[("model.gguf", None)]);
        assert_eq!(status, CacheStatus::NotCached);
    }

    #[test]
    fn status_cached_when_all_files_present_with_matching_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = cache::snapshot_file(dir.path(), "org/repo", "main", "model.gguf");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"1234").unwrap();

        let status = store.status("org/repo", "main", &[("model.gguf", Some(4))]);
        assert_eq!(status, CacheStatus::Cached);
    }

    #[test]
    fn status_partial_when_some_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = cache::snapshot_file(dir.path(), "org/repo", "main", "a.gguf");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"1234").unwrap();

        let status = store.status(
            "org/repo",
            "main",
            &[("a.gguf", Some(4)), ("b.gguf", Some(4))],
        );
        assert_eq!(status, CacheStatus::Partial);
    }

    #[test]
    fn delete_removes_repo_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = cache::snapshot_file(dir.path(), "org/repo", "main", "a.gguf");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"1234").unwrap();

        store.delete("org/repo").unwrap();
        assert!(!cache::repo_root(dir.path(), "org/repo").exists());
    }
}
