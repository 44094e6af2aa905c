//! Backend adapter abstraction
//!
//! Grounded directly in the teacher's `agent::InferenceAgent` trait: an
//! `async_trait`, object-safe (`Arc<dyn BackendAdapter>`), cancellation-safe
//! interface with a handful of required methods and a couple of optional
//! ones with sensible defaults. Where the teacher has one trait implemented
//! by many backend *flavors* running concurrently, this crate has the same
//! trait implemented by exactly two *adapters*, of which at most one runs at
//! a time (see [`crate::router`]).

pub mod error;
pub mod install;
pub mod llamabox;
pub mod npu;

pub use error::AdapterError;

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::supervisor::ProcessHandle;

/// Closed set of adapter kinds. spec.md §9's redesign flag: a closed tagged
/// enum dispatch rather than an open plugin registry, since exactly two
/// engines exist and a third would be a deliberate code change, not a
/// runtime plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    LlamaBox,
    Npu,
}

impl FromStr for AdapterKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llamabox" | "llama.cpp" | "llama-box" => Ok(AdapterKind::LlamaBox),
            "npu" => Ok(AdapterKind::Npu),
            other => Err(AdapterError::UnknownRecipe(other.to_string())),
        }
    }
}

impl AdapterKind {
    pub fn recipe_tag(self) -> &'static str {
        match self {
            AdapterKind::LlamaBox => "llamabox",
            AdapterKind::Npu => "npu",
        }
    }
}

/// A file the adapter needs present on disk before it can start serving a
/// given checkpoint.
#[derive(Debug, Clone)]
pub struct RequiredArtifact {
    pub path_in_repo: String,
    pub expected_size: Option<u64>,
}

/// What the adapter needs to start a backend process for one model.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub model_name: String,
    pub checkpoint: String,
    pub variant_file: String,
    pub mmproj_file: Option<String>,
    pub model_dir: PathBuf,
    pub port: u16,
}

/// Interface every backend adapter implements. Object-safe so the router can
/// hold `Box<dyn BackendAdapter>` without knowing the concrete adapter.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short recipe tag this adapter answers to, e.g. `"llamabox"`.
    fn name(&self) -> &'static str;

    /// Ensure the engine binary itself (not the model) is installed and
    /// meets `config.min_version`, downloading/extracting it if not.
    async fn ensure_installed(&self, config: &EngineConfig) -> Result<(), AdapterError>;

    /// Files this adapter needs present on disk to serve `checkpoint`,
    /// beyond whatever [`crate::artifact::ArtifactFetcher`] discovers on its
    /// own from the repo's file listing (e.g. an mmproj sidecar).
    fn model_required_artifacts(&self, checkpoint: &str, mmproj: Option<&str>) -> Vec<RequiredArtifact>;

    /// Whether this adapter needs weights staged through
    /// [`crate::artifact::ArtifactFetcher`] at all. `false` for adapters
    /// (the NPU engine) that acquire their own weights out of band.
    fn requires_artifact_store(&self) -> bool {
        true
    }

    /// Spawn the backend process and block until its health endpoint returns
    /// 200 or `config.startup_timeout_seconds` elapses.
    async fn start(
        &self,
        spec: &StartSpec,
        config: &EngineConfig,
    ) -> Result<ProcessHandle, AdapterError>;

    /// Request graceful shutdown of a running backend process.
    async fn stop(&self, handle: &ProcessHandle) -> Result<(), AdapterError>;

    /// Translate an incoming JSON request body bound for `endpoint` (one of
    /// `"chat/completions"`, `"completions"`, `"embeddings"`, `"rerank"`)
    /// into the adapter's own wire dialect, returning the full URL to POST to
    /// and the translated body. `checkpoint` is the loaded session's
    /// checkpoint id, needed by adapters (e.g. the NPU adapter) whose dialect
    /// expects it in place of the gateway-facing model name.
    fn translate_request(
        &self,
        endpoint: &str,
        checkpoint: &str,
        body: &Value,
        port: u16,
    ) -> (String, Value);

    /// Base URL for the running backend's OpenAI-compatible endpoint.
    fn base_url(&self, port: u16) -> String {
        format!("http://127.0.0.1:{}", port)
    }

    /// Whether this adapter's health endpoint is expected to diverge from
    /// "process still alive" (spec.md §9 Open Question 2): both signals are
    /// tracked, but only the HTTP-200 signal gates readiness; a mismatch is
    /// logged, not acted on.
    fn health_path(&self) -> &'static str {
        "/health"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_recipes() {
        assert_eq!(AdapterKind::from_str("llamabox").unwrap(), AdapterKind::LlamaBox);
        assert_eq!(AdapterKind::from_str("NPU").unwrap(), AdapterKind::Npu);
    }

    #[test]
    fn rejects_unknown_recipe() {
        assert!(AdapterKind::from_str("vulkan-magic").is_err());
    }

    #[test]
    fn recipe_tag_round_trips() {
        for kind in [AdapterKind::LlamaBox, AdapterKind::Npu] {
            assert_eq!(AdapterKind::from_str(kind.recipe_tag()).unwrap(), kind);
        }
    }
}
