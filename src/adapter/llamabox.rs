//! CPU/GPU inference engine adapter ("llama-box" recipe)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{AdapterError, BackendAdapter, RequiredArtifact, StartSpec};
use crate::config::EngineConfig;
use crate::supervisor::{ProcessHandle, ProcessSupervisor};

/// Adapter for the llama.cpp-family CPU/GPU engine. Near-identity request
/// translation and `timings`-object telemetry, matching the llama.cpp
/// server's own `/v1/chat/completions` dialect.
pub struct LlamaBoxAdapter {
    client: reqwest::Client,
}

impl LlamaBoxAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendAdapter for LlamaBoxAdapter {
    fn name(&self) -> &'static str {
        "llamabox"
    }

    async fn ensure_installed(&self, config: &EngineConfig) -> Result<(), AdapterError> {
        super::install::ensure_installed_generic(&self.client, config, "llama-box").await
    }

    fn model_required_artifacts(
        &self,
        _checkpoint: &str,
        mmproj: Option<&str>,
    ) -> Vec<RequiredArtifact> {
        // The weight file itself is discovered from the repo's own file
        // listing (see `ArtifactFetcher::resolve_required_files`), since its
        // real name varies by repo and quantization variant. Only the
        // mmproj sidecar, which the model registry names explicitly, is
        // listed here.
        match mmproj {
            Some(mmproj) => vec![RequiredArtifact {
                path_in_repo: mmproj.to_string(),
                expected_size: None,
            }],
            None => Vec::new(),
        }
    }

    async fn start(
        &self,
        spec: &StartSpec,
        config: &EngineConfig,
    ) -> Result<ProcessHandle, AdapterError> {
        let binary = config.install_dir.join("llama-box");
        let model_path = spec.model_dir.join(&spec.variant_file);
        let mut args = vec![
            "--model".to_string(),
            model_path.to_string_lossy().to_string(),
            "--port".to_string(),
            spec.port.to_string(),
            "--host".to_string(),
            "127.0.0.1".to_string(),
        ];
        if let Some(mmproj) = &spec.mmproj_file {
            args.push("--mmproj".to_string());
            args.push(spec.model_dir.join(mmproj).to_string_lossy().to_string());
        }
        if let Some(ctx_size) = config.ctx_size {
            args.push("--ctx-size".to_string());
            args.push(ctx_size.to_string());
        }

        let mut handle = ProcessSupervisor::spawn(&binary.to_string_lossy(), &args)?;
        handle.port = spec.port;

        let deadline = Duration::from_secs(config.startup_timeout_seconds);
        let client = self.client.clone();
        let url = format!("{}{}", self.base_url(spec.port), self.health_path());
        let poll = async move {
            loop {
                if client.get(&url).send().await.is_ok_and(|r| r.status().is_success()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };

        if tokio::time::timeout(deadline, poll).await.is_err() {
            return Err(AdapterError::StartupTimeout(deadline));
        }

        Ok(handle)
    }

    async fn stop(&self, _handle: &ProcessHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    fn translate_request(
        &self,
        endpoint: &str,
        _checkpoint: &str,
        body: &Value,
        port: u16,
    ) -> (String, Value) {
        let url = format!("{}/v1/{}", self.base_url(port), endpoint);
        let mut out = body.clone();
        if let Some(obj) = out.as_object_mut() {
            // llama.cpp's own server uses `n_predict`, not `max_tokens`.
            let max_tokens = obj
                .remove("max_completion_tokens")
                .or_else(|| obj.remove("max_tokens"));
            if let Some(v) = max_tokens {
                obj.insert("n_predict".to_string(), v);
            }
        }
        (url, out)
    }
}
