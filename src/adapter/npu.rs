//! NPU inference engine adapter

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{AdapterError, BackendAdapter, RequiredArtifact, StartSpec};
use crate::config::EngineConfig;
use crate::supervisor::{ProcessHandle, ProcessSupervisor};

/// Adapter for the NPU engine. Unlike the CPU/GPU engine it manages its own
/// acquisition via a `pull` subcommand rather than going through
/// [`crate::artifact::ArtifactFetcher`], and substitutes the checkpoint id
/// in place of the gateway-facing model name when talking to the engine.
pub struct NpuAdapter {
    client: reqwest::Client,
}

impl NpuAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendAdapter for NpuAdapter {
    fn name(&self) -> &'static str {
        "npu"
    }

    async fn ensure_installed(&self, config: &EngineConfig) -> Result<(), AdapterError> {
        super::install::ensure_installed_generic(&self.client, config, "npu-engine").await
    }

    fn model_required_artifacts(
        &self,
        _checkpoint: &str,
        _mmproj: Option<&str>,
    ) -> Vec<RequiredArtifact> {
        // The NPU engine fetches weights itself via its own `pull`
        // subcommand; the gateway does not stage artifacts for it.
        Vec::new()
    }

    fn requires_artifact_store(&self) -> bool {
        false
    }

    async fn start(
        &self,
        spec: &StartSpec,
        config: &EngineConfig,
    ) -> Result<ProcessHandle, AdapterError> {
        let binary = config.install_dir.join("npu-engine");
        let args = vec![
            "serve".to_string(),
            "--checkpoint".to_string(),
            spec.checkpoint.clone(),
            "--port".to_string(),
            spec.port.to_string(),
        ];

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
        checkpoint: &str,
        body: &Value,
        port: u16,
    ) -> (String, Value) {
        let url = format!("{}/v1/{}", self.base_url(port), endpoint);
        let mut out = body.clone();
        if let Some(obj) = out.as_object_mut() {
            // The NPU engine dialect expects the upstream checkpoint id in
            // the `model` field, not the gateway-facing name.
            obj.insert("model".to_string(), json!(checkpoint));
            let max_tokens = obj
                .remove("max_completion_tokens")
                .or_else(|| obj.remove("max_tokens"));
            if let Some(v) = max_tokens {
                obj.insert("max_new_tokens".to_string(), v);
            }
        }
        (url, out)
    }
}
