//! Router
//!
//! Owns the single active [`BackendSession`] and serializes load/unload
//! against it. Grounded in the teacher's mutex-guarded shared-state pattern
//! (`routing::reconciler::budget`'s background-task-owned ledger) and its
//! `CancellationToken`-driven background task shape (`health::HealthChecker`),
//! but replaces the teacher's scored multi-backend-fleet selection entirely:
//! there is at most one [`BackendSession`] here, never a fleet to choose
//! among.

pub mod error;

pub use error::RouterError;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::adapter::{AdapterKind, BackendAdapter, StartSpec};
use crate::artifact::{ArtifactStore, DownloadOptions, FileSpec};
use crate::config::EngineConfig;
use crate::registry::ModelDescriptor;
use crate::supervisor::{ProcessHandle, ProcessSupervisor};
use crate::telemetry::TelemetryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Serving,
    Stopping,
    Stopped,
    Failed,
}

/// A running backend process bound to one loaded model.
pub struct BackendSession {
    pub adapter_kind: AdapterKind,
    pub model_name: String,
    pub checkpoint: String,
    pub variant_file: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
    pub health_state: HealthState,
    pub last_telemetry: Option<TelemetryRecord>,
    process: ProcessHandle,
}

enum RouterState {
    Unloaded,
    Loading(String),
    Loaded(BackendSession),
}

/// Serializes state transitions for the single active backend session.
pub struct Router {
    state: Mutex<RouterState>,
    notify: Notify,
    adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>>,
    artifact_store: Arc<ArtifactStore>,
    engine_config: EngineConfig,
    hf_token: Option<String>,
    offline: bool,
    hub_base_url: Option<String>,
}

impl Router {
    pub fn new(
        adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>>,
        artifact_store: Arc<ArtifactStore>,
        engine_config: EngineConfig,
        hf_token: Option<String>,
        offline: bool,
    ) -> Self {
        Self::with_hub_base_url(adapters, artifact_store, engine_config, hf_token, offline, None)
    }

    /// As [`Router::new`], but overriding the artifact hub's base URL —
    /// production code threads this from [`crate::config::CacheConfig::hub_base_url`],
    /// tests point it at a local mock server.
    pub fn with_hub_base_url(
        adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>>,
        artifact_store: Arc<ArtifactStore>,
        engine_config: EngineConfig,
        hf_token: Option<String>,
        offline: bool,
        hub_base_url: Option<String>,
    ) -> Self {
        Self {
            state: Mutex::new(RouterState::Unloaded),
            notify: Notify::new(),
            adapters,
            artifact_store,
            engine_config,
            hf_token,
            offline,
            hub_base_url,
        }
    }

    fn artifact_fetcher(&self) -> crate::artifact::ArtifactFetcher {
        let fetcher = crate::artifact::ArtifactFetcher::new(
            reqwest::Client::new(),
            self.artifact_store.cache_root(),
        );
        match &self.hub_base_url {
            Some(url) => fetcher.with_base_url(url.clone()),
            None => fetcher,
        }
    }

    /// Name of the model currently loaded, if any.
    pub async fn current_model(&self) -> Option<String> {
        match &*self.state.lock().await {
            RouterState::Loaded(session) => Some(session.model_name.clone()),
            _ => None,
        }
    }

    pub async fn port_for(&self, model_name: &str) -> Option<u16> {
        match &*self.state.lock().await {
            RouterState::Loaded(session) if session.model_name == model_name => {
                Some(session.port)
            }
            _ => None,
        }
    }

    pub async fn adapter_kind_for(&self, model_name: &str) -> Option<AdapterKind> {
        match &*self.state.lock().await {
            RouterState::Loaded(session) if session.model_name == model_name => {
                Some(session.adapter_kind)
            }
            _ => None,
        }
    }

    /// Record telemetry for the currently loaded session, if it still
    /// matches `model_name` (the session may have been unloaded mid-request).
    pub async fn record_telemetry(&self, model_name: &str, record: TelemetryRecord) {
        if let RouterState::Loaded(session) = &mut *self.state.lock().await {
            if session.model_name == model_name {
                session.last_telemetry = Some(record);
                session.health_state = HealthState::Ready;
            }
        }
    }

    /// The SSE-derived telemetry for the last completed request if there is
    /// one, otherwise whatever the session's process last printed to stdout
    /// as a `ChatCompletionChunk:` debug line (the NPU engine's only
    /// telemetry channel outside its HTTP responses).
    pub async fn last_telemetry(&self) -> Option<TelemetryRecord> {
        match &*self.state.lock().await {
            RouterState::Loaded(session) => session
                .last_telemetry
                .clone()
                .or_else(|| session.process.stdout_telemetry()),
            _ => None,
        }
    }

    /// Ensure `descriptor` is the loaded model, downloading artifacts and
    /// starting its backend process if it isn't already. Idempotent: calling
    /// load twice for the same model while it is loaded or loading is a
    /// no-op (a concurrent caller waits on the in-flight transition rather
    /// than racing a second process spawn).
    pub async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), RouterError> {
        loop {
            {
                let mut guard = self.state.lock().await;
                match &*guard {
                    RouterState::Loaded(session) if session.model_name == descriptor.name => {
                        return Ok(());
                    }
                    RouterState::Loading(name) if name == &descriptor.name => {
                        drop(guard);
                        self.notify.notified().await;
                        continue;
                    }
                    RouterState::Loading(_) => {
                        drop(guard);
                        self.notify.notified().await;
                        continue;
                    }
                    RouterState::Loaded(_) => {
                        // A different model is loaded; unload it first.
                        drop(guard);
                        self.unload().await?;
                        continue;
                    }
                    RouterState::Unloaded => {
                        *guard = RouterState::Loading(descriptor.name.clone());
                    }
                }
            }

            let result = self.load_inner(descriptor).await;
            let mut guard = self.state.lock().await;
            match result {
                Ok(session) => *guard = RouterState::Loaded(session),
                Err(e) => {
                    *guard = RouterState::Unloaded;
                    drop(guard);
                    self.notify.notify_waiters();
                    return Err(e);
                }
            }
            drop(guard);
            self.notify.notify_waiters();
            return Ok(());
        }
    }

    async fn load_inner(&self, descriptor: &ModelDescriptor) -> Result<BackendSession, RouterError> {
        let kind = descriptor
            .recipe
            .parse::<AdapterKind>()
            .map_err(RouterError::Adapter)?;
        let adapter = self
            .adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| RouterError::ModelNotFound(descriptor.name.clone()))?;

        adapter.ensure_installed(&self.engine_config).await?;

        let (variant_file, model_dir) = if adapter.requires_artifact_store() {
            let (repo_id, _variant) = crate::registry::split_checkpoint(&descriptor.checkpoint);
            let files = self.required_files(descriptor).await?;
            let variant_file = files
                .iter()
                .find(|f| crate::artifact::fetcher::is_weight_file(&f.path_in_repo))
                .or_else(|| files.first())
                .map(|f| f.path_in_repo.clone())
                .ok_or_else(|| {
                    RouterError::Adapter(crate::adapter::AdapterError::InstallFailed(format!(
                        "{} has no resolvable files in its repo tree",
                        descriptor.checkpoint
                    )))
                })?;

            let fetcher = self.artifact_fetcher();
            fetcher
                .fetch(
                    DownloadOptions {
                        repo_id: repo_id.to_string(),
                        revision: "main".to_string(),
                        files,
                        hf_token: self.hf_token.clone(),
                        offline: self.offline,
                    },
                    None,
                )
                .await?;

            let model_dir =
                crate::artifact::cache::snapshot_dir(self.artifact_store.cache_root(), repo_id, "main");
            (variant_file, model_dir)
        } else {
            (String::new(), self.artifact_store.cache_root().clone())
        };

        let port = ProcessSupervisor::find_free_port()?;

        let spec = StartSpec {
            model_name: descriptor.name.clone(),
            checkpoint: descriptor.checkpoint.clone(),
            variant_file,
            mmproj_file: descriptor.mmproj.clone(),
            model_dir,
            port,
        };

        let process = adapter.start(&spec, &self.engine_config).await?;

        Ok(BackendSession {
            adapter_kind: kind,
            model_name: descriptor.name.clone(),
            checkpoint: descriptor.checkpoint.clone(),
            variant_file: spec.variant_file,
            port,
            started_at: Utc::now(),
            health_state: HealthState::Ready,
            last_telemetry: None,
            process,
        })
    }

    /// Stop the currently loaded backend, if any. A no-op if nothing is
    /// loaded.
    pub async fn unload(&self) -> Result<(), RouterError> {
        let mut guard = self.state.lock().await;
        let session = match std::mem::replace(&mut *guard, RouterState::Unloaded) {
            RouterState::Loaded(session) => session,
            other => {
                *guard = other;
                return Ok(());
            }
        };
        drop(guard);

        let adapter = self
            .adapters
            .get(&session.adapter_kind)
            .cloned()
            .ok_or(RouterError::NothingLoaded)?;
        let mut process = session.process;
        adapter.stop(&process).await?;
        ProcessSupervisor::kill_tree(&mut process, std::time::Duration::from_secs(10)).await;

        self.notify.notify_waiters();
        Ok(())
    }

    pub async fn base_url_for(&self, model_name: &str) -> Option<String> {
        let guard = self.state.lock().await;
        match &*guard {
            RouterState::Loaded(session) if session.model_name == model_name => {
                self.adapters
                    .get(&session.adapter_kind)
                    .map(|a| a.base_url(session.port))
            }
            _ => None,
        }
    }

    /// Files the adapter for `descriptor`'s recipe needs staged on disk,
    /// resolved against the repo's real file listing (weight file(s)
    /// filtered by `descriptor.checkpoint`'s `:variant` suffix, known
    /// tokenizer/config sidecars, and any adapter-specific extras such as
    /// mmproj). Empty for adapters (the NPU engine) that acquire weights
    /// through their own mechanism instead of
    /// [`crate::artifact::ArtifactFetcher`].
    pub async fn required_files(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<Vec<FileSpec>, RouterError> {
        let kind = descriptor
            .recipe
            .parse::<AdapterKind>()
            .map_err(RouterError::Adapter)?;
        let adapter = self
            .adapters
            .get(&kind)
            .ok_or_else(|| RouterError::ModelNotFound(descriptor.name.clone()))?;
        if !adapter.requires_artifact_store() {
            return Ok(Vec::new());
        }

        let (repo_id, variant) = crate::registry::split_checkpoint(&descriptor.checkpoint);
        let extra = adapter.model_required_artifacts(&descriptor.checkpoint, descriptor.mmproj.as_deref());
        let fetcher = self.artifact_fetcher();
        Ok(fetcher.resolve_required_files(repo_id, "main", variant, &extra).await?)
    }

    /// Download `descriptor`'s required artifacts into the cache without
    /// starting a backend process, reporting progress on `progress_tx` if
    /// given. A no-op for adapters with no staged artifacts.
    pub async fn pull(
        &self,
        descriptor: &ModelDescriptor,
        progress_tx: Option<tokio::sync::mpsc::Sender<crate::artifact::ProgressEvent>>,
    ) -> Result<(), RouterError> {
        let files = self.required_files(descriptor).await?;
        if files.is_empty() {
            return Ok(());
        }

        let (repo_id, _variant) = crate::registry::split_checkpoint(&descriptor.checkpoint);
        let fetcher = self.artifact_fetcher();
        fetcher
            .fetch(
                DownloadOptions {
                    repo_id: repo_id.to_string(),
                    revision: "main".to_string(),
                    files,
                    hf_token: self.hf_token.clone(),
                    offline: self.offline,
                },
                progress_tx,
            )
            .await?;
        Ok(())
    }

    /// Translate `body` bound for `endpoint` using the currently loaded
    /// session's adapter, if `model_name` is still the loaded model.
    pub async fn translate(
        &self,
        model_name: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Option<(String, serde_json::Value)> {
        let guard = self.state.lock().await;
        match &*guard {
            RouterState::Loaded(session) if session.model_name == model_name => {
                self.adapters.get(&session.adapter_kind).map(|a| {
                    a.translate_request(endpoint, &session.checkpoint, body, session.port)
                })
            }
            _ => None,
        }
    }
}
