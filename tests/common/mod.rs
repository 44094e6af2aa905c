//! Shared test utilities for integration tests.
//!
//! Provides a [`TestAdapter`] that satisfies [`gatehouse::adapter::BackendAdapter`]
//! with a real child process (so the router's `kill_tree`/`wait` machinery has
//! something genuine to operate on) while routing all HTTP traffic to a
//! [`wiremock::MockServer`] instead of a real llama-box/NPU binary.

#![allow(dead_code)]

use async_trait::async_trait;
use gatehouse::adapter::{AdapterError, AdapterKind, BackendAdapter, RequiredArtifact, StartSpec};
use gatehouse::api::{create_router, AppState};
use gatehouse::artifact::ArtifactStore;
use gatehouse::config::{EngineConfig, GatehouseConfig};
use gatehouse::metrics::MetricsCollector;
use gatehouse::registry::{ModelDescriptor, ModelRegistry};
use gatehouse::router::Router;
use gatehouse::supervisor::{ProcessHandle, ProcessSupervisor};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Once};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A `BackendAdapter` double: spawns a real, long-lived but otherwise inert
/// child process to stand in for the engine binary, and forwards every
/// request to a mock HTTP server instead of the process it just spawned.
pub struct TestAdapter {
    kind: &'static str,
    mock_base: String,
}

impl TestAdapter {
    pub fn new(kind: &'static str, mock_base: impl Into<String>) -> Self {
        Self {
            kind,
            mock_base: mock_base.into(),
        }
    }
}

#[async_trait]
impl BackendAdapter for TestAdapter {
    fn name(&self) -> &'static str {
        self.kind
    }

    async fn ensure_installed(&self, _config: &EngineConfig) -> Result<(), AdapterError> {
        Ok(())
    }

    fn model_required_artifacts(&self, _checkpoint: &str, _mmproj: Option<&str>) -> Vec<RequiredArtifact> {
        Vec::new()
    }

    fn requires_artifact_store(&self) -> bool {
        // This double stands in for both adapter kinds in router/API tests
        // that exercise the load/unload state machine, not artifact
        // staging — `router_with_real_llamabox` below covers that path with
        // the real adapter.
        false
    }

    async fn start(&self, spec: &StartSpec, _config: &EngineConfig) -> Result<ProcessHandle, AdapterError> {
        let mut handle = ProcessSupervisor::spawn("sleep", &["300".to_string()])?;
        handle.port = spec.port;
        Ok(handle)
    }

    async fn stop(&self, _handle: &ProcessHandle) -> Result<(), AdapterError> {
        Ok(())
    }

    fn translate_request(&self, endpoint: &str, _checkpoint: &str, body: &Value, _port: u16) -> (String, Value) {
        (format!("{}/{}", self.mock_base, endpoint), body.clone())
    }

    fn base_url(&self, _port: u16) -> String {
        self.mock_base.clone()
    }
}

fn descriptor(name: &str, recipe: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        checkpoint: format!("test-org/{name}"),
        recipe: recipe.to_string(),
        labels: BTreeSet::new(),
        mmproj: None,
        max_prompt_length: None,
        size_estimate: None,
    }
}

/// A shared `PrometheusHandle` for the test binary, installed once — each
/// `MetricsCollector` in the process must wrap the same global recorder.
fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    static INIT: Once = Once::new();
    static HANDLE: std::sync::Mutex<Option<metrics_exporter_prometheus::PrometheusHandle>> =
        std::sync::Mutex::new(None);

    INIT.call_once(|| {
        let handle = gatehouse::metrics::setup_metrics().expect("install test metrics recorder");
        *HANDLE.lock().unwrap() = Some(handle);
    });
    HANDLE.lock().unwrap().as_ref().unwrap().clone()
}

/// A fully wired `AppState` backed by a temp cache root, a registry
/// pre-loaded with `llamabox-model`/`npu-model` (both pointed at `mock_server`
/// through a [`TestAdapter`]), and a fresh `Router`.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub shutdown: CancellationToken,
    _cache_dir: tempfile::TempDir,
}

pub async fn harness(mock_server: &wiremock::MockServer) -> TestHarness {
    let cache_dir = tempfile::tempdir().unwrap();

    let registry = Arc::new(ModelRegistry::new(cache_dir.path().join("user_models.json")));
    registry
        .register_user(descriptor("llamabox-model", "llamabox"))
        .unwrap();
    registry
        .register_user(descriptor("npu-model", "npu"))
        .unwrap();

    let mut adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>> = HashMap::new();
    adapters.insert(
        AdapterKind::LlamaBox,
        Arc::new(TestAdapter::new("llamabox", mock_server.uri())),
    );
    adapters.insert(
        AdapterKind::Npu,
        Arc::new(TestAdapter::new("npu", mock_server.uri())),
    );

    let artifact_store = Arc::new(ArtifactStore::new(cache_dir.path()));
    let router = Arc::new(Router::new(
        adapters,
        artifact_store.clone(),
        EngineConfig::default(),
        None,
        false,
    ));

    let metrics = Arc::new(MetricsCollector::new(Instant::now(), metrics_handle()));
    let mut config = GatehouseConfig::default();
    config.cache.root = cache_dir.path().to_path_buf();
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState::new(
        registry,
        artifact_store,
        router,
        metrics,
        Arc::new(config),
        shutdown.clone(),
    ));

    TestHarness {
        router: create_router(state.clone()),
        state,
        shutdown,
        _cache_dir: cache_dir,
    }
}

/// A router wired with the real `LlamaBoxAdapter` (whose `start`/`ensure_installed`
/// this never exercises — only `Router::pull`'s artifact-resolution path runs),
/// pointed at `hub_base_url` in place of the public hub. For tests exercising
/// the artifact download path end to end.
pub fn router_with_real_llamabox(cache_root: &std::path::Path, hub_base_url: &str) -> (Arc<Router>, Arc<ArtifactStore>) {
    let mut adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>> = HashMap::new();
    adapters.insert(
        AdapterKind::LlamaBox,
        Arc::new(gatehouse::adapter::llamabox::LlamaBoxAdapter::new(reqwest::Client::new())),
    );
    let artifact_store = Arc::new(ArtifactStore::new(cache_root));
    let router = Arc::new(Router::with_hub_base_url(
        adapters,
        artifact_store.clone(),
        EngineConfig::default(),
        None,
        false,
        Some(hub_base_url.to_string()),
    ));
    (router, artifact_store)
}

/// A `llamabox`-recipe descriptor requiring one staged artifact (`model.gguf`).
pub fn downloadable_descriptor(name: &str, checkpoint: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        checkpoint: checkpoint.to_string(),
        recipe: "llamabox".to_string(),
        labels: BTreeSet::new(),
        mmproj: None,
        max_prompt_length: None,
        size_estimate: None,
    }
}

/// Bind an ephemeral port, serve `app` on it until `shutdown` is cancelled,
/// and return the address and a handle to await after cancelling.
pub async fn spawn_server(
    app: axum::Router,
    shutdown: CancellationToken,
) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });
    (addr, handle)
}
