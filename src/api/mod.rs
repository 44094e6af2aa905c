//! HTTP front end
//!
//! Grounded in the teacher's `api::mod` (`AppState`, `create_router`,
//! `RequestBodyLimitLayer`), generalized for this gateway's requirements:
//! every route is mounted under both `/api/v0` and `/api/v1` (spec.md §4.1),
//! permissive CORS is added (the teacher has no cross-origin browser client
//! to support), and `AppState` holds the single-backend [`crate::router::Router`]
//! plus [`crate::registry::ModelRegistry`]/[`crate::artifact::ArtifactStore`]
//! in place of the teacher's multi-backend `Registry`/`routing::Router`.

mod admin;
mod completions;
mod health;
mod lifecycle;
pub mod middleware;
mod models;
mod pull;
mod shutdown;
pub mod types;

pub use types::*;

use crate::config::GatehouseConfig;
use crate::metrics::MetricsCollector;
use crate::registry::ModelRegistry;
use crate::router::Router;
use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum request body size (10 MB), matching the teacher's bound — this
/// gateway's bodies (chat messages, pull requests) are smaller than the
/// model weights downloaded out-of-band by [`crate::artifact::ArtifactFetcher`].
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// The subset of configuration `POST /api/v1/params` is allowed to mutate
/// at runtime, held separately from [`GatehouseConfig`] since the latter is
/// shared read-only across the process.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeParams {
    pub max_concurrent_requests: u32,
    pub request_timeout_seconds: u64,
}

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub artifact_store: Arc<crate::artifact::ArtifactStore>,
    pub router: Arc<Router>,
    pub metrics: Arc<MetricsCollector>,
    pub http_client: reqwest::Client,
    pub start_time: Instant,
    pub config: Arc<GatehouseConfig>,
    /// In-memory log level, mutated by `POST /api/v1/log-level`. Persisted
    /// to `<cache_root>/log_level` so it survives a restart.
    pub log_level: Mutex<String>,
    /// Runtime-adjustable parameters, mutated by `POST /api/v1/params`.
    pub runtime_params: std::sync::RwLock<RuntimeParams>,
    /// Gates the number of requests handled concurrently. Sized once at
    /// startup from `config.server.max_concurrent_requests`; `POST /params`
    /// updates [`RuntimeParams`] for observability but does not resize this
    /// semaphore, so a change takes effect on the next restart.
    pub request_semaphore: Arc<Semaphore>,
    /// Cancelled on graceful shutdown; live SSE streams observe this to stop
    /// forwarding promptly (spec.md §4.6's explicit-shutdown-closes-streams
    /// contract).
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        artifact_store: Arc<crate::artifact::ArtifactStore>,
        router: Arc<Router>,
        metrics: Arc<MetricsCollector>,
        config: Arc<GatehouseConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.server.request_timeout_seconds,
            ))
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to build HTTP client");

        let log_level = Mutex::new(config.logging.level.clone());
        let runtime_params = std::sync::RwLock::new(RuntimeParams {
            max_concurrent_requests: config.server.max_concurrent_requests,
            request_timeout_seconds: config.server.request_timeout_seconds,
        });

        let request_semaphore = Arc::new(Semaphore::new(
            config.server.max_concurrent_requests as usize,
        ));

        Self {
            registry,
            artifact_store,
            router,
            metrics,
            http_client,
            start_time: Instant::now(),
            config,
            log_level,
            runtime_params,
            request_semaphore,
            shutdown,
        }
    }
}

/// Build the set of inference/model routes, reusable for both API prefixes.
fn mount() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/health", get(health::handle))
        .route("/models", get(models::list))
        .route("/models/:id", get(models::get_one))
        .route("/pull", post(pull::handle))
        .route("/load", post(lifecycle::load))
        .route("/unload", post(lifecycle::unload))
        .route("/delete", post(lifecycle::delete))
        .route(
            "/chat/completions",
            post(completions::chat_completions),
        )
        .route("/completions", post(completions::completions))
        .route("/embeddings", post(completions::embeddings))
        .route("/rerank", post(completions::rerank))
        .route("/stats", get(admin::stats))
        .route("/system-info", get(admin::system_info))
        .route("/params", post(admin::params))
        .route("/log-level", post(admin::log_level))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::debug!(%method, %uri, "no route matched");
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": {
                "message": format!("no such endpoint: {} {}", method, uri.path()),
                "type": "not_found",
                "path": uri.path(),
            }
        })),
    )
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render_metrics()
}

/// Build the full router: dual-prefixed API surface, `/internal/shutdown`,
/// and `/metrics` for Prometheus scraping.
pub fn create_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .nest("/api/v0", mount())
        .nest("/api/v1", mount())
        .route("/internal/shutdown", post(shutdown::handle))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_log,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::concurrency_limit,
        ))
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}
