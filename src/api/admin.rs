//! `GET /stats`, `GET /system-info`, `POST /params`, `POST /log-level`
//!
//! No direct teacher counterpart (the teacher exposes `/metrics` only);
//! grounded in the teacher's `AppState`-threaded handler shape and in this
//! gateway's own [`crate::telemetry::TelemetryRecord`]/[`super::RuntimeParams`].

use super::{AppState, RuntimeParams};
use crate::api::types::ApiError;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// `GET /api/v1/stats`: the last completed request's telemetry, or an empty
/// object if no request has completed yet.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.router.last_telemetry().await {
        Some(record) => Json(serde_json::to_value(record).unwrap_or_else(|_| json!({}))),
        None => Json(json!({})),
    }
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub version: &'static str,
    pub port: u16,
    pub uptime_seconds: u64,
}

pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<SystemInfo> {
    Json(SystemInfo {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        version: env!("CARGO_PKG_VERSION"),
        port: state.config.server.port,
        uptime_seconds: state.metrics.uptime_seconds(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ParamsPatch {
    #[serde(default)]
    pub max_concurrent_requests: Option<u32>,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

/// `POST /api/v1/params`: mutate the in-memory runtime parameters. Fields
/// omitted from the body are left unchanged.
pub async fn params(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ParamsPatch>,
) -> Result<Json<RuntimeParams>, ApiError> {
    let mut guard = state
        .runtime_params
        .write()
        .map_err(|_| ApiError::internal("runtime params lock poisoned"))?;
    if let Some(v) = patch.max_concurrent_requests {
        if v == 0 {
            return Err(ApiError::bad_request("max_concurrent_requests must be non-zero"));
        }
        guard.max_concurrent_requests = v;
    }
    if let Some(v) = patch.request_timeout_seconds {
        guard.request_timeout_seconds = v;
    }
    Ok(Json(guard.clone()))
}

#[derive(Debug, Deserialize)]
pub struct LogLevelRequest {
    pub level: String,
}

#[derive(Debug, Serialize)]
pub struct LogLevelResponse {
    pub level: String,
}

const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// `POST /api/v1/log-level`: mutate the in-memory log level and persist it
/// to `<cache_root>/log_level` so the next `serve` picks it up without
/// needing the original invocation's `--log-level` flag repeated.
pub async fn log_level(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogLevelRequest>,
) -> Result<Json<LogLevelResponse>, ApiError> {
    let level = body.level.to_lowercase();
    if !VALID_LEVELS.contains(&level.as_str()) {
        return Err(ApiError::bad_request(format!(
            "unknown log level '{}', expected one of {:?}",
            level, VALID_LEVELS
        )));
    }

    {
        let mut guard = state
            .log_level
            .lock()
            .map_err(|_| ApiError::internal("log level lock poisoned"))?;
        *guard = level.clone();
    }

    let persisted = state.artifact_store.cache_root().join("log_level");
    if let Err(e) = std::fs::write(&persisted, &level) {
        tracing::warn!(error = %e, path = %persisted.display(), "failed to persist log level");
    }

    Ok(Json(LogLevelResponse { level }))
}
