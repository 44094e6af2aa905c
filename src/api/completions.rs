//! `POST /chat/completions`, `/completions`, `/embeddings`, `/rerank` handlers
//!
//! Grounded in the teacher's `api::completions::{handle,handle_streaming,
//! create_sse_stream}`: one entry point per shape (blocking JSON vs SSE),
//! metrics recorded once per request, telemetry pulled off the tail of the
//! stream. The teacher's multi-backend fallback/retry loop has no
//! counterpart here — there is exactly one backend to address, so a failure
//! there is simply returned to the caller.

use super::AppState;
use crate::api::types::ApiError;
use crate::telemetry::TelemetryExtractor;
use axum::{
    extract::{Extension, State},
    response::sse::Sse,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

async fn ensure_loaded(state: &AppState, model_name: &str) -> Result<(), ApiError> {
    if state.router.current_model().await.as_deref() == Some(model_name) {
        return Ok(());
    }
    let descriptor = state
        .registry
        .get(model_name)
        .ok_or_else(|| ApiError::model_not_found(model_name))?;
    state
        .router
        .load(&descriptor)
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?;
    state.metrics.set_model_loaded(true);
    Ok(())
}

/// Shared plumbing for all four forwarded endpoints: validate the body names
/// a registered model, auto-switch the loaded backend if it names a
/// different one, translate into the adapter's dialect, and dispatch as
/// streaming or blocking depending on the request's `stream` field.
///
/// `cancel` is this request's token (a child of the process shutdown token,
/// stamped on by `middleware::access_log`): cancelled either by a full
/// server shutdown or by the streaming proxy noticing the client went away.
async fn dispatch(
    state: Arc<AppState>,
    cancel: CancellationToken,
    endpoint: &'static str,
    body: Value,
) -> Result<Response, ApiError> {
    let model_name = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("request body must name a \"model\""))?
        .to_string();
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    if body.get("max_tokens").is_some() && body.get("max_completion_tokens").is_some() {
        return Err(ApiError::bad_request(
            "max_tokens and max_completion_tokens are mutually exclusive",
        ));
    }

    ensure_loaded(&state, &model_name).await?;

    let (url, translated) = state
        .router
        .translate(&model_name, endpoint, &body)
        .await
        .ok_or_else(|| ApiError::unavailable("model was unloaded before the request reached it"))?;

    let started = Instant::now();
    let adapter_kind = state
        .router
        .adapter_kind_for(&model_name)
        .await
        .ok_or_else(|| ApiError::unavailable("model was unloaded before the request reached it"))?;

    let upstream = state
        .http_client
        .post(&url)
        .json(&translated)
        .send()
        .await
        .map_err(|e| ApiError::backend_crashed(e.to_string()))?;

    if !upstream.status().is_success() {
        let status = upstream.status();
        let text = upstream.text().await.unwrap_or_default();
        metrics::counter!("gatehouse_errors_total", "error_type" => "backend", "model" => model_name.clone()).increment(1);
        return Err(if status.as_u16() == 503 {
            ApiError::unavailable(text)
        } else {
            ApiError::backend_crashed(text)
        });
    }

    metrics::counter!("gatehouse_requests_total", "model" => model_name.clone(), "status" => "ok").increment(1);

    if stream {
        let router = state.router.clone();
        let model_for_telemetry = model_name.clone();
        let elapsed_metric_model = model_name.clone();
        let sse = Sse::new(crate::streaming::StreamingProxy::proxy(
            upstream,
            cancel,
            move |tail| {
                metrics::histogram!("gatehouse_request_duration_seconds", "model" => elapsed_metric_model)
                    .record(started.elapsed().as_secs_f64());
                if let Some(record) = TelemetryExtractor::extract(adapter_kind, &tail) {
                    tokio::spawn(async move {
                        router.record_telemetry(&model_for_telemetry, record).await;
                    });
                }
            },
        ));
        Ok(sse.into_response())
    } else {
        let body: Value = upstream
            .json()
            .await
            .map_err(|e| ApiError::backend_crashed(e.to_string()))?;
        metrics::histogram!("gatehouse_request_duration_seconds", "model" => model_name.clone())
            .record(started.elapsed().as_secs_f64());
        if let Some(record) =
            TelemetryExtractor::extract(adapter_kind, body.to_string().as_bytes())
        {
            state.router.record_telemetry(&model_name, record).await;
        }
        Ok(Json(body).into_response())
    }
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    dispatch(state, cancel, "chat/completions", body).await
}

pub async fn completions(
    State(state): State<Arc<AppState>>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    dispatch(state, cancel, "completions", body).await
}

pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    dispatch(state, cancel, "embeddings", body).await
}

pub async fn rerank(
    State(state): State<Arc<AppState>>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    dispatch(state, cancel, "rerank", body).await
}
