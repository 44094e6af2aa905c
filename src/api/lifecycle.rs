//! `POST /load`, `/unload`, `/delete` handlers
//!
//! Grounded in the teacher's `api::lifecycle::{handle_load,handle_unload}`
//! status-code/response-shape conventions, with the teacher's VRAM-headroom
//! checks and multi-backend migration dropped entirely: there is never more
//! than one loaded session to migrate between here, so load/unload reduce to
//! direct calls into [`crate::router::Router`]'s own state machine.

use super::AppState;
use crate::api::types::ApiError;
use crate::router::RouterError;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub model_name: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

fn router_error_to_api(model_name: &str, err: RouterError) -> ApiError {
    match err {
        RouterError::ModelNotFound(name) => ApiError::model_not_found(&name),
        RouterError::NothingLoaded => ApiError::conflict("no model is currently loaded"),
        RouterError::Adapter(crate::adapter::AdapterError::UnknownRecipe(recipe)) => {
            ApiError::bad_request(format!("'{model_name}' has unsupported recipe '{recipe}'"))
        }
        RouterError::Adapter(crate::adapter::AdapterError::Crashed(msg)) => {
            ApiError::backend_crashed(msg)
        }
        RouterError::Adapter(e) => ApiError::unavailable(e.to_string()),
        RouterError::Supervisor(e) => ApiError::internal(e.to_string()),
        RouterError::Download(crate::artifact::DownloadError::OfflineCacheMiss(repo)) => {
            ApiError::offline_cache_miss(&repo)
        }
        RouterError::Download(e @ crate::artifact::DownloadError::TransientNetwork { .. }) => {
            ApiError::transient_network(e.to_string())
        }
        RouterError::Download(e) => ApiError::internal(e.to_string()),
    }
}

/// `POST /load`: auto-downloads missing artifacts, then starts the backend
/// for the named model, unloading whatever was previously loaded if it
/// differs. 404 if the model is not registered.
pub async fn load(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoadRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let descriptor = state
        .registry
        .get(&body.model_name)
        .ok_or_else(|| ApiError::model_not_found(&body.model_name))?;

    state
        .router
        .load(&descriptor)
        .await
        .map_err(|e| router_error_to_api(&body.model_name, e))?;

    state.metrics.set_model_loaded(true);
    Ok(Json(StatusResponse { status: "success" }))
}

/// `POST /unload`: idempotent, always `200 {"status":"success"}` even if
/// nothing is loaded — accepts a missing body or `Content-Type` entirely,
/// since a client checking "did unload succeed" shouldn't need to construct
/// one.
pub async fn unload(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> Json<StatusResponse> {
    let _ = body;
    if let Err(e) = state.router.unload().await {
        tracing::warn!(error = %e, "unload reported an error; reporting success regardless");
    }
    state.metrics.set_model_loaded(false);
    Json(StatusResponse { status: "success" })
}

/// `POST /delete`: removes a model's cached artifacts and, if it was a
/// user-registered model, its catalog entry. Shipped-catalog entries keep
/// their catalog row even after their artifacts are deleted.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let descriptor = state
        .registry
        .get(&body.model_name)
        .ok_or_else(|| ApiError::model_not_found(&body.model_name))?;

    if state.router.current_model().await.as_deref() == Some(body.model_name.as_str()) {
        state
            .router
            .unload()
            .await
            .map_err(|e| router_error_to_api(&body.model_name, e))?;
    }

    state
        .artifact_store
        .delete(&descriptor.checkpoint)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let _ = state.registry.unregister_user(&body.model_name);

    Ok(Json(StatusResponse { status: "success" }))
}
