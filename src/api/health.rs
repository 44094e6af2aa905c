//! `GET /health` handler

use super::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: Option<String>,
    pub checkpoint_loaded: Option<String>,
    pub all_models_loaded: Vec<LoadedModel>,
}

#[derive(Debug, Serialize)]
pub struct LoadedModel {
    pub model_name: String,
}

/// spec.md §4.1: missing model reports as `null`, never an empty string.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.router.current_model().await;
    let checkpoint_loaded = match &model_loaded {
        Some(name) => state.registry.get(name).map(|d| d.checkpoint),
        None => None,
    };
    let all_models_loaded = model_loaded
        .iter()
        .map(|name| LoadedModel {
            model_name: name.clone(),
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        model_loaded,
        checkpoint_loaded,
        all_models_loaded,
    })
}
