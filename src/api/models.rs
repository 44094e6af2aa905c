//! `GET /models` and `GET /models/{id}` handlers

use super::AppState;
use crate::api::types::ApiError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelObject {
    pub id: String,
    pub object: &'static str,
    pub recipe: String,
    pub checkpoint: String,
    pub labels: Vec<String>,
    pub downloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prompt_length: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelObject>,
}

fn to_object(state: &AppState, descriptor: &crate::registry::ModelDescriptor) -> ModelObject {
    ModelObject {
        id: descriptor.name.clone(),
        object: "model",
        recipe: descriptor.recipe.clone(),
        checkpoint: descriptor.checkpoint.clone(),
        labels: descriptor.labels.iter().cloned().collect(),
        downloaded: state.artifact_store.is_downloaded(&descriptor.checkpoint),
        max_prompt_length: descriptor.max_prompt_length,
    }
}

/// `GET /models[?show_all=true]`. Defaults to downloaded-only for OpenAI
/// client compatibility (spec.md §4.1); `show_all=true` lists the full
/// catalog with a `downloaded` flag per entry.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<ModelsResponse> {
    let data = state
        .registry
        .list()
        .iter()
        .map(|d| to_object(&state, d))
        .filter(|m| query.show_all || m.downloaded)
        .collect();

    Json(ModelsResponse {
        object: "list",
        data,
    })
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelObject>, ApiError> {
    let descriptor = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::model_not_found(&id))?;
    Ok(Json(to_object(&state, &descriptor)))
}
