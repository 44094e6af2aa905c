//! `POST /pull` handler
//!
//! Grounded in the teacher's SSE-producing handlers in `api::completions`
//! (`async_stream::stream!` driving a channel), repurposed here to surface
//! [`crate::artifact::ArtifactFetcher`] download progress instead of token
//! deltas. spec.md §6's wire schema: `event: progress` / `event: complete`
//! events, `event: error` on failure.

use super::AppState;
use crate::api::types::ApiError;
use crate::registry::ModelDescriptor;
use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub model_name: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub mmproj: Option<String>,
}

/// Resolve the descriptor named by a pull request, registering a new
/// `user.`-prefixed entry first if it names one absent from the registry
/// (spec.md §4.1).
fn resolve_descriptor(state: &AppState, req: &PullRequest) -> Result<ModelDescriptor, ApiError> {
    if let Some(existing) = state.registry.get(&req.model_name) {
        return Ok(existing);
    }

    let checkpoint = req
        .checkpoint
        .clone()
        .ok_or_else(|| ApiError::model_not_found(&req.model_name))?;

    if !req.model_name.starts_with("user.") {
        return Err(ApiError::bad_request(format!(
            "'{}' is not registered and is not a user.-prefixed name",
            req.model_name
        )));
    }

    let descriptor = ModelDescriptor {
        name: req.model_name.clone(),
        checkpoint,
        recipe: req.recipe.clone().unwrap_or_else(|| "llamabox".to_string()),
        labels: req.labels.iter().cloned().collect::<BTreeSet<_>>(),
        mmproj: req.mmproj.clone(),
        max_prompt_length: None,
        size_estimate: None,
    };
    state
        .registry
        .register_user(descriptor.clone())
        .map_err(|e| ApiError::conflict(e.to_string()))?;
    Ok(descriptor)
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PullRequest>,
) -> Result<Response, ApiError> {
    let descriptor = resolve_descriptor(&state, &body)?;

    if !body.stream {
        state
            .router
            .pull(&descriptor, None)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        return Ok(Json(json!({"status": "success", "model_name": descriptor.name})).into_response());
    }

    let required = state
        .router
        .required_files(&descriptor)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let total_files = required.len();
    let index_of: HashMap<String, usize> = required
        .iter()
        .enumerate()
        .map(|(i, f)| (f.path_in_repo.clone(), i))
        .collect();

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let router = state.router.clone();
    let model_name = descriptor.name.clone();
    let download = tokio::spawn(async move { router.pull(&descriptor, Some(tx)).await });

    let sse_stream = stream! {
        while let Some(event) = rx.recv().await {
            use crate::artifact::ProgressEvent;
            let (file, bytes_downloaded, bytes_total) = match event {
                ProgressEvent::Started { file, total_bytes } => (file, 0, total_bytes),
                ProgressEvent::Resumed { file, resume_from } => (file, resume_from, None),
                ProgressEvent::Progress { file, bytes_downloaded, total_bytes } => {
                    (file, bytes_downloaded, total_bytes)
                }
                ProgressEvent::FileComplete { file } => (file, 0, None),
            };
            let file_index = index_of.get(&file).copied().unwrap_or(0);
            let percent = match bytes_total {
                Some(total) if total > 0 => (bytes_downloaded as f64 / total as f64) * 100.0,
                _ => 0.0,
            };
            yield Ok::<_, Infallible>(
                Event::default().event("progress").data(
                    json!({
                        "file": file,
                        "file_index": file_index,
                        "total_files": total_files,
                        "bytes_downloaded": bytes_downloaded,
                        "bytes_total": bytes_total,
                        "percent": percent,
                    })
                    .to_string(),
                ),
            );
        }

        match download.await {
            Ok(Ok(())) => {
                yield Ok(Event::default().event("complete").data(
                    json!({"model_name": model_name}).to_string(),
                ));
            }
            Ok(Err(e)) => {
                yield Ok(Event::default().event("error").data(
                    json!({"message": e.to_string()}).to_string(),
                ));
            }
            Err(e) => {
                yield Ok(Event::default().event("error").data(
                    json!({"message": e.to_string()}).to_string(),
                ));
            }
        }
    };

    Ok(Sse::new(sse_stream).into_response())
}
