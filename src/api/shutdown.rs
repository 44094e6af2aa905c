//! `POST /internal/shutdown` handler
//!
//! Not part of the public `/api/v0`/`/api/v1` surface — called by the CLI's
//! `stop` subcommand. Unloads the backend (so live streams observe the
//! cancellation token and terminate cleanly per spec.md §5) then signals the
//! server's accept loop to stop. `shutdown_requested` is documented as not
//! an error (spec.md §7): this always answers 200.

use super::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: &'static str,
}

pub async fn handle(State(state): State<Arc<AppState>>) -> Json<ShutdownResponse> {
    if let Err(e) = state.router.unload().await {
        tracing::warn!(error = %e, "unload during shutdown reported an error");
    }
    state.shutdown.cancel();
    Json(ShutdownResponse {
        status: "shutdown_requested",
    })
}
