//! Access logging and the bounded concurrent-request gate
//!
//! Grounded in the teacher's `logging::middleware::generate_request_id`
//! (reused here as the correlation id attached to each access-log line) and
//! [`crate::config::server::ServerConfig::max_concurrent_requests`]'s own
//! doc comment, which already names the semaphore-gate design this module
//! implements.

use super::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;

/// Bounds the number of requests handled concurrently to
/// `config.server.max_concurrent_requests`. Acquired before the handler
/// runs and released (via the guard's `Drop`) once the response is built,
/// so a burst of requests queues here rather than piling onto every backend
/// connection at once.
pub async fn concurrency_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let _permit = state
        .request_semaphore
        .acquire()
        .await
        .expect("request semaphore is never closed");
    next.run(request).await
}

/// Logs method, path, status, and elapsed time for every request, tagged
/// with a per-request correlation id. Also stamps the request with a
/// per-request [`CancellationToken`], a child of the process-wide shutdown
/// token, so a streaming handler can tell a client disconnect (which only
/// cancels this child) apart from a full server shutdown (which cancels
/// every request's token at once).
pub async fn access_log(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = crate::logging::generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    request
        .extensions_mut()
        .insert(state.shutdown.child_token());

    let response = next.run(request).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    response
}
