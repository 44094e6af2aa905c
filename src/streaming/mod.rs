//! Streaming proxy
//!
//! Forwards an upstream backend's SSE response to the client byte-for-byte
//! as it arrives, while tee-ing a bounded tail into a ring buffer for
//! [`crate::telemetry::TelemetryExtractor`]. Grounded in the teacher's
//! `api::completions::create_sse_stream` (`async_stream::stream!` driving a
//! `reqwest::Response::bytes_stream()`), generalized to forward `event:`
//! lines as well as `data:` lines and to respect a
//! [`tokio_util::sync::CancellationToken`] between chunks.

use async_stream::stream;
use axum::response::sse::Event;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;

const TELEMETRY_TAIL_CAP: usize = 128 * 1024;

pub struct StreamingProxy;

/// Cancels its token when dropped. Lives inside the proxy's generator state
/// so that if the response body is abandoned mid-stream (the client
/// disconnected and hyper simply stops polling and drops it), the
/// per-request token the body was handed gets marked cancelled the same as
/// if the proxy had noticed and exited its own select loop.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl StreamingProxy {
    /// Turn an upstream `reqwest::Response` into a stream of SSE events
    /// suitable for `axum::response::sse::Sse`. `on_complete` receives the
    /// tee'd tail (up to 128 KiB) once the stream finishes or is cancelled,
    /// for telemetry extraction; it is never allowed to fail the request.
    pub fn proxy(
        response: reqwest::Response,
        cancel: CancellationToken,
        on_complete: impl FnOnce(Vec<u8>) + Send + 'static,
    ) -> impl futures_util::Stream<Item = Result<Event, Infallible>> {
        stream! {
            let _cancel_on_drop = CancelOnDrop(cancel.clone());
            let mut upstream = response.bytes_stream();
            let mut buffer = String::new();
            let mut tail: VecDeque<u8> = VecDeque::with_capacity(TELEMETRY_TAIL_CAP);
            let mut pending_event: Option<String> = None;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("streaming proxy cancelled by client disconnect");
                        break;
                    }
                    chunk = upstream.next() => {
                        let Some(chunk) = chunk else { break };
                        let Ok(bytes) = chunk else { break };

                        for &b in bytes.iter() {
                            if tail.len() == TELEMETRY_TAIL_CAP {
                                tail.pop_front();
                            }
                            tail.push_back(b);
                        }

                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim_end_matches('\r').to_string();
                            buffer.drain(..=pos);

                            if line.is_empty() {
                                pending_event = None;
                                continue;
                            }

                            if let Some(event_name) = line.strip_prefix("event: ") {
                                pending_event = Some(event_name.to_string());
                                continue;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if data.trim() == "[DONE]" {
                                    yield Ok(Event::default().data("[DONE]"));
                                    pending_event = None;
                                    continue;
                                }
                                let mut event = Event::default().data(data);
                                if let Some(name) = pending_event.take() {
                                    event = event.event(name);
                                }
                                yield Ok(event);
                            }
                        }
                    }
                }
            }

            let tail_bytes: Vec<u8> = tail.into_iter().collect();
            on_complete(tail_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_tail_cap_is_128_kib() {
        assert_eq!(TELEMETRY_TAIL_CAP, 131072);
    }
}
