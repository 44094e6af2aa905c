//! Telemetry extraction
//!
//! `BackendAdapter` implementations emit streaming responses in their own
//! dialect (`timings` objects for the CPU/GPU engine, `usage` objects for the
//! NPU engine). [`TelemetryExtractor`] normalizes whichever dialect a session
//! is running into a single [`TelemetryRecord`], mirroring the dispatch shape
//! the teacher crate used for per-backend-type health response parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::AdapterKind;

/// A single request's performance telemetry, extracted from the tail of an
/// SSE stream. Produced at most once per request; never blocks or fails the
/// request it describes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub ttft_seconds: Option<f64>,
    pub decode_tps: Option<f64>,
    pub decode_token_times: Vec<f64>,
    pub finish_reason: Option<String>,
}

/// Normalizes adapter-specific streaming JSON into a [`TelemetryRecord`].
pub struct TelemetryExtractor;

impl TelemetryExtractor {
    /// Parse the raw bytes tee'd off an SSE stream into a record. Returns
    /// `None` (logging a warning) rather than propagating a parse error —
    /// telemetry is best-effort and never fails the request it describes.
    pub fn extract(kind: AdapterKind, tail: &[u8]) -> Option<TelemetryRecord> {
        let text = std::str::from_utf8(tail).ok()?;
        let mut record: Option<TelemetryRecord> = None;

        for line in text.lines().rev() {
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload.trim() == "[DONE]" {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(payload) else {
                continue;
            };
            let parsed = match kind {
                AdapterKind::LlamaBox => Self::from_llamabox_chunk(&value),
                AdapterKind::Npu => Self::from_npu_chunk(&value),
            };
            if parsed.is_some() {
                record = parsed;
                break;
            }
        }

        if record.is_none() {
            tracing::warn!(adapter = ?kind, "no telemetry fields found in stream tail");
        }
        record
    }

    /// Parse a `ChatCompletionChunk: <json>` debug line some engines (the
    /// NPU engine) print to stdout alongside their HTTP responses, for
    /// telemetry that never appears in the SSE stream itself.
    pub fn from_stdout_debug_line(line: &str) -> Option<TelemetryRecord> {
        let payload = line.strip_prefix("ChatCompletionChunk: ")?;
        let value: Value = serde_json::from_str(payload.trim()).ok()?;
        Self::from_npu_chunk(&value).or_else(|| Self::from_llamabox_chunk(&value))
    }

    fn from_llamabox_chunk(value: &Value) -> Option<TelemetryRecord> {
        let timings = value.get("timings")?;
        Some(TelemetryRecord {
            input_tokens: timings
                .get("prompt_n")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32,
            output_tokens: timings
                .get("predicted_n")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32,
            ttft_seconds: timings
                .get("prompt_ms")
                .and_then(Value::as_f64)
                .map(|ms| ms / 1000.0),
            decode_tps: timings.get("predicted_per_second").and_then(Value::as_f64),
            decode_token_times: Vec::new(),
            finish_reason: value
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("finish_reason"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn from_npu_chunk(value: &Value) -> Option<TelemetryRecord> {
        let usage = value.get("usage")?;
        Some(TelemetryRecord {
            input_tokens: usage
                .get("prompt_tokens")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32,
            output_tokens: usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32,
            ttft_seconds: usage.get("prefill_duration_ttft").and_then(Value::as_f64),
            decode_tps: usage.get("decoding_speed_tps").and_then(Value::as_f64),
            decode_token_times: Vec::new(),
            finish_reason: value
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("finish_reason"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_llamabox_timings() {
        let tail = b"data: {\"timings\":{\"prompt_n\":10,\"predicted_n\":20,\"prompt_ms\":50.0,\"predicted_per_second\":33.3},\"choices\":[{\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n";
        let record = TelemetryExtractor::extract(AdapterKind::LlamaBox, tail).unwrap();
        assert_eq!(record.input_tokens, 10);
        assert_eq!(record.output_tokens, 20);
        assert_eq!(record.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn extracts_npu_usage() {
        let tail = b"data: {\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":7,\"prefill_duration_ttft\":0.2,\"decoding_speed_tps\":12.0}}\n\n";
        let record = TelemetryExtractor::extract(AdapterKind::Npu, tail).unwrap();
        assert_eq!(record.input_tokens, 5);
        assert_eq!(record.output_tokens, 7);
        assert_eq!(record.decode_tps, Some(12.0));
    }

    #[test]
    fn returns_none_on_garbage() {
        assert!(TelemetryExtractor::extract(AdapterKind::LlamaBox, b"not sse at all").is_none());
    }
}
