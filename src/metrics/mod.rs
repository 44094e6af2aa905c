//! Metrics collection
//!
//! Exposes `GET /metrics` (Prometheus text format) and `GET /api/v1/stats`
//! (JSON). Grounded in the teacher's `metrics::MetricsCollector`, with gauges
//! generalized from "fleet of backends" to "the one backend session this
//! gateway may have loaded", and counters/histograms renamed from
//! `nexus_*` to `gatehouse_*`.
//!
//! **Counters:** `gatehouse_requests_total{model,status}`,
//! `gatehouse_errors_total{error_type,model}`.
//! **Histograms:** `gatehouse_request_duration_seconds{model}`,
//! `gatehouse_tokens_total{model,type}`.
//! **Gauges:** `gatehouse_model_loaded`, `gatehouse_download_bytes_total`.

use dashmap::DashMap;
use std::time::Instant;

/// Central coordinator for metrics collection and gauge computation.
pub struct MetricsCollector {
    start_time: Instant,
    label_cache: DashMap<String, String>,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            start_time,
            label_cache: DashMap::new(),
            prometheus_handle,
        }
    }

    /// Get sanitized Prometheus label (cached for performance).
    ///
    /// Prometheus label names must match `[a-zA-Z_][a-zA-Z0-9_]*`; this
    /// replaces invalid characters with underscores.
    pub fn sanitize_label(&self, label: &str) -> String {
        if let Some(cached) = self.label_cache.get(label) {
            return cached.clone();
        }

        let mut sanitized = label
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect::<String>();

        if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            sanitized.insert(0, '_');
        }

        self.label_cache.insert(label.to_string(), sanitized.clone());
        sanitized
    }

    /// Update the "is a model loaded" gauge from the router's current state.
    pub fn set_model_loaded(&self, loaded: bool) {
        metrics::gauge!("gatehouse_model_loaded").set(if loaded { 1.0 } else { 0.0 });
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Initialize the Prometheus exporter with buckets tuned for LLM inference
/// latency (seconds, not milliseconds) and token counts.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let duration_buckets = &[
        0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
    ];
    let token_buckets = &[
        10.0, 50.0, 100.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 32000.0, 64000.0,
        128000.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gatehouse_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("gatehouse_tokens_total".to_string()),
            token_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, Once};

    static INIT: Once = Once::new();
    static TEST_HANDLE: Mutex<Option<metrics_exporter_prometheus::PrometheusHandle>> =
        Mutex::new(None);

    fn get_test_handle() -> metrics_exporter_prometheus::PrometheusHandle {
        INIT.call_once(|| {
            let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            *TEST_HANDLE.lock().unwrap() = Some(handle);
            metrics::set_global_recorder(Box::new(recorder)).ok();
        });
        TEST_HANDLE.lock().unwrap().as_ref().unwrap().clone()
    }

    #[test]
    fn test_metrics_collector_construction() {
        let handle = get_test_handle();
        let collector = MetricsCollector::new(Instant::now(), handle);
        assert!(collector.uptime_seconds() < 1);
    }

    #[test]
    fn test_label_sanitization_special_chars() {
        let handle = get_test_handle();
        let collector = MetricsCollector::new(Instant::now(), handle);
        assert_eq!(
            collector.sanitize_label("ollama-local:11434"),
            "ollama_local_11434"
        );
        assert_eq!(collector.sanitize_label("model/gpt-4"), "model_gpt_4");
    }

    #[test]
    fn test_label_sanitization_leading_digit() {
        let handle = get_test_handle();
        let collector = MetricsCollector::new(Instant::now(), handle);
        assert_eq!(collector.sanitize_label("4o"), "_4o");
    }

    #[test]
    fn test_label_sanitization_caching() {
        let handle = get_test_handle();
        let collector = MetricsCollector::new(Instant::now(), handle);
        let first = collector.sanitize_label("test-label");
        let second = collector.sanitize_label("test-label");
        assert_eq!(first, second);
        assert_eq!(first, "test_label");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_sanitized_label_is_valid_prometheus(input in "[\\x00-\\x7F]{1,50}") {
                let handle = get_test_handle();
                let collector = MetricsCollector::new(Instant::now(), handle);
                let sanitized = collector.sanitize_label(&input);

                prop_assert!(!sanitized.is_empty());
                let first = sanitized.chars().next().unwrap();
                prop_assert!(first.is_ascii_alphabetic() || first == '_');
                for c in sanitized.chars() {
                    prop_assert!(c.is_alphanumeric() || c == '_');
                }
            }

            #[test]
            fn prop_sanitize_is_idempotent(input in "[a-zA-Z0-9_:\\-\\./@]{1,30}") {
                let handle = get_test_handle();
                let collector = MetricsCollector::new(Instant::now(), handle);
                let once = collector.sanitize_label(&input);
                let twice = collector.sanitize_label(&once);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
