//! HTTP front-end integration tests: health, load/unload, model listing,
//! and the request-validation error table.

mod common;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn health_reports_no_model_loaded_initially() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert!(body["model_loaded"].is_null());

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn load_then_health_reports_the_loaded_model() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/load"))
        .json(&serde_json::json!({"model_name": "llamabox-model"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let health: serde_json::Value = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], "llamabox-model");

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn loading_unregistered_model_is_404() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/load"))
        .json(&serde_json::json!({"model_name": "does-not-exist"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn switching_the_loaded_model_unloads_the_previous_one() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    for name in ["llamabox-model", "npu-model"] {
        let resp = client
            .post(format!("http://{addr}/api/v1/load"))
            .json(&serde_json::json!({"model_name": name}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let health: serde_json::Value = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], "npu-model");

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn conflicting_max_tokens_fields_are_rejected_with_400() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/api/v1/load"))
        .json(&serde_json::json!({"model_name": "llamabox-model"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("http://{addr}/api/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "llamabox-model",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 10,
            "max_completion_tokens": 20,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn chat_completions_auto_loads_the_named_model_and_forwards_the_request() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}],
        })))
        .mount(&mock)
        .await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    // No explicit /load call: naming the model in the request body alone
    // must bring it up before the request is forwarded.
    let resp = client
        .post(format!("http://{addr}/api/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "llamabox-model",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "chatcmpl-1");

    let health: serde_json::Value = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], "llamabox-model");

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn unknown_route_is_404_with_a_json_body() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;

    let resp = reqwest::get(format!("http://{addr}/api/v1/no-such-route")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "not_found");

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn unload_is_idempotent_even_when_nothing_is_loaded() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client
            .post(format!("http://{addr}/api/v1/unload"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    harness.shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn metrics_endpoint_is_prometheus_text() {
    let mock = MockServer::start().await;
    let harness = common::harness(&mock).await;
    let (addr, handle) = common::spawn_server(harness.router.clone(), harness.shutdown.clone()).await;

    let resp = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(resp.status(), 200);

    harness.shutdown.cancel();
    handle.await.unwrap();
}
