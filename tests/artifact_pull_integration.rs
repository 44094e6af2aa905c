//! End-to-end artifact download tests: pull reports progress, a pulled
//! model shows up as downloaded, and delete-then-pull reproduces the same
//! on-disk state.

mod common;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_BYTES: &[u8] = b"not-really-a-gguf-file-but-big-enough-to-matter";

async fn mount_model_file(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/.*/resolve/main/model\.gguf$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .mount(mock)
        .await;
}

/// Mounts the repo tree listing `resolve_required_files` consults to
/// discover `org/m1`'s real file name before downloading it.
async fn mount_tree(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/models/org/m1/tree/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"path": "model.gguf", "size": MODEL_BYTES.len(), "type": "file"},
        ])))
        .mount(mock)
        .await;
}

#[tokio::test]
async fn pull_then_is_downloaded_reports_true() {
    let mock = MockServer::start().await;
    mount_model_file(&mock).await;
    mount_tree(&mock).await;
    let dir = tempfile::tempdir().unwrap();
    let (router, store) = common::router_with_real_llamabox(dir.path(), &mock.uri());
    let descriptor = common::downloadable_descriptor("m1", "org/m1");

    assert!(!store.is_downloaded("org/m1"));
    router.pull(&descriptor, None).await.unwrap();
    assert!(store.is_downloaded("org/m1"));
}

#[tokio::test]
async fn pull_reports_progress_events_for_the_downloaded_file() {
    let mock = MockServer::start().await;
    mount_model_file(&mock).await;
    mount_tree(&mock).await;
    let dir = tempfile::tempdir().unwrap();
    let (router, _store) = common::router_with_real_llamabox(dir.path(), &mock.uri());
    let descriptor = common::downloadable_descriptor("m1", "org/m1");

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let pull = tokio::spawn(async move { router.pull(&descriptor, Some(tx)).await });

    let mut saw_started = false;
    let mut saw_complete = false;
    while let Some(event) = rx.recv().await {
        use gatehouse::artifact::ProgressEvent;
        match event {
            ProgressEvent::Started { file, .. } => {
                assert_eq!(file, "model.gguf");
                saw_started = true;
            }
            ProgressEvent::FileComplete { file } => {
                assert_eq!(file, "model.gguf");
                saw_complete = true;
            }
            _ => {}
        }
    }

    pull.await.unwrap().unwrap();
    assert!(saw_started, "expected a Started event");
    assert!(saw_complete, "expected a FileComplete event");
}

#[tokio::test]
async fn pull_delete_pull_reproduces_the_same_cache_state() {
    let mock = MockServer::start().await;
    mount_model_file(&mock).await;
    mount_tree(&mock).await;
    let dir = tempfile::tempdir().unwrap();
    let (router, store) = common::router_with_real_llamabox(dir.path(), &mock.uri());
    let descriptor = common::downloadable_descriptor("m1", "org/m1");

    router.pull(&descriptor, None).await.unwrap();
    assert!(store.is_downloaded("org/m1"));

    store.delete("org/m1").unwrap();
    assert!(!store.is_downloaded("org/m1"));

    router.pull(&descriptor, None).await.unwrap();
    assert!(store.is_downloaded("org/m1"));
}

#[tokio::test]
async fn pulling_an_already_cached_model_does_not_hit_the_network_again() {
    let mock = MockServer::start().await;
    // Mount a file expectation with an explicit call count of 1: a second
    // fetch of an already-cached model must short-circuit before any request.
    Mock::given(method("GET"))
        .and(path_regex(r"^/.*/resolve/main/model\.gguf$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .expect(1)
        .mount(&mock)
        .await;
    mount_tree(&mock).await;
    let dir = tempfile::tempdir().unwrap();
    let (router, _store) = common::router_with_real_llamabox(dir.path(), &mock.uri());
    let descriptor = common::downloadable_descriptor("m1", "org/m1");

    router.pull(&descriptor, None).await.unwrap();
    router.pull(&descriptor, None).await.unwrap();

    mock.verify().await;
}
