//! `StreamingProxy` cancellation integration test: a client-driven shutdown
//! must stop forwarding promptly rather than waiting for the upstream
//! response to finish.

use futures_util::StreamExt;
use gatehouse::streaming::StreamingProxy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn cancellation_stops_forwarding_before_the_upstream_delay_elapses() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock)
        .await;

    let response = reqwest::get(format!("{}/slow", mock.uri())).await.unwrap();

    let cancel = CancellationToken::new();
    let completed = Arc::new(AtomicBool::new(false));
    let completed_clone = completed.clone();

    let stream = StreamingProxy::proxy(response, cancel.clone(), move |_tail| {
        completed_clone.store(true, Ordering::SeqCst);
    });
    tokio::pin!(stream);

    // Cancel almost immediately; the upstream would otherwise take 5s.
    let cancel_in = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_in.cancel();
    });

    let started = Instant::now();
    while stream.next().await.is_some() {}
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(1),
        "cancellation should short-circuit the stream, took {elapsed:?}"
    );
    assert!(completed.load(Ordering::SeqCst), "on_complete must still run on cancellation");
}

#[tokio::test]
async fn uncancelled_stream_forwards_the_full_body_and_invokes_on_complete() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"choices\":[]}\n\ndata: [DONE]\n\n",
        ))
        .mount(&mock)
        .await;

    let response = reqwest::get(format!("{}/fast", mock.uri())).await.unwrap();
    let cancel = CancellationToken::new();
    let tail_len = Arc::new(std::sync::Mutex::new(0usize));
    let tail_len_clone = tail_len.clone();

    let stream = StreamingProxy::proxy(response, cancel, move |tail| {
        *tail_len_clone.lock().unwrap() = tail.len();
    });
    tokio::pin!(stream);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    assert!(!events.is_empty());
    assert!(*tail_len.lock().unwrap() > 0);
}

#[tokio::test]
async fn an_event_line_followed_by_a_data_line_yields_one_combined_event() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "event: progress\ndata: {\"percent\":50}\n\n",
        ))
        .mount(&mock)
        .await;

    let response = reqwest::get(format!("{}/progress", mock.uri())).await.unwrap();
    let cancel = CancellationToken::new();
    let stream = StreamingProxy::proxy(response, cancel, |_tail| {});
    tokio::pin!(stream);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(events.len(), 1, "one logical SSE record should yield one Event");
    let rendered = format!("{:?}", events[0]);
    assert!(rendered.contains("progress"), "combined event should carry the event name: {rendered}");
    assert!(rendered.contains("percent"), "combined event should carry the data: {rendered}");
}
