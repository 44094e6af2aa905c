//! `gatehouse pull`
//!
//! Streams the same `event: progress` / `event: complete` / `event: error`
//! SSE sequence [`crate::api::pull::handle`] produces, rendering a one-line
//! progress update per event instead of parsing it into a struct.

use super::client::{Client, ClientError};
use super::PullArgs;
use futures_util::StreamExt;
use serde_json::{json, Value};

/// Pull a minimal SSE frame's `data:` payload out of a raw text chunk. Good
/// enough for this CLI's own server, which never splits an event across
/// chunk boundaries in a way that matters for display purposes.
fn extract_events(chunk: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut event_name = String::new();
    for line in chunk.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            events.push((event_name.clone(), rest.trim().to_string()));
        }
    }
    events
}

pub async fn run(args: &PullArgs) -> i32 {
    let client = Client::new(&args.connect);
    let body = json!({
        "model_name": args.name,
        "stream": true,
        "checkpoint": args.checkpoint,
        "recipe": args.recipe,
        "labels": args.labels(),
        "mmproj": args.mmproj,
    });

    let response = match client.post_json("/api/v1/pull", &body).await {
        Ok(r) => r,
        Err(ClientError::NotRunning(base)) => {
            eprintln!("no gateway is running at {base}");
            return 1;
        }
        Err(e) => {
            eprintln!("pull failed: {e}");
            return 1;
        }
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                eprintln!("pull stream broke: {e}");
                return 1;
            }
        };
        let text = String::from_utf8_lossy(&chunk);
        for (event, data) in extract_events(&text) {
            let parsed: Value = serde_json::from_str(&data).unwrap_or(Value::Null);
            match event.as_str() {
                "progress" => {
                    let file = parsed["file"].as_str().unwrap_or("?");
                    let percent = parsed["percent"].as_f64().unwrap_or(0.0);
                    let index = parsed["file_index"].as_u64().unwrap_or(0) + 1;
                    let total = parsed["total_files"].as_u64().unwrap_or(0);
                    print!("\r[{index}/{total}] {file}: {percent:.1}%   ");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
                "complete" => {
                    println!("\ndownloaded {}", args.name);
                    return 0;
                }
                "error" => {
                    let message = parsed["message"].as_str().unwrap_or("unknown error");
                    eprintln!("\npull failed: {message}");
                    return 1;
                }
                _ => {}
            }
        }
    }

    0
}
