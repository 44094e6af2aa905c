//! `gatehouse stop`

use super::client::{Client, ClientError};
use super::ConnectArgs;

pub async fn run(args: &ConnectArgs) -> i32 {
    let client = Client::new(args);
    match client.post_json("/internal/shutdown", &serde_json::json!({})).await {
        Ok(_) => {
            println!("shutdown requested");
            0
        }
        Err(ClientError::NotRunning(base)) => {
            eprintln!("no gateway is running at {base}");
            1
        }
        Err(e) => {
            eprintln!("stop failed: {e}");
            1
        }
    }
}
