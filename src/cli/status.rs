//! `gatehouse status`

use super::client::{Client, ClientError};
use super::ConnectArgs;
use serde_json::Value;

pub async fn run(args: &ConnectArgs) -> i32 {
    let client = Client::new(args);
    match client.get("/api/v1/health").await {
        Ok(response) => {
            let body: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("gateway responded but its body was unreadable: {e}");
                    return 1;
                }
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&body).unwrap());
            } else {
                let model = body["model_loaded"].as_str().unwrap_or("none");
                println!("running (model loaded: {model})");
            }
            0
        }
        Err(ClientError::NotRunning(base)) => {
            if args.json {
                println!(r#"{{"running":false,"address":"{base}"}}"#);
            } else {
                println!("not running ({base})");
            }
            1
        }
        Err(e) => {
            eprintln!("status check failed: {e}");
            1
        }
    }
}
