//! `gatehouse run`: load a model and leave it serving, for a caller that
//! only wants to warm the backend before sending requests of its own.

use super::client::{Client, ClientError};
use super::RunArgs;
use serde_json::json;

pub async fn run(args: &RunArgs) -> i32 {
    let client = Client::new(&args.connect);
    let body = json!({ "model_name": args.name });
    match client.post_json("/api/v1/load", &body).await {
        Ok(_) => {
            println!("{} is loaded and serving", args.name);
            0
        }
        Err(ClientError::NotRunning(base)) => {
            eprintln!("no gateway is running at {base}");
            1
        }
        Err(e) => {
            eprintln!("run failed: {e}");
            1
        }
    }
}
