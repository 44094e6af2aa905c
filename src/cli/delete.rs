//! `gatehouse delete`

use super::client::{Client, ClientError};
use super::DeleteArgs;
use serde_json::json;

pub async fn run(args: &DeleteArgs) -> i32 {
    let client = Client::new(&args.connect);
    let body = json!({ "model_name": args.name });
    match client.post_json("/api/v1/delete", &body).await {
        Ok(_) => {
            println!("deleted {}", args.name);
            0
        }
        Err(ClientError::NotRunning(base)) => {
            eprintln!("no gateway is running at {base}");
            1
        }
        Err(e) => {
            eprintln!("delete failed: {e}");
            1
        }
    }
}
