//! `gatehouse list`

use super::client::{Client, ClientError};
use super::output::{format_models_json, format_models_table, ModelRow};
use super::ListArgs;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelRow>,
}

pub async fn run(args: &ListArgs) -> i32 {
    let client = Client::new(&args.connect);
    let path = if args.show_all {
        "/api/v1/models?show_all=true"
    } else {
        "/api/v1/models"
    };
    match client.get(path).await {
        Ok(response) => match response.json::<ModelsResponse>().await {
            Ok(body) => {
                if args.connect.json {
                    println!("{}", format_models_json(&body.data));
                } else {
                    println!("{}", format_models_table(&body.data));
                }
                0
            }
            Err(e) => {
                eprintln!("could not parse model list: {e}");
                1
            }
        },
        Err(ClientError::NotRunning(base)) => {
            eprintln!("no gateway is running at {base}");
            1
        }
        Err(e) => {
            eprintln!("list failed: {e}");
            1
        }
    }
}
