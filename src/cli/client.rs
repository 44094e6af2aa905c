//! Thin `reqwest`-based client shared by every subcommand that talks to a
//! running gateway instance instead of starting one.

use super::ConnectArgs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no gateway is listening at {0}")]
    NotRunning(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub struct Client {
    inner: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(connect: &ConnectArgs) -> Self {
        Self {
            inner: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build HTTP client"),
            base: format!("http://{}:{}", connect.host, connect.port),
        }
    }

    fn not_running(&self, source: reqwest::Error) -> ClientError {
        if source.is_connect() {
            ClientError::NotRunning(self.base.clone())
        } else {
            ClientError::Request(source)
        }
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let response = self
            .inner
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .map_err(|e| self.not_running(e))?;
        check_status(response).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ClientError> {
        let response = self
            .inner
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.not_running(e))?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { status, body })
    }
}
