use std::time::Duration;

use async_trait::async_trait;
use protolab_core::types::{LifecycleResult, PrototypeStatus, StatusReport};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::LifecycleApi;
use crate::{ClientError, Result};

/// Start waits out the server's spawn grace period, so allow well beyond it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ─── HttpLifecycleClient ──────────────────────────────────────────────────

/// reqwest-backed [`LifecycleApi`] for a controller at `base_url`
/// (e.g. `http://localhost:3141`).
#[derive(Debug, Clone)]
pub struct HttpLifecycleClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpLifecycleClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /prototypes`: every registered prototype with live status.
    pub async fn list(&self) -> Result<Vec<PrototypeStatus>> {
        let url = format!("{}/prototypes", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    async fn post_action(&self, port: u16, action: &str) -> Result<LifecycleResult> {
        let url = format!("{}/prototypes/{port}/{action}", self.base_url);
        let response = self.client.post(&url).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl LifecycleApi for HttpLifecycleClient {
    async fn start(&self, port: u16) -> Result<LifecycleResult> {
        self.post_action(port, "start").await
    }

    async fn stop(&self, port: u16) -> Result<LifecycleResult> {
        self.post_action(port, "stop").await
    }

    async fn status(&self, port: u16) -> Result<bool> {
        let url = format!("{}/prototypes/{port}/status", self.base_url);
        let response = self.client.get(&url).send().await?;
        let report: StatusReport = decode(response).await?;
        Ok(report.running)
    }
}

/// Parse a 2xx body as `T`; anything else becomes [`ClientError::Api`]
/// carrying the server's `{error}` message (or the raw body).
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(b) => b.error,
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
