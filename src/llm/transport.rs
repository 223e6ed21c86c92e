//! HTTP transport seam for the endpoint resolver.
//!
//! The resolver's fallback policy is pure logic over this trait, so tests
//! drive it with hand-written fakes and never open a socket.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Network(String),
}

/// Status and parsed body of one HTTP exchange. `body` is `Value::Null` when
/// the response carried no parseable JSON (probe responses never parse it).
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST `{base_url}/chat/completions` with a JSON body, bounded by
    /// `timeout`.
    async fn chat_completion(
        &self,
        base_url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;

    /// GET `{base_url}/models`, bounded by `timeout`. Callers only look at
    /// the status.
    async fn probe_models(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with per-request timeouts.
#[derive(Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat_completion(
        &self,
        base_url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        debug!("POST {base_url}/chat/completions");

        let response = self
            .client
            .post(format!("{base_url}/chat/completions"))
            .header("Content-Type", "application/json")
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let body = response.json().await.unwrap_or(Value::Null);

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text,
            body,
        })
    }

    async fn probe_models(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        debug!("GET {base_url}/models");

        let response = self
            .client
            .get(format!("{base_url}/models"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body: Value::Null,
        })
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(e.to_string())
    }
}
