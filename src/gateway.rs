//! HTTP client for the telemetry server.
//!
//! Implements both transport boundaries over HTTP:
//! - `POST {base}/keystrokes` with a JSON [`TelemetryRecord`]
//! - `GET {base}/profile/{subject_id}` returning the subject's windows

use crate::core::{TelemetryRecord, WindowAggregate};
use crate::transport::{HistorySource, TransportError, WindowSink};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Optional bearer token
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::Config(format!("invalid base URL '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Config(format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn submit_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&["keystrokes"])
    }

    pub fn history_url(&self, subject_id: &str) -> Result<Url, TransportError> {
        self.endpoint(&["profile", subject_id])
    }

    pub fn health_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&["health"])
    }
}

/// HTTP transport for keystroke windows.
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
    device_id: String,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Config(format!("failed to create HTTP client: {e}")))?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!(
            "keystroke-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            device_id,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn test_connection(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(self.config.health_url()?)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(TransportError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl WindowSink for GatewayClient {
    async fn submit_window(&self, record: &TelemetryRecord) -> Result<(), TransportError> {
        let request = self
            .client
            .post(self.config.submit_url()?)
            .header("X-Device-Id", &self.device_id)
            .json(record);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::check(response).await?;
        debug!(window_index = record.window_index, "window accepted by gateway");
        Ok(())
    }
}

#[async_trait]
impl HistorySource for GatewayClient {
    async fn fetch_history(
        &self,
        subject_id: &str,
    ) -> Result<Vec<WindowAggregate>, TransportError> {
        let request = self.client.get(self.config.history_url(subject_id)?);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Serialization(e.to_string()))
    }
}
