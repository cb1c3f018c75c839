//! Gateway HTTP side-channel
//!
//! The gateway exposes two plain HTTP endpoints next to the stream: a write
//! endpoint used when the stream is not open, and a status endpoint polled
//! for connection counters.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GatewayEndpoints;
use crate::types::{GatewayHealth, WriteCommand};

/// Gateway side-channel errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The side-channel operations the stream client depends on.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// POST a write command; returns the gateway's acknowledgement message.
    async fn post_write(&self, command: &WriteCommand) -> Result<String, GatewayError>;

    /// GET the gateway connection counters.
    async fn fetch_status(&self) -> Result<GatewayHealth, GatewayError>;
}

/// Acknowledgement body of the write endpoint.
#[derive(Debug, Deserialize)]
struct WriteAck {
    #[serde(default)]
    message: Option<String>,
}

/// reqwest-backed gateway client
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    write_url: String,
    status_url: String,
}

impl HttpGateway {
    pub fn new(endpoints: &GatewayEndpoints) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(endpoints.http_timeout())
            .build()?;

        Ok(Self {
            http,
            write_url: endpoints.write_url(),
            status_url: endpoints.status_url(),
        })
    }
}

#[async_trait]
impl GatewayApi for HttpGateway {
    async fn post_write(&self, command: &WriteCommand) -> Result<String, GatewayError> {
        let resp = self.http.post(&self.write_url).json(command).send().await?;

        if !resp.status().is_success() {
            return Err(GatewayError::ServerError(resp.status()));
        }

        // The body is informational; an unexpected shape is still a delivery
        let bytes = resp.bytes().await?;
        let message = serde_json::from_slice::<WriteAck>(&bytes)
            .ok()
            .and_then(|ack| ack.message)
            .unwrap_or_else(|| "accepted".to_string());
        Ok(message)
    }

    async fn fetch_status(&self) -> Result<GatewayHealth, GatewayError> {
        let resp = self.http.get(&self.status_url).send().await?;

        if !resp.status().is_success() {
            return Err(GatewayError::ServerError(resp.status()));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
