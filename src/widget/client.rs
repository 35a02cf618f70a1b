use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use thiserror::Error;

use crate::web::models::{ErrorResponse, RelayRequest, RelayResponse};

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("Failed to reach the chat service: {0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Unexpected reply from the chat service: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayClientError>;
}

/// Talks to the relay endpoint over HTTP.
pub struct HttpRelayClient {
    endpoint: String,
    client: Client,
}

impl HttpRelayClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_CLIENT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayClientError> {
        debug!("Posting turn to {} with {} history entries", self.endpoint, request.history.len());

        let response = self.client.post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("Chat service returned {}", status));
            return Err(RelayClientError::Status { status: status.as_u16(), message });
        }

        serde_json::from_slice(&body).map_err(|e| RelayClientError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RelayRequest {
        RelayRequest { message: "hi".into(), url: "https://acme.test".into(), history: vec![] }
    }

    #[tokio::test]
    async fn decodes_success_without_confidence() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"Hello"}"#)
            .create_async()
            .await;

        let client = HttpRelayClient::new(format!("{}/chat", server.url())).unwrap();
        let reply = client.send(&request()).await.unwrap();
        assert_eq!(reply.response, "Hello");
        assert_eq!(reply.confidence, None);
    }

    #[tokio::test]
    async fn surfaces_relay_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(500)
            .with_body(r#"{"error":"Rate limit exceeded. Please try again in a moment."}"#)
            .create_async()
            .await;

        let client = HttpRelayClient::new(format!("{}/chat", server.url())).unwrap();
        let err = client.send(&request()).await.unwrap_err();
        assert!(matches!(err, RelayClientError::Status { status: 500, .. }));
        assert_eq!(err.to_string(), "Rate limit exceeded. Please try again in a moment.");
    }

    #[tokio::test]
    async fn malformed_success_body() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/chat").with_status(200).with_body(r#"{"text":"wrong shape"}"#).create_async().await;

        let client = HttpRelayClient::new(format!("{}/chat", server.url())).unwrap();
        assert!(matches!(client.send(&request()).await, Err(RelayClientError::Malformed(_))));
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_transport_error() {
        let client = HttpRelayClient::new("http://127.0.0.1:9/chat").unwrap();
        assert!(matches!(client.send(&request()).await, Err(RelayClientError::Transport(_))));
    }
}
