use std::sync::Arc;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use log::{info, debug};
use thiserror::Error;

use crate::config::ProviderConfig;

/// Role vocabulary of the provider's chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderRole {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "CHATBOT")]
    Chatbot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTurn {
    pub role: ProviderRole,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorOptions {
    pub site: String,
    pub search_results_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: String,
    pub options: ConnectorOptions,
}

/// One chat-completion call as the provider receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub message: String,
    pub model: String,
    pub temperature: f32,
    pub chat_history: Vec<ProviderTurn>,
    pub connectors: Vec<Connector>,
    pub preamble: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    pub text: String,
    #[serde(default)]
    pub generation_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}

impl ProviderError {
    /// HTTP status carried by the failure. Errors without a status field are
    /// scanned for the codes the relay distinguishes.
    pub fn status_hint(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            ProviderError::Transport(msg) | ProviderError::Decode(msg) => [401u16, 429]
                .into_iter()
                .find(|code| msg.contains(&code.to_string())),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ProviderError::Status { status: status.as_u16(), body: err.to_string() },
            None if err.is_decode() => ProviderError::Decode(err.to_string()),
            None => ProviderError::Transport(err.to_string()),
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, request: ChatCompletionRequest) -> Result<ChatCompletion, ProviderError>;
}

// A wrapper for the hosted chat API
pub struct CohereModel {
    api_base: String,
    api_key: String,
    client: Client,
}

impl CohereModel {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        info!("Using chat provider at: {}", config.api_base);
        if config.api_key.is_empty() {
            log::warn!("COHERE_API_KEY is empty, provider calls will be rejected");
        }

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: Client::builder().build()?,
        })
    }
}

#[async_trait]
impl ChatProvider for CohereModel {
    async fn chat(&self, request: ChatCompletionRequest) -> Result<ChatCompletion, ProviderError> {
        let url = format!("{}/v1/chat", self.api_base);
        info!("Sending chat request to provider grounded on {:?}",
              request.connectors.first().map(|c| c.options.site.as_str()));
        debug!("Payload: {:?}", request);

        let response = self.client.post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        info!("Response length: {} characters", completion.text.len());
        Ok(completion)
    }
}

// Shared handle to whichever provider the server runs with
#[derive(Clone)]
pub struct ModelManager {
    pub model: Arc<dyn ChatProvider>,
}

impl ModelManager {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let model = CohereModel::new(config)?;
        Ok(Self::with_provider(Arc::new(model)))
    }

    pub fn with_provider(model: Arc<dyn ChatProvider>) -> Self {
        Self { model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            message: "What do you sell?".into(),
            model: "command".into(),
            temperature: 0.7,
            chat_history: vec![ProviderTurn { role: ProviderRole::Chatbot, message: "Hi!".into() }],
            connectors: vec![Connector {
                id: "web-search".into(),
                options: ConnectorOptions { site: "https://acme.test".into(), search_results_count: 3 },
            }],
            preamble: "Answer from the page.".into(),
        }
    }

    fn model_for(server: &mockito::Server) -> CohereModel {
        CohereModel::new(&ProviderConfig { api_base: server.url(), api_key: "secret".into() }).unwrap()
    }

    #[tokio::test]
    async fn posts_chat_request_with_bearer_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "message": "What do you sell?",
                "chat_history": [{ "role": "CHATBOT", "message": "Hi!" }],
                "connectors": [{ "id": "web-search", "options": { "site": "https://acme.test", "search_results_count": 3 } }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"Anvils.","generation_id":"g-1"}"#)
            .create_async()
            .await;

        let completion = model_for(&server).chat(request()).await.unwrap();
        assert_eq!(completion.text, "Anvils.");
        assert_eq!(completion.generation_id.as_deref(), Some("g-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_kept_on_the_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat")
            .with_status(429)
            .with_body(r#"{"message":"too many requests"}"#)
            .create_async()
            .await;

        let err = model_for(&server).chat(request()).await.unwrap_err();
        assert_eq!(err.status_hint(), Some(429));
        assert!(err.to_string().contains("too many requests"));
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/v1/chat").with_status(200).with_body("not json").create_async().await;

        let err = model_for(&server).chat(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn status_hint_reads_codes_out_of_messages() {
        assert_eq!(ProviderError::Transport("upstream said 401 Unauthorized".into()).status_hint(), Some(401));
        assert_eq!(ProviderError::Transport("connection reset".into()).status_hint(), None);
    }
}
