//! Chat relay: turns one widget turn into one grounded provider call and maps
//! the outcome back onto the widget's wire contract.

use std::time::Duration;

use actix_web::{http::StatusCode, web::JsonConfig, HttpResponse, ResponseError};
use log::{error, info};
use thiserror::Error;
use tokio::time::timeout;

use crate::model::{
    ChatCompletionRequest, ChatProvider, Connector, ConnectorOptions, ProviderError, ProviderRole,
    ProviderTurn,
};
use crate::web::models::{ErrorResponse, HistoryEntry, RelayRequest, RelayResponse, Role, DEFAULT_CONFIDENCE};

pub const DEFAULT_MODEL: &str = "command";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Cap on web-search results the grounding connector may pull in.
pub const DEFAULT_SEARCH_RESULTS_COUNT: u32 = 3;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const WEB_SEARCH_CONNECTOR: &str = "web-search";
/// Largest relay request body accepted, transcript included.
pub const MAX_REQUEST_BYTES: usize = 2 * 1024 * 1024;

pub const INVALID_API_KEY_MESSAGE: &str =
    "Invalid API key. Please check your provider API key configuration.";
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again in a moment.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request body";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub model: String,
    pub temperature: f32,
    pub search_results_count: u32,
    /// Reported with every reply. Not computed from the provider output.
    pub confidence: f64,
    pub provider_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            search_results_count: DEFAULT_SEARCH_RESULTS_COUNT,
            confidence: DEFAULT_CONFIDENCE,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayFailure {
    #[error("{}", INVALID_API_KEY_MESSAGE)]
    InvalidApiKey(#[source] ProviderError),
    #[error("{}", RATE_LIMITED_MESSAGE)]
    RateLimited(#[source] ProviderError),
    #[error("{}", UNKNOWN_ERROR_MESSAGE)]
    Upstream(#[source] ProviderError),
    #[error("{}", UNKNOWN_ERROR_MESSAGE)]
    Timeout(Duration),
    #[error("{}", INVALID_REQUEST_MESSAGE)]
    MalformedRequest(String),
}

impl RelayFailure {
    pub fn from_provider(err: ProviderError) -> Self {
        match err.status_hint() {
            Some(401) => RelayFailure::InvalidApiKey(err),
            Some(429) => RelayFailure::RateLimited(err),
            _ => RelayFailure::Upstream(err),
        }
    }

    pub fn details(&self) -> String {
        match self {
            RelayFailure::InvalidApiKey(e) | RelayFailure::RateLimited(e) | RelayFailure::Upstream(e) => {
                e.to_string()
            }
            RelayFailure::Timeout(after) => format!("provider did not answer within {:?}", after),
            RelayFailure::MalformedRequest(reason) => reason.clone(),
        }
    }
}

impl ResponseError for RelayFailure {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            details: Some(self.details()),
        })
    }
}

/// Body extractor settings for relay routes. Bad JSON, missing fields and
/// oversized bodies all come back as `MalformedRequest`.
pub fn json_config(limit: usize) -> JsonConfig {
    JsonConfig::default()
        .limit(limit)
        .content_type_required(false)
        .error_handler(|err, _req| {
            error!("Function error: {}", err);
            RelayFailure::MalformedRequest(err.to_string()).into()
        })
}

pub fn preamble(url: &str) -> String {
    format!(
        "You are a website specialist AI trained to analyze and provide accurate context-aware \
         answers based strictly on the content of the given webpage {url}. Your primary role is to \
         act as a representative for the organization, business, or entity described on the page, \
         answering questions as if you are speaking on their behalf based solely on the information \
         visible on that page."
    )
}

pub fn provider_history(history: &[HistoryEntry]) -> Vec<ProviderTurn> {
    history
        .iter()
        .map(|entry| ProviderTurn {
            role: match entry.role {
                Role::User => ProviderRole::User,
                Role::Assistant => ProviderRole::Chatbot,
            },
            message: entry.content.clone(),
        })
        .collect()
}

pub fn build_completion_request(config: &RelayConfig, request: &RelayRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        message: request.message.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        chat_history: provider_history(&request.history),
        connectors: vec![Connector {
            id: WEB_SEARCH_CONNECTOR.to_string(),
            options: ConnectorOptions {
                site: request.url.clone(),
                search_results_count: config.search_results_count,
            },
        }],
        preamble: preamble(&request.url),
    }
}

/// Runs one turn against the provider. Exactly one call, no retries.
pub async fn relay_turn(
    provider: &dyn ChatProvider,
    config: &RelayConfig,
    request: &RelayRequest,
) -> Result<RelayResponse, RelayFailure> {
    info!("Received chat request for {} ({} prior turns)", request.url, request.history.len());

    let completion_request = build_completion_request(config, request);
    let completion = match timeout(config.provider_timeout, provider.chat(completion_request)).await {
        Ok(Ok(completion)) => completion,
        Ok(Err(e)) => {
            error!("Provider error: {}", e);
            return Err(RelayFailure::from_provider(e));
        }
        Err(_) => {
            error!("Provider call timed out after {:?}", config.provider_timeout);
            return Err(RelayFailure::Timeout(config.provider_timeout));
        }
    };

    Ok(RelayResponse {
        response: completion.text,
        confidence: Some(config.confidence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatCompletion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers from a canned outcome.
    struct StubProvider {
        calls: Mutex<Vec<ChatCompletionRequest>>,
        outcome: fn() -> Result<ChatCompletion, ProviderError>,
        delay: Option<Duration>,
    }

    impl StubProvider {
        fn answering(outcome: fn() -> Result<ChatCompletion, ProviderError>) -> Self {
            Self { calls: Mutex::new(Vec::new()), outcome, delay: None }
        }

        fn slow(delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::answering(|| Ok(ChatCompletion { text: "late".into(), generation_id: None })) }
        }
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(&self, request: ChatCompletionRequest) -> Result<ChatCompletion, ProviderError> {
            self.calls.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.outcome)()
        }
    }

    fn hello(history: Vec<HistoryEntry>) -> RelayRequest {
        RelayRequest { message: "hi".into(), url: "https://acme.test".into(), history }
    }

    #[tokio::test]
    async fn grounds_the_call_on_the_requested_url() {
        let provider = StubProvider::answering(|| Ok(ChatCompletion { text: "Hello!".into(), generation_id: None }));
        let reply = relay_turn(&provider, &RelayConfig::default(), &hello(vec![])).await.unwrap();

        assert_eq!(reply.response, "Hello!");
        assert_eq!(reply.confidence, Some(0.85));

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.message, "hi");
        assert_eq!(call.model, DEFAULT_MODEL);
        assert!(call.chat_history.is_empty());
        assert_eq!(call.connectors.len(), 1);
        assert_eq!(call.connectors[0].id, "web-search");
        assert_eq!(call.connectors[0].options.site, "https://acme.test");
        assert_eq!(call.connectors[0].options.search_results_count, DEFAULT_SEARCH_RESULTS_COUNT);
        assert!(call.preamble.contains("https://acme.test"));
    }

    #[test]
    fn history_keeps_order_and_maps_roles() {
        let history = vec![
            HistoryEntry { role: Role::Assistant, content: "greeting".into() },
            HistoryEntry { role: Role::User, content: "q1".into() },
            HistoryEntry { role: Role::Assistant, content: "a1".into() },
            HistoryEntry { role: Role::User, content: "q2".into() },
        ];
        let mapped = provider_history(&history);
        let roles: Vec<ProviderRole> = mapped.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![ProviderRole::Chatbot, ProviderRole::User, ProviderRole::Chatbot, ProviderRole::User]
        );
        let texts: Vec<&str> = mapped.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(texts, vec!["greeting", "q1", "a1", "q2"]);
    }

    #[tokio::test]
    async fn classifies_provider_failures() {
        let unauthorized = StubProvider::answering(|| Err(ProviderError::Status { status: 401, body: "bad key".into() }));
        let limited = StubProvider::answering(|| Err(ProviderError::Status { status: 429, body: "slow down".into() }));
        let other = StubProvider::answering(|| Err(ProviderError::Transport("connection reset".into())));
        let config = RelayConfig::default();

        let err = relay_turn(&unauthorized, &config, &hello(vec![])).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid API key"));
        let err = relay_turn(&limited, &config, &hello(vec![])).await.unwrap_err();
        assert!(err.to_string().starts_with("Rate limit exceeded"));
        let err = relay_turn(&other, &config, &hello(vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_ERROR_MESSAGE);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.details().contains("connection reset"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_generic_failure() {
        let provider = StubProvider::slow(Duration::from_secs(5));
        let config = RelayConfig { provider_timeout: Duration::from_millis(20), ..RelayConfig::default() };

        let err = relay_turn(&provider, &config, &hello(vec![])).await.unwrap_err();
        assert!(matches!(err, RelayFailure::Timeout(_)));
        assert_eq!(err.to_string(), UNKNOWN_ERROR_MESSAGE);
    }
}
