//! Chat transcript state machine that runs inside the widget iframe.
//!
//! A session is `Idle` or `Sending`. [`ChatSession::begin_submit`] accepts a
//! turn and hands back the request to send; [`ChatSession::complete`] folds
//! the relay's answer (or failure) into the transcript. [`ChatSession::submit`]
//! drives both halves against a [`RelayClient`].

pub mod client;

use log::{error, info};

use crate::web::models::{HistoryEntry, RelayRequest, RelayResponse, Role, DEFAULT_CONFIDENCE};
pub use client::{HttpRelayClient, RelayClient, RelayClientError};

pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble connecting right now. Please try again later.";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub is_from_assistant: bool,
    pub confidence: Option<f64>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_from_assistant: false, confidence: None }
    }

    pub fn assistant(text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self { text: text.into(), is_from_assistant: true, confidence }
    }

    pub fn role(&self) -> Role {
        if self.is_from_assistant { Role::Assistant } else { Role::User }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
}

#[derive(Debug)]
pub struct ChatSession {
    site_url: String,
    messages: Vec<ChatMessage>,
    draft: String,
    state: SessionState,
    error: Option<String>,
}

pub fn greeting(site_url: &str) -> String {
    format!("Hi! I'm your AI assistant. How can I help you with {}?", site_url)
}

impl ChatSession {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            messages: vec![ChatMessage::assistant(greeting(&site_url), None)],
            site_url,
            draft: String::new(),
            state: SessionState::Idle,
            error: None,
        }
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// The transcript as relay history, in display order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|m| HistoryEntry { role: m.role(), content: m.text.clone() })
            .collect()
    }

    /// Accepts a turn unless the text is blank or a request is in flight.
    /// History is captured before the new user message is appended.
    pub fn begin_submit(&mut self, text: &str) -> Option<RelayRequest> {
        if text.trim().is_empty() || self.state == SessionState::Sending {
            return None;
        }

        let request = RelayRequest {
            message: text.to_string(),
            url: self.site_url.clone(),
            history: self.history(),
        };

        self.messages.push(ChatMessage::user(text));
        self.draft.clear();
        self.state = SessionState::Sending;
        self.error = None;
        Some(request)
    }

    pub fn complete(&mut self, outcome: Result<RelayResponse, RelayClientError>) {
        match outcome {
            Ok(reply) => {
                let confidence = reply.confidence.unwrap_or(DEFAULT_CONFIDENCE);
                self.messages.push(ChatMessage::assistant(reply.response, Some(confidence)));
            }
            Err(e) => {
                error!("Chat error: {}", e);
                self.error = Some(e.to_string());
                self.messages.push(ChatMessage::assistant(FALLBACK_REPLY, None));
            }
        }
        self.state = SessionState::Idle;
    }

    /// Sends one turn and waits for it. Returns `false` when the turn was
    /// rejected and nothing was sent.
    pub async fn submit<C: RelayClient + ?Sized>(&mut self, text: &str, client: &C) -> bool {
        let Some(request) = self.begin_submit(text) else {
            return false;
        };
        info!("Sending turn {} for {}", self.messages.len(), self.site_url);
        let outcome = client.send(&request).await;
        self.complete(outcome);
        true
    }

    pub async fn submit_draft<C: RelayClient + ?Sized>(&mut self, client: &C) -> bool {
        let text = self.draft.clone();
        self.submit(&text, client).await
    }
}
