//! Collaborators that own site data: identifier lookup and usage metering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Resolves the URL a site identifier is bound to. `Ok(None)` means no
    /// binding exists yet.
    async fn resolve(&self, website_id: &str) -> Result<Option<String>>;
}

pub struct StaticSiteDirectory {
    sites: HashMap<String, String>,
}

impl StaticSiteDirectory {
    pub fn new(sites: HashMap<String, String>) -> Self {
        info!("Site directory loaded with {} site(s)", sites.len());
        Self { sites }
    }
}

#[async_trait]
impl SiteDirectory for StaticSiteDirectory {
    async fn resolve(&self, website_id: &str) -> Result<Option<String>> {
        Ok(self.sites.get(website_id).cloned())
    }
}

/// Looks a site up, folding lookup failures into "no URL bound yet".
pub async fn bound_url(directory: &dyn SiteDirectory, website_id: &str) -> Option<String> {
    match directory.resolve(website_id).await {
        Ok(url) => url,
        Err(e) => {
            error!("Error fetching website {}: {}", website_id, e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub id: Uuid,
    pub website_id: String,
    pub recorded_at_ms: u128,
}

impl UsageEvent {
    pub fn session_start(website_id: &str) -> Self {
        let recorded_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { id: Uuid::new_v4(), website_id: website_id.to_string(), recorded_at_ms }
    }
}

#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, event: UsageEvent) -> Result<()>;
}

pub struct LogUsageRecorder;

#[async_trait]
impl UsageRecorder for LogUsageRecorder {
    async fn record(&self, event: UsageEvent) -> Result<()> {
        info!("Chat session started for website {} (event {})", event.website_id, event.id);
        Ok(())
    }
}

/// Records one session start on a detached task. Never blocks the caller;
/// failures are only logged.
pub fn record_session_start(recorder: Arc<dyn UsageRecorder>, website_id: &str) {
    let event = UsageEvent::session_start(website_id);
    tokio::spawn(async move {
        if let Err(e) = recorder.record(event).await {
            error!("Error tracking chat session: {}", e);
        }
    });
}
