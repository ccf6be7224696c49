//! Remote ingest notification.

use crate::utils::errors::{AgentError, Result};
use futures_util::future::BoxFuture;
use std::time::Duration;

/// Tells the storage host that a manifest is waiting to be ingested.
pub trait IngestTrigger: Send + Sync {
    fn notify(&self) -> BoxFuture<'_, Result<()>>;
}

/// `POST /api/ingest` on the storage service
pub struct HttpIngestTrigger {
    client: reqwest::Client,
    url: String,
}

impl HttpIngestTrigger {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/api/ingest", server_url.trim_end_matches('/')),
        })
    }
}

impl IngestTrigger for HttpIngestTrigger {
    fn notify(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(&self.url)
                .send()
                .await
                .map_err(|e| AgentError::Network(format!("{}: {}", self.url, e)))?;

            let status = resp.status();
            if status.is_success() {
                Ok(())
            } else {
                let body = resp.text().await.unwrap_or_default();
                Err(AgentError::Network(format!(
                    "{} answered {}: {}",
                    self.url,
                    status,
                    body.trim()
                )))
            }
        })
    }
}
