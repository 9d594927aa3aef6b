//! N8N webhook adapter. Implements `WorkflowWebhook` by POSTing JSON.

use crate::domain::DomainError;
use crate::ports::WorkflowWebhook;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct N8nWebhookClient {
    client: Client,
}

impl N8nWebhookClient {
    /// Every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for N8nWebhookClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait::async_trait]
impl WorkflowWebhook for N8nWebhookClient {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, DomainError> {
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Forward(format!("Request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(DomainError::Forward(format!(
                "N8N responded {}: {}",
                status, text
            )));
        }
        Ok(status.as_u16())
    }
}
