//! In-memory port implementations for service tests.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::{WhatsAppCredentials, WhatsAppGateway, WorkflowWebhook};
use std::sync::Mutex;
use std::time::Duration;

/// Records every POST; answers with `status` or fails when `fail` is set.
#[derive(Default)]
pub struct RecordingWebhook {
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    pub fail: bool,
}

impl RecordingWebhook {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl WorkflowWebhook for RecordingWebhook {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, DomainError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        if self.fail {
            return Err(DomainError::Forward("N8N responded 500: boom".into()));
        }
        Ok(200)
    }
}

/// Hands out sequential wamids; `fail` makes every send fail. `delay`
/// holds every call for that long.
#[derive(Default)]
pub struct FakeGateway {
    pub sent: Mutex<Vec<(String, OutgoingMessage)>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl WhatsAppGateway for FakeGateway {
    async fn send_message(
        &self,
        _credentials: &WhatsAppCredentials,
        to: &str,
        message: &OutgoingMessage,
    ) -> Result<String, DomainError> {
        self.pause().await;
        if self.fail {
            return Err(DomainError::Gateway("(#131030) Recipient not in allowed list".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), message.clone()));
        Ok(format!("wamid.out.{}", sent.len()))
    }

    async fn media_url(
        &self,
        _credentials: &WhatsAppCredentials,
        media_id: &str,
    ) -> Result<String, DomainError> {
        self.pause().await;
        Ok(format!("https://media.test/{}", media_id))
    }
}
