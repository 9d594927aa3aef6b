//! Outbound ports. Application calls into external services.
//!
//! Implemented by adapters.

use crate::domain::{DomainError, OutgoingMessage, Tenant};

/// Credentials for one tenant's WhatsApp Business number.
#[derive(Debug, Clone)]
pub struct WhatsAppCredentials {
    pub phone_number_id: String,
    pub access_token: String,
}

impl WhatsAppCredentials {
    /// `None` until the tenant has configured its number and token.
    pub fn of(tenant: &Tenant) -> Option<Self> {
        Some(Self {
            phone_number_id: tenant.whatsapp_phone_number_id.clone()?,
            access_token: tenant.whatsapp_access_token.clone()?,
        })
    }
}

/// WhatsApp Cloud API gateway.
#[async_trait::async_trait]
pub trait WhatsAppGateway: Send + Sync {
    /// Send a message to `to` (digits only). Returns the platform message id (wamid).
    async fn send_message(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        message: &OutgoingMessage,
    ) -> Result<String, DomainError>;

    /// Resolve a media id from an inbound message to its download URL.
    async fn media_url(
        &self,
        credentials: &WhatsAppCredentials,
        media_id: &str,
    ) -> Result<String, DomainError>;
}

/// Port for delivering JSON payloads to an automation workflow (N8N webhook).
///
/// Implementations enforce their own timeout. When a tenant has no webhook
/// URL the caller never reaches this port.
#[async_trait::async_trait]
pub trait WorkflowWebhook: Send + Sync {
    /// POST `body` to `url`.
    ///
    /// # Returns
    /// The HTTP status code on a 2xx response.
    ///
    /// # Errors
    /// `DomainError::Forward` on transport failure, timeout, or non-2xx status
    /// (message carries the status and response text).
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, DomainError>;
}
