//! Forwarding of inbound messages to the tenant's N8N workflow.

use crate::domain::{resolve_webhook_url, ForwardOutcome, N8nPayload};
use crate::ports::{TenantRepo, WorkflowWebhook};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ForwardService {
    tenants: Arc<dyn TenantRepo>,
    webhook: Arc<dyn WorkflowWebhook>,
}

impl ForwardService {
    pub fn new(tenants: Arc<dyn TenantRepo>, webhook: Arc<dyn WorkflowWebhook>) -> Self {
        Self { tenants, webhook }
    }

    /// POST `{"body": payload}` to the channel's webhook URL.
    ///
    /// Never fails: a missing tenant, a missing URL or a delivery error is
    /// reported in the outcome and logged.
    pub async fn forward(&self, tenant_id: &str, payload: &N8nPayload) -> ForwardOutcome {
        let tenant = match self.tenants.get_tenant(tenant_id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                warn!(tenant_id, "forward skipped: tenant not found");
                return ForwardOutcome::failed("Tenant not found");
            }
            Err(e) => {
                error!(tenant_id, error = %e, "forward skipped: tenant lookup failed");
                return ForwardOutcome::failed(e.to_string());
            }
        };

        let Some(url) = resolve_webhook_url(&tenant, Some(payload.channel)) else {
            warn!(
                tenant_id,
                tenant_slug = %tenant.slug,
                channel = %payload.channel,
                "no N8N webhook URL configured"
            );
            return ForwardOutcome::failed("No webhook URL configured");
        };

        let body = serde_json::json!({ "body": payload });
        match self.webhook.post_json(url, &body).await {
            Ok(status) => {
                info!(
                    tenant_id,
                    tenant_slug = %tenant.slug,
                    phone = %payload.phone,
                    message_id = %payload.message_id,
                    n8n_status = status,
                    "message forwarded to N8N"
                );
                ForwardOutcome::ok()
            }
            Err(e) => {
                error!(
                    tenant_id,
                    tenant_slug = %tenant.slug,
                    phone = %payload.phone,
                    message_id = %payload.message_id,
                    error = %e,
                    "failed to forward message to N8N"
                );
                ForwardOutcome::failed(e.to_string())
            }
        }
    }
}
