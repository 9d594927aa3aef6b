//! axum HTTP surface: CRM REST API, N8N action API, Meta webhooks and the
//! real-time event stream.
//!
//! Handlers stay thin: extract, call one service method, map the result.
//! `DomainError` converts into the response (see `error`).

mod audit;
mod catalog;
mod contacts;
mod conversations;
pub mod error;
mod events;
pub mod extract;
mod n8n;
mod reports;
mod tenants;
mod users;
mod webhooks;

use crate::adapters::events::BroadcastEvents;
use crate::ports::{
    AuditLogRepo, ContactRepo, ConversationRepo, MessageRepo, OrganizationRepo, QuickReplyRepo,
    ReportRepo, TagRepo, TenantRepo, UserRepo, WhatsAppGateway, WorkflowWebhook,
};
use crate::shared::config::AppConfig;
use crate::usecases::{
    AuditService, ContactService, ConversationService, ForwardService, InboxService,
    OutboundService, QuickReplyService, ReportService, TagService, TenantService, UserService,
};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

/// `?search=` on list endpoints without paging.
#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

/// Services and settings shared by every handler.
pub struct AppState {
    pub tenants: TenantService,
    pub users: UserService,
    pub contacts: ContactService,
    pub tags: TagService,
    pub quick_replies: QuickReplyService,
    pub conversations: ConversationService,
    pub inbox: InboxService,
    pub outbound: OutboundService,
    pub audit: Arc<AuditService>,
    pub reports: ReportService,
    pub events: Arc<BroadcastEvents>,
    pub messenger_verify_token: String,
    pub instagram_verify_token: String,
}

impl AppState {
    /// Build every service on top of one repository implementing all ports.
    pub fn wire<R>(
        repo: Arc<R>,
        gateway: Arc<dyn WhatsAppGateway>,
        webhook: Arc<dyn WorkflowWebhook>,
        events: Arc<BroadcastEvents>,
        config: &AppConfig,
    ) -> Self
    where
        R: TenantRepo
            + UserRepo
            + ContactRepo
            + OrganizationRepo
            + TagRepo
            + QuickReplyRepo
            + ConversationRepo
            + MessageRepo
            + AuditLogRepo
            + ReportRepo
            + 'static,
    {
        let audit = Arc::new(AuditService::new(repo.clone()));
        let forwarder = Arc::new(ForwardService::new(repo.clone(), webhook));
        Self {
            tenants: TenantService::new(
                repo.clone(),
                audit.clone(),
                config.base_domain_or_default(),
            ),
            users: UserService::new(repo.clone(), repo.clone(), audit.clone()),
            contacts: ContactService::new(repo.clone(), repo.clone(), audit.clone()),
            tags: TagService::new(repo.clone(), audit.clone()),
            quick_replies: QuickReplyService::new(repo.clone(), audit.clone()),
            conversations: ConversationService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                events.clone(),
                audit.clone(),
            ),
            inbox: InboxService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                gateway.clone(),
                forwarder,
                events.clone(),
            ),
            outbound: OutboundService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                gateway,
                events.clone(),
            ),
            reports: ReportService::new(repo),
            audit,
            events,
            messenger_verify_token: config.messenger_verify_token_or_default(),
            instagram_verify_token: config.instagram_verify_token_or_default(),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: SharedState) -> Router {
    let crm = Router::new()
        .nest("/users", users::routes())
        .nest("/contacts", contacts::routes())
        .nest("/organizations", contacts::organization_routes())
        .nest("/tags", catalog::tag_routes())
        .nest("/quick-replies", catalog::quick_reply_routes())
        .nest("/conversations", conversations::routes())
        .nest("/audit-logs", audit::routes())
        .nest("/reports", reports::routes())
        .route("/events", get(events::stream));

    Router::new()
        .route("/health", get(health))
        .nest("/api/tenants", tenants::routes())
        .nest("/api/n8n", n8n::routes())
        .nest("/api", crm)
        .nest("/webhooks", webhooks::routes())
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_server::spawn;

    #[tokio::test]
    async fn health_answers_ok() {
        let app = spawn().await;
        let res = app.client.get(app.at("/health")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }
}
