//! Port traits. API boundaries for the hexagon.
//!
//! - Repositories: tenant-scoped persistence
//! - Outbound: WhatsApp Cloud API, workflow webhooks
//! - Events: real-time notifications

pub mod events;
pub mod outbound;
pub mod repositories;

pub use events::{CrmEvent, EventPublisher};
pub use outbound::{WhatsAppCredentials, WhatsAppGateway, WorkflowWebhook};
pub use repositories::{
    AttendantTotals, AuditLogRepo, ContactRepo, ConversationRepo, MessageRepo, OrganizationRepo,
    QuickReplyRepo, ReportRepo, TagRepo, TenantRepo, UserRepo,
};
