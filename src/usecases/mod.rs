//! Application use cases. Orchestrate domain logic via ports.

pub mod audit_service;
pub mod catalog_service;
pub mod contact_service;
pub mod conversation_service;
pub mod forward_service;
pub mod inbox_service;
pub mod outbound_service;
pub mod report_service;
pub mod tenant_service;
mod threading;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_doubles;

pub use audit_service::AuditService;
pub use catalog_service::{QuickReplyService, TagService};
pub use contact_service::ContactService;
pub use conversation_service::ConversationService;
pub use forward_service::ForwardService;
pub use inbox_service::{InboxReport, InboxService};
pub use outbound_service::OutboundService;
pub use report_service::ReportService;
pub use tenant_service::TenantService;
pub use user_service::UserService;
