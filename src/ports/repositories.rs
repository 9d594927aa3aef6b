//! Repository ports. Persistence of CRM data, always scoped by tenant.
//!
//! Implemented by `SqliteRepo`. A lookup that misses returns `Ok(None)` (or
//! `Ok(false)` for deletes); `Err` is reserved for storage failures.

use crate::domain::inputs::{AuditLogQuery, ContactQuery, ConversationQuery, QuickReplyQuery};
use crate::domain::{
    AuditLog, Channel, Contact, Conversation, ConversationStatus, ConversationView, DomainError,
    Message, MessageStatus, Organization, QuickReply, StatusCount, Tag, Tenant, TenantStatus, User,
};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait TenantRepo: Send + Sync {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<(), DomainError>;

    async fn get_tenant(&self, id: &str) -> Result<Option<Tenant>, DomainError>;

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError>;

    async fn find_tenant_by_email(&self, email: &str) -> Result<Option<Tenant>, DomainError>;

    /// Tenant owning a WhatsApp phone number id, Messenger page id or Instagram account id.
    async fn find_tenant_by_channel_account(
        &self,
        channel: Channel,
        account_id: &str,
    ) -> Result<Option<Tenant>, DomainError>;

    async fn list_tenants(
        &self,
        status: Option<TenantStatus>,
        search: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Tenant>, i64), DomainError>;

    /// Overwrite every mutable column of the row.
    async fn update_tenant(&self, tenant: &Tenant) -> Result<(), DomainError>;

    async fn delete_tenant(&self, id: &str) -> Result<bool, DomainError>;
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), DomainError>;

    async fn get_user(&self, tenant_id: &str, id: &str) -> Result<Option<User>, DomainError>;

    async fn find_user_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<User>, DomainError>;

    async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, DomainError>;
}

#[async_trait::async_trait]
pub trait ContactRepo: Send + Sync {
    async fn create_contact(&self, contact: &Contact) -> Result<(), DomainError>;

    async fn get_contact(&self, tenant_id: &str, id: &str) -> Result<Option<Contact>, DomainError>;

    async fn find_contact_by_external(
        &self,
        tenant_id: &str,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<Contact>, DomainError>;

    async fn find_contact_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, DomainError>;

    async fn find_contact_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<Contact>, DomainError>;

    async fn update_contact(&self, contact: &Contact) -> Result<(), DomainError>;

    async fn delete_contact(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError>;

    /// Page of contacts, each with `conversations_count` and `last_conversation_at`.
    async fn list_contacts(
        &self,
        tenant_id: &str,
        query: &ContactQuery,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Contact>, i64), DomainError>;

    /// Every contact of the tenant ordered by creation, for export.
    async fn all_contacts(&self, tenant_id: &str) -> Result<Vec<Contact>, DomainError>;
}

#[async_trait::async_trait]
pub trait OrganizationRepo: Send + Sync {
    async fn create_organization(&self, org: &Organization) -> Result<(), DomainError>;

    /// Includes `contacts_count`.
    async fn get_organization(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Organization>, DomainError>;

    async fn find_organization_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Organization>, DomainError>;

    async fn update_organization(&self, org: &Organization) -> Result<(), DomainError>;

    /// Deletes the organization and detaches its contacts in one transaction.
    async fn delete_organization(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError>;

    async fn list_organizations(
        &self,
        tenant_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Organization>, DomainError>;
}

#[async_trait::async_trait]
pub trait TagRepo: Send + Sync {
    async fn create_tag(&self, tag: &Tag) -> Result<(), DomainError>;

    async fn get_tag(&self, tenant_id: &str, id: &str) -> Result<Option<Tag>, DomainError>;

    /// Case-sensitive exact match within the tenant.
    async fn find_tag_by_name(&self, tenant_id: &str, name: &str)
    -> Result<Option<Tag>, DomainError>;

    async fn update_tag(&self, tag: &Tag) -> Result<(), DomainError>;

    async fn delete_tag(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError>;

    /// Ordered by name, each with `conversations_count`.
    async fn list_tags(&self, tenant_id: &str, search: Option<&str>)
    -> Result<Vec<Tag>, DomainError>;
}

#[async_trait::async_trait]
pub trait QuickReplyRepo: Send + Sync {
    async fn create_quick_reply(&self, reply: &QuickReply) -> Result<(), DomainError>;

    async fn get_quick_reply(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<QuickReply>, DomainError>;

    async fn find_quick_reply_by_shortcut(
        &self,
        tenant_id: &str,
        shortcut: &str,
    ) -> Result<Option<QuickReply>, DomainError>;

    async fn update_quick_reply(&self, reply: &QuickReply) -> Result<(), DomainError>;

    async fn delete_quick_reply(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError>;

    /// Ordered by category, order, title.
    async fn list_quick_replies(
        &self,
        tenant_id: &str,
        query: &QuickReplyQuery,
    ) -> Result<Vec<QuickReply>, DomainError>;
}

#[async_trait::async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), DomainError>;

    async fn get_conversation(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Conversation>, DomainError>;

    /// Newest conversation of the contact whose status is one of `statuses`.
    async fn find_latest_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        statuses: &[ConversationStatus],
    ) -> Result<Option<Conversation>, DomainError>;

    /// Overwrite status, priority, assignee, IA lock, last_message_at and closed_at.
    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), DomainError>;

    /// Move `last_message_at` forward to `at`; leaves every other column alone.
    async fn touch_conversation(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    async fn list_conversations(
        &self,
        tenant_id: &str,
        query: &ConversationQuery,
        statuses: &[ConversationStatus],
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ConversationView>, i64), DomainError>;

    async fn conversation_view(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<ConversationView>, DomainError>;

    async fn add_conversation_tag(
        &self,
        conversation_id: &str,
        tag_id: &str,
    ) -> Result<(), DomainError>;

    async fn remove_conversation_tag(
        &self,
        conversation_id: &str,
        tag_id: &str,
    ) -> Result<bool, DomainError>;

    /// Replace the tag set in one transaction.
    async fn set_conversation_tags(
        &self,
        conversation_id: &str,
        tag_ids: &[String],
    ) -> Result<(), DomainError>;

    async fn count_conversations_by_status(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<StatusCount>, DomainError>;
}

#[async_trait::async_trait]
pub trait MessageRepo: Send + Sync {
    async fn create_message(&self, message: &Message) -> Result<(), DomainError>;

    async fn message_exists(&self, tenant_id: &str, external_id: &str)
    -> Result<bool, DomainError>;

    /// Apply a delivery receipt. Returns the updated message, if known.
    async fn update_message_status(
        &self,
        tenant_id: &str,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, DomainError>;

    /// Oldest first.
    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Message>, i64), DomainError>;

    /// Mark inbound RECEIVED/DELIVERED messages as READ. Returns how many changed.
    async fn mark_conversation_read(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<u64, DomainError>;

    /// Unread inbound messages across active conversations.
    async fn count_unread(&self, tenant_id: &str) -> Result<i64, DomainError>;
}

#[async_trait::async_trait]
pub trait AuditLogRepo: Send + Sync {
    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<(), DomainError>;

    /// Newest first.
    async fn list_audit_logs(
        &self,
        tenant_id: &str,
        query: &AuditLogQuery,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<AuditLog>, i64), DomainError>;

    async fn get_audit_log(&self, tenant_id: &str, id: &str)
    -> Result<Option<AuditLog>, DomainError>;
}

/// One attendant's conversation totals over a window.
#[derive(Debug, Clone)]
pub struct AttendantTotals {
    pub user: User,
    pub conversations: i64,
    pub resolved: i64,
}

/// Aggregates for reporting. Windows are `[from, to)`.
#[async_trait::async_trait]
pub trait ReportRepo: Send + Sync {
    async fn count_conversations_created(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, DomainError>;

    async fn conversations_by_status_created(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatusCount>, DomainError>;

    /// Mean minutes between creation and close for conversations created in the window.
    async fn average_resolution_minutes(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, DomainError>;

    /// Every user of the tenant with totals of conversations assigned to them.
    async fn attendant_totals(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendantTotals>, DomainError>;

    /// Inbound message counts keyed by UTC hour (0..23). Hours without messages are absent.
    async fn inbound_by_hour(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(u32, i64)>, DomainError>;
}
