//! Kanban board operations on conversations.
//!
//! Every mutation publishes `conversation:updated` to the tenant's event stream.

use super::audit_service::AuditService;
use super::threading::{ensure_contact, ensure_conversation};
use crate::domain::inputs::{ConversationQuery, EscalateInput, NewAuditLog};
use crate::domain::{
    paging, BoardColumn, Channel, Conversation, ConversationDetail, ConversationStats,
    ConversationStatus, ConversationView, DomainError, IaLockStatus, Message, Page, Priority,
    UserStatus,
};
use crate::ports::events::CONVERSATION_UPDATED;
use crate::ports::{
    ContactRepo, ConversationRepo, CrmEvent, EventPublisher, MessageRepo, TagRepo, UserRepo,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Cards loaded per board column and messages loaded with a conversation.
const BOARD_COLUMN_LIMIT: u32 = 100;
const DETAIL_MESSAGE_LIMIT: u32 = 100;

pub struct ConversationService {
    conversations: Arc<dyn ConversationRepo>,
    messages: Arc<dyn MessageRepo>,
    contacts: Arc<dyn ContactRepo>,
    users: Arc<dyn UserRepo>,
    tags: Arc<dyn TagRepo>,
    events: Arc<dyn EventPublisher>,
    audit: Arc<AuditService>,
}

impl ConversationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversations: Arc<dyn ConversationRepo>,
        messages: Arc<dyn MessageRepo>,
        contacts: Arc<dyn ContactRepo>,
        users: Arc<dyn UserRepo>,
        tags: Arc<dyn TagRepo>,
        events: Arc<dyn EventPublisher>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            conversations,
            messages,
            contacts,
            users,
            tags,
            events,
            audit,
        }
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        query: &ConversationQuery,
    ) -> Result<Page<ConversationView>, DomainError> {
        let statuses = query.statuses()?;
        let (page, limit) = paging(query.page, query.limit);
        let (views, total) = self
            .conversations
            .list_conversations(tenant_id, query, &statuses, page, limit)
            .await?;
        Ok(Page::new(views, total, page, limit))
    }

    /// One column per active status, newest activity first.
    pub async fn board(&self, tenant_id: &str) -> Result<Vec<BoardColumn>, DomainError> {
        let query = ConversationQuery::default();
        let mut columns = Vec::with_capacity(ConversationStatus::ACTIVE.len());
        for status in ConversationStatus::ACTIVE {
            let (conversations, total) = self
                .conversations
                .list_conversations(tenant_id, &query, &[status], 1, BOARD_COLUMN_LIMIT)
                .await?;
            columns.push(BoardColumn {
                status,
                count: total.max(0) as usize,
                conversations,
            });
        }
        Ok(columns)
    }

    pub async fn view(&self, tenant_id: &str, id: &str) -> Result<ConversationView, DomainError> {
        self.conversations
            .conversation_view(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Conversation"))
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<ConversationDetail, DomainError> {
        let view = self.view(tenant_id, id).await?;
        let (messages, _) = self
            .messages
            .list_messages(tenant_id, id, 1, DETAIL_MESSAGE_LIMIT)
            .await?;
        Ok(ConversationDetail { view, messages })
    }

    pub async fn messages(
        &self,
        tenant_id: &str,
        id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Message>, DomainError> {
        self.load(tenant_id, id).await?;
        let (page, limit) = paging(page, limit);
        let (messages, total) = self
            .messages
            .list_messages(tenant_id, id, page, limit)
            .await?;
        Ok(Page::new(messages, total, page, limit))
    }

    async fn load(&self, tenant_id: &str, id: &str) -> Result<Conversation, DomainError> {
        self.conversations
            .get_conversation(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Conversation"))
    }

    async fn save(&self, conversation: &Conversation) -> Result<ConversationView, DomainError> {
        self.conversations.update_conversation(conversation).await?;
        self.publish_view(&conversation.tenant_id, &conversation.id)
            .await
    }

    /// Reload the card and announce it. Tag changes go through here so the
    /// conversation row itself is not rewritten.
    async fn publish_view(&self, tenant_id: &str, id: &str) -> Result<ConversationView, DomainError> {
        let view = self.view(tenant_id, id).await?;
        self.events
            .publish(CrmEvent::new(tenant_id, CONVERSATION_UPDATED, &view));
        Ok(view)
    }

    fn apply_status(conversation: &mut Conversation, status: ConversationStatus) {
        match status {
            ConversationStatus::Closed => {
                conversation.closed_at.get_or_insert_with(Utc::now);
            }
            ConversationStatus::Archived => {}
            _ => conversation.closed_at = None,
        }
        conversation.status = status;
    }

    /// Set the status. CLOSED stamps `closed_at`; active statuses clear it.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        id: &str,
        status: ConversationStatus,
    ) -> Result<ConversationView, DomainError> {
        let mut conversation = self.load(tenant_id, id).await?;
        Self::apply_status(&mut conversation, status);
        let view = self.save(&conversation).await?;
        info!(tenant_id, conversation_id = id, status = %status, "conversation status updated");
        Ok(view)
    }

    /// Drag on the board: a status change recorded in the audit log.
    pub async fn move_to(
        &self,
        tenant_id: &str,
        id: &str,
        status: ConversationStatus,
        user_id: Option<&str>,
    ) -> Result<ConversationView, DomainError> {
        let mut conversation = self.load(tenant_id, id).await?;
        let from = conversation.status;
        Self::apply_status(&mut conversation, status);
        let view = self.save(&conversation).await?;
        self.audit.record(NewAuditLog {
            tenant_id: Some(tenant_id.to_string()),
            user_id: user_id.map(str::to_string),
            action: "MOVE".to_string(),
            entity: "Conversation".to_string(),
            entity_id: Some(id.to_string()),
            old_data: Some(json!({ "status": from })),
            new_data: Some(json!({ "status": status })),
            metadata: None,
        });
        info!(tenant_id, conversation_id = id, from = %from, to = %status, "conversation moved");
        Ok(view)
    }

    pub async fn archive(&self, tenant_id: &str, id: &str) -> Result<ConversationView, DomainError> {
        self.update_status(tenant_id, id, ConversationStatus::Archived)
            .await
    }

    /// Assign to an ACTIVE user of the tenant. An OPEN conversation moves to IN_PROGRESS.
    pub async fn assign(
        &self,
        tenant_id: &str,
        id: &str,
        user_id: &str,
    ) -> Result<ConversationView, DomainError> {
        let user = self
            .users
            .get_user(tenant_id, user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User"))?;
        if user.status != UserStatus::Active {
            return Err(DomainError::bad_request("user is not active"));
        }
        let mut conversation = self.load(tenant_id, id).await?;
        let previous = conversation.assigned_to_id.clone();
        conversation.assigned_to_id = Some(user.id.clone());
        if conversation.status == ConversationStatus::Open {
            conversation.status = ConversationStatus::InProgress;
        }
        let view = self.save(&conversation).await?;
        self.audit.record(NewAuditLog {
            tenant_id: Some(tenant_id.to_string()),
            action: "ASSIGN".to_string(),
            entity: "Conversation".to_string(),
            entity_id: Some(id.to_string()),
            old_data: Some(json!({ "assignedToId": previous })),
            new_data: Some(json!({ "assignedToId": user.id })),
            ..Default::default()
        });
        info!(tenant_id, conversation_id = id, user_id, "conversation assigned");
        Ok(view)
    }

    /// Remove the assignee; an active conversation goes back to OPEN.
    pub async fn unassign(&self, tenant_id: &str, id: &str) -> Result<ConversationView, DomainError> {
        let mut conversation = self.load(tenant_id, id).await?;
        conversation.assigned_to_id = None;
        if conversation.status.is_active() {
            conversation.status = ConversationStatus::Open;
        }
        let view = self.save(&conversation).await?;
        info!(tenant_id, conversation_id = id, "conversation unassigned");
        Ok(view)
    }

    pub async fn set_priority(
        &self,
        tenant_id: &str,
        id: &str,
        priority: Priority,
    ) -> Result<ConversationView, DomainError> {
        let mut conversation = self.load(tenant_id, id).await?;
        conversation.priority = priority;
        let view = self.save(&conversation).await?;
        info!(tenant_id, conversation_id = id, priority = %priority, "conversation priority set");
        Ok(view)
    }

    async fn check_tag(&self, tenant_id: &str, tag_id: &str) -> Result<(), DomainError> {
        match self.tags.get_tag(tenant_id, tag_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("Tag")),
        }
    }

    /// Replace the tag set. Every tag must belong to the tenant.
    pub async fn set_tags(
        &self,
        tenant_id: &str,
        id: &str,
        tag_ids: &[String],
    ) -> Result<ConversationView, DomainError> {
        let conversation = self.load(tenant_id, id).await?;
        let mut unique: Vec<String> = Vec::with_capacity(tag_ids.len());
        for tag_id in tag_ids {
            if !unique.contains(tag_id) {
                self.check_tag(tenant_id, tag_id).await?;
                unique.push(tag_id.clone());
            }
        }
        self.conversations
            .set_conversation_tags(&conversation.id, &unique)
            .await?;
        info!(tenant_id, conversation_id = id, tags = unique.len(), "conversation tags replaced");
        self.publish_view(tenant_id, &conversation.id).await
    }

    pub async fn add_tag(
        &self,
        tenant_id: &str,
        id: &str,
        tag_id: &str,
    ) -> Result<ConversationView, DomainError> {
        let conversation = self.load(tenant_id, id).await?;
        self.check_tag(tenant_id, tag_id).await?;
        self.conversations
            .add_conversation_tag(&conversation.id, tag_id)
            .await?;
        info!(tenant_id, conversation_id = id, tag_id, "conversation tagged");
        self.publish_view(tenant_id, &conversation.id).await
    }

    pub async fn remove_tag(
        &self,
        tenant_id: &str,
        id: &str,
        tag_id: &str,
    ) -> Result<ConversationView, DomainError> {
        let conversation = self.load(tenant_id, id).await?;
        if !self
            .conversations
            .remove_conversation_tag(&conversation.id, tag_id)
            .await?
        {
            return Err(DomainError::not_found("Tag"));
        }
        info!(tenant_id, conversation_id = id, tag_id, "conversation tag removed");
        self.publish_view(tenant_id, &conversation.id).await
    }

    /// Lock or unlock the automation for this conversation.
    pub async fn set_ia_lock(
        &self,
        tenant_id: &str,
        id: &str,
        locked: bool,
    ) -> Result<ConversationView, DomainError> {
        let mut conversation = self.load(tenant_id, id).await?;
        conversation.ia_locked = locked;
        let view = self.save(&conversation).await?;
        info!(tenant_id, conversation_id = id, locked, "IA lock changed");
        Ok(view)
    }

    pub async fn stats(&self, tenant_id: &str) -> Result<ConversationStats, DomainError> {
        let by_status = self
            .conversations
            .count_conversations_by_status(tenant_id)
            .await?;
        let total = by_status.iter().map(|s| s.count).sum();
        let unread = self.messages.count_unread(tenant_id).await?;
        Ok(ConversationStats {
            total,
            by_status,
            unread,
        })
    }

    /// Mark inbound messages as read. Returns how many changed.
    pub async fn mark_read(&self, tenant_id: &str, id: &str) -> Result<u64, DomainError> {
        let conversation = self.load(tenant_id, id).await?;
        let changed = self
            .messages
            .mark_conversation_read(tenant_id, &conversation.id)
            .await?;
        if changed > 0 {
            self.save(&conversation).await?;
        }
        Ok(changed)
    }

    /// Lock state of the contact's active conversation, by phone or channel id.
    pub async fn ia_lock_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<IaLockStatus, DomainError> {
        let id: String = phone.chars().filter(char::is_ascii_digit).collect();
        let mut contact = self.contacts.find_contact_by_phone(tenant_id, &id).await?;
        for channel in [Channel::Messenger, Channel::Instagram] {
            if contact.is_some() {
                break;
            }
            contact = self
                .contacts
                .find_contact_by_external(tenant_id, channel, phone.trim())
                .await?;
        }
        let Some(contact) = contact else {
            return Ok(IaLockStatus {
                locked: false,
                conversation_id: None,
            });
        };
        let active = self
            .conversations
            .find_latest_conversation(tenant_id, &contact.id, &ConversationStatus::ACTIVE)
            .await?;
        Ok(match active {
            Some(c) => IaLockStatus {
                locked: c.ia_locked,
                conversation_id: Some(c.id),
            },
            None => IaLockStatus {
                locked: false,
                conversation_id: None,
            },
        })
    }

    /// Hand the contact's conversation to a human: IA locked, status OPEN,
    /// priority HIGH unless given. Creates contact and conversation as needed.
    pub async fn escalate(
        &self,
        tenant_id: &str,
        input: &EscalateInput,
    ) -> Result<ConversationView, DomainError> {
        let phone = input.phone_digits()?;
        let contact = match self.contacts.find_contact_by_phone(tenant_id, &phone).await? {
            Some(c) => c,
            None => {
                ensure_contact(self.contacts.as_ref(), tenant_id, Channel::WhatsApp, &phone, None)
                    .await?
            }
        };
        let now = Utc::now();
        let (mut conversation, _) =
            ensure_conversation(self.conversations.as_ref(), tenant_id, &contact, now).await?;
        conversation.status = ConversationStatus::Open;
        conversation.closed_at = None;
        conversation.ia_locked = true;
        conversation.priority = input.priority.unwrap_or(Priority::High);
        conversation.last_message_at = now;
        let view = self.save(&conversation).await?;

        let reason = input.reason.clone().unwrap_or_else(|| "OTHER".to_string());
        self.audit.record(NewAuditLog {
            tenant_id: Some(tenant_id.to_string()),
            action: "ESCALATE".to_string(),
            entity: "Conversation".to_string(),
            entity_id: Some(conversation.id.clone()),
            metadata: Some(json!({ "reason": reason, "reasonDetail": input.reason_detail })),
            ..Default::default()
        });
        info!(
            tenant_id,
            conversation_id = %conversation.id,
            phone = %phone,
            reason = %reason,
            "conversation escalated to a human"
        );
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::BroadcastEvents;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, seeded_tenant};
    use crate::adapters::persistence::SqliteRepo;
    use crate::domain::{Role, Tag, Tenant, User};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        repo: Arc<SqliteRepo>,
        bus: Arc<BroadcastEvents>,
        tenant: Tenant,
        svc: ConversationService,
    }

    async fn fixture() -> Fixture {
        let (dir, repo) = repo().await;
        let tenant = seeded_tenant(&repo, "hotel-kb").await;
        let repo = Arc::new(repo);
        let bus = Arc::new(BroadcastEvents::new(32));
        let svc = ConversationService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            bus.clone(),
            Arc::new(AuditService::new(repo.clone())),
        );
        Fixture {
            _dir: dir,
            repo,
            bus,
            tenant,
            svc,
        }
    }

    async fn open_conversation(f: &Fixture, phone: &str) -> Conversation {
        let contact = ensure_contact(f.repo.as_ref(), &f.tenant.id, Channel::WhatsApp, phone, None)
            .await
            .unwrap();
        ensure_conversation(f.repo.as_ref(), &f.tenant.id, &contact, Utc::now())
            .await
            .unwrap()
            .0
    }

    async fn user(f: &Fixture, status: UserStatus) -> User {
        let u = User {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: f.tenant.id.clone(),
            name: "Rita".into(),
            email: format!("{}@hotel.test", uuid::Uuid::new_v4().simple()),
            role: Role::Attendant,
            status,
            created_at: Utc::now(),
        };
        f.repo.create_user(&u).await.unwrap();
        u
    }

    #[tokio::test]
    async fn status_changes_stamp_and_clear_closed_at() {
        let f = fixture().await;
        let conv = open_conversation(&f, "5511900000001").await;
        let mut rx = f.bus.subscribe();

        let closed = f
            .svc
            .update_status(&f.tenant.id, &conv.id, ConversationStatus::Closed)
            .await
            .unwrap();
        assert!(closed.conversation.closed_at.is_some());
        assert_eq!(rx.recv().await.unwrap().event, CONVERSATION_UPDATED);

        let moved = f
            .svc
            .move_to(&f.tenant.id, &conv.id, ConversationStatus::Waiting, None)
            .await
            .unwrap();
        assert_eq!(moved.conversation.status, ConversationStatus::Waiting);
        assert!(moved.conversation.closed_at.is_none());
    }

    #[tokio::test]
    async fn assign_requires_active_user_and_starts_progress() {
        let f = fixture().await;
        let conv = open_conversation(&f, "5511900000002").await;
        let inactive = user(&f, UserStatus::Inactive).await;
        assert!(f.svc.assign(&f.tenant.id, &conv.id, &inactive.id).await.is_err());
        assert!(f.svc.assign(&f.tenant.id, &conv.id, "nobody").await.is_err());

        let rita = user(&f, UserStatus::Active).await;
        let view = f.svc.assign(&f.tenant.id, &conv.id, &rita.id).await.unwrap();
        assert_eq!(view.conversation.status, ConversationStatus::InProgress);
        assert_eq!(view.conversation.assigned_to_id.as_deref(), Some(rita.id.as_str()));

        let view = f.svc.unassign(&f.tenant.id, &conv.id).await.unwrap();
        assert_eq!(view.conversation.status, ConversationStatus::Open);
        assert!(view.conversation.assigned_to_id.is_none());
    }

    #[tokio::test]
    async fn tags_must_belong_to_the_tenant() {
        let f = fixture().await;
        let conv = open_conversation(&f, "5511900000003").await;
        let other = seeded_tenant(&f.repo, "hotel-kb-other").await;
        let foreign = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: other.id.clone(),
            name: "VIP".into(),
            color: "#FF0000".into(),
            created_at: Utc::now(),
            conversations_count: 0,
        };
        f.repo.create_tag(&foreign).await.unwrap();
        let own = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: f.tenant.id.clone(),
            ..foreign.clone()
        };
        f.repo.create_tag(&own).await.unwrap();

        assert!(f.svc.add_tag(&f.tenant.id, &conv.id, &foreign.id).await.is_err());

        // Tagging leaves the rest of the row as stored.
        let mut locked = conv.clone();
        locked.ia_locked = true;
        f.repo.update_conversation(&locked).await.unwrap();
        let mut rx = f.bus.subscribe();
        let view = f
            .svc
            .set_tags(&f.tenant.id, &conv.id, &[own.id.clone(), own.id.clone()])
            .await
            .unwrap();
        assert_eq!(view.tags.len(), 1);
        assert!(view.conversation.ia_locked);
        assert_eq!(rx.recv().await.unwrap().event, CONVERSATION_UPDATED);

        let view = f.svc.remove_tag(&f.tenant.id, &conv.id, &own.id).await.unwrap();
        assert!(view.tags.is_empty());
        assert!(f.svc.remove_tag(&f.tenant.id, &conv.id, &own.id).await.is_err());
    }

    #[tokio::test]
    async fn board_has_a_column_per_active_status() {
        let f = fixture().await;
        open_conversation(&f, "5511900000004").await;
        let board = f.svc.board(&f.tenant.id).await.unwrap();
        let statuses: Vec<_> = board.iter().map(|c| c.status).collect();
        assert_eq!(statuses, ConversationStatus::ACTIVE.to_vec());
        let open = board.iter().find(|c| c.status == ConversationStatus::Open).unwrap();
        assert_eq!(open.count, 1);

        let stats = f.svc.stats(&f.tenant.id).await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn escalate_locks_ia_and_lock_check_sees_it() {
        let f = fixture().await;
        let before = f.svc.ia_lock_by_phone(&f.tenant.id, "5511900000005").await.unwrap();
        assert!(!before.locked);
        assert!(before.conversation_id.is_none());

        let input = EscalateInput {
            phone: Some("+55 11 90000-0005".into()),
            reason: Some("USER_REQUESTED".into()),
            ..Default::default()
        };
        let view = f.svc.escalate(&f.tenant.id, &input).await.unwrap();
        assert!(view.conversation.ia_locked);
        assert_eq!(view.conversation.priority, Priority::High);
        assert_eq!(view.conversation.status, ConversationStatus::Open);

        let after = f.svc.ia_lock_by_phone(&f.tenant.id, "5511900000005").await.unwrap();
        assert!(after.locked);
        assert_eq!(after.conversation_id.as_deref(), Some(view.conversation.id.as_str()));

        let unlocked = f
            .svc
            .set_ia_lock(&f.tenant.id, &view.conversation.id, false)
            .await
            .unwrap();
        assert!(!unlocked.conversation.ia_locked);
    }
}
