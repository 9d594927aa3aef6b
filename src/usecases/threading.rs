//! Contact and conversation lookup shared by the inbound and outbound paths.

use crate::domain::{
    Channel, Contact, Conversation, ConversationStatus, DomainError, Priority,
};
use crate::ports::{ContactRepo, ConversationRepo};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// A CLOSED conversation whose last message is this recent is reopened
/// instead of starting a new thread.
pub(crate) const REOPEN_WINDOW_MINUTES: i64 = 30;

/// Find the contact by its channel id, creating it on first contact.
/// A profile name carried by the webhook replaces the stored one.
pub(crate) async fn ensure_contact(
    contacts: &dyn ContactRepo,
    tenant_id: &str,
    channel: Channel,
    external_id: &str,
    profile_name: Option<&str>,
) -> Result<Contact, DomainError> {
    let profile_name = profile_name.map(str::trim).filter(|n| !n.is_empty());

    if let Some(mut contact) = contacts
        .find_contact_by_external(tenant_id, channel, external_id)
        .await?
    {
        if let Some(name) = profile_name {
            if contact.name.as_deref() != Some(name) {
                contact.name = Some(name.to_string());
                contact.updated_at = Utc::now();
                contacts.update_contact(&contact).await?;
                debug!(tenant_id, contact_id = %contact.id, "contact name refreshed");
            }
        }
        return Ok(contact);
    }

    let now = Utc::now();
    let contact = Contact {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        channel,
        external_id: external_id.to_string(),
        phone_number: (channel == Channel::WhatsApp).then(|| external_id.to_string()),
        name: profile_name.map(str::to_string),
        email: None,
        profile_picture_url: None,
        organization_id: None,
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
        conversations_count: 0,
        last_conversation_at: None,
    };
    contacts.create_contact(&contact).await?;
    info!(tenant_id, contact_id = %contact.id, channel = %channel, "contact created");
    Ok(contact)
}

/// The contact's active conversation, a recently closed one reopened as OPEN,
/// or a new one. The flag is true when the conversation was just created.
pub(crate) async fn ensure_conversation(
    conversations: &dyn ConversationRepo,
    tenant_id: &str,
    contact: &Contact,
    now: DateTime<Utc>,
) -> Result<(Conversation, bool), DomainError> {
    if let Some(active) = conversations
        .find_latest_conversation(tenant_id, &contact.id, &ConversationStatus::ACTIVE)
        .await?
    {
        return Ok((active, false));
    }

    if let Some(mut closed) = conversations
        .find_latest_conversation(tenant_id, &contact.id, &[ConversationStatus::Closed])
        .await?
    {
        if now - closed.last_message_at <= Duration::minutes(REOPEN_WINDOW_MINUTES) {
            closed.status = ConversationStatus::Open;
            closed.closed_at = None;
            conversations.update_conversation(&closed).await?;
            info!(tenant_id, conversation_id = %closed.id, "closed conversation reopened");
            return Ok((closed, false));
        }
    }

    let status = match contact.channel {
        Channel::WhatsApp => ConversationStatus::Open,
        Channel::Messenger | Channel::Instagram => ConversationStatus::BotHandling,
    };
    let conversation = Conversation {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        contact_id: contact.id.clone(),
        channel: contact.channel,
        status,
        priority: Priority::Medium,
        assigned_to_id: None,
        ia_locked: false,
        last_message_at: now,
        closed_at: None,
        created_at: now,
        tag_ids: Vec::new(),
    };
    conversations.create_conversation(&conversation).await?;
    info!(
        tenant_id,
        conversation_id = %conversation.id,
        status = %status,
        "conversation created"
    );
    Ok((conversation, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, seeded_tenant};

    #[tokio::test]
    async fn contact_is_created_once_and_name_refreshed() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-th").await;

        let first = ensure_contact(&repo, &t.id, Channel::WhatsApp, "5511988887777", Some("Ana"))
            .await
            .unwrap();
        assert_eq!(first.phone_number.as_deref(), Some("5511988887777"));

        let again = ensure_contact(&repo, &t.id, Channel::WhatsApp, "5511988887777", Some("Ana Paula"))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.name.as_deref(), Some("Ana Paula"));

        let ig = ensure_contact(&repo, &t.id, Channel::Instagram, "5511988887777", None)
            .await
            .unwrap();
        assert_ne!(ig.id, first.id);
        assert!(ig.phone_number.is_none());
    }

    #[tokio::test]
    async fn active_reused_recent_closed_reopened_old_closed_replaced() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-th2").await;
        let contact = ensure_contact(&repo, &t.id, Channel::WhatsApp, "5511977776666", None)
            .await
            .unwrap();
        let now = Utc::now();

        let (conv, is_new) = ensure_conversation(&repo, &t.id, &contact, now).await.unwrap();
        assert!(is_new);
        assert_eq!(conv.status, ConversationStatus::Open);

        let (same, is_new) = ensure_conversation(&repo, &t.id, &contact, now).await.unwrap();
        assert!(!is_new);
        assert_eq!(same.id, conv.id);

        let mut closed = same.clone();
        closed.status = ConversationStatus::Closed;
        closed.closed_at = Some(now);
        closed.last_message_at = now - Duration::minutes(10);
        repo.update_conversation(&closed).await.unwrap();

        let (reopened, is_new) = ensure_conversation(&repo, &t.id, &contact, now).await.unwrap();
        assert!(!is_new);
        assert_eq!(reopened.id, conv.id);
        assert_eq!(reopened.status, ConversationStatus::Open);
        assert!(reopened.closed_at.is_none());

        let mut stale = reopened.clone();
        stale.status = ConversationStatus::Closed;
        stale.closed_at = Some(now);
        stale.last_message_at = now - Duration::minutes(REOPEN_WINDOW_MINUTES + 5);
        repo.update_conversation(&stale).await.unwrap();

        let (fresh, is_new) = ensure_conversation(&repo, &t.id, &contact, now).await.unwrap();
        assert!(is_new);
        assert_ne!(fresh.id, conv.id);
    }

    #[tokio::test]
    async fn meta_channels_start_with_the_bot() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-th3").await;
        let contact = ensure_contact(&repo, &t.id, Channel::Messenger, "psid-1", Some("Caio"))
            .await
            .unwrap();
        let (conv, _) = ensure_conversation(&repo, &t.id, &contact, Utc::now())
            .await
            .unwrap();
        assert_eq!(conv.status, ConversationStatus::BotHandling);
        assert_eq!(conv.channel, Channel::Messenger);
    }
}
