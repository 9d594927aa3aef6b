//! Outbound WhatsApp messages, from the N8N action API or from attendants.

use super::threading::{ensure_contact, ensure_conversation};
use crate::domain::inputs::check_phone;
use crate::domain::{
    Channel, Contact, Conversation, DomainError, Message, MessageDirection, MessageStatus,
    OutgoingMessage, Tenant,
};
use crate::ports::events::{CONVERSATION_NEW, MESSAGE_NEW};
use crate::ports::{
    ContactRepo, ConversationRepo, CrmEvent, EventPublisher, MessageRepo, WhatsAppCredentials,
    WhatsAppGateway,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

pub struct OutboundService {
    contacts: Arc<dyn ContactRepo>,
    conversations: Arc<dyn ConversationRepo>,
    messages: Arc<dyn MessageRepo>,
    gateway: Arc<dyn WhatsAppGateway>,
    events: Arc<dyn EventPublisher>,
}

impl OutboundService {
    pub fn new(
        contacts: Arc<dyn ContactRepo>,
        conversations: Arc<dyn ConversationRepo>,
        messages: Arc<dyn MessageRepo>,
        gateway: Arc<dyn WhatsAppGateway>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            contacts,
            conversations,
            messages,
            gateway,
            events,
        }
    }

    fn credentials(tenant: &Tenant) -> Result<WhatsAppCredentials, DomainError> {
        WhatsAppCredentials::of(tenant).ok_or_else(|| {
            DomainError::bad_request("WhatsApp is not configured for this tenant")
        })
    }

    /// Send to a phone number, threading the message into the contact's
    /// conversation. Returns the stored message.
    pub async fn send(
        &self,
        tenant: &Tenant,
        phone: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, DomainError> {
        message.validate()?;
        let credentials = Self::credentials(tenant)?;
        let phone: String = phone.chars().filter(char::is_ascii_digit).collect();
        check_phone(&phone)?;

        let contact =
            ensure_contact(self.contacts.as_ref(), &tenant.id, Channel::WhatsApp, &phone, None)
                .await?;
        let (conversation, is_new) =
            ensure_conversation(self.conversations.as_ref(), &tenant.id, &contact, Utc::now())
                .await?;
        self.deliver(tenant, &credentials, &contact, conversation, is_new, message)
            .await
    }

    /// Attendant reply inside an existing conversation. WhatsApp only.
    pub async fn reply(
        &self,
        tenant: &Tenant,
        conversation_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, DomainError> {
        message.validate()?;
        let conversation = self
            .conversations
            .get_conversation(&tenant.id, conversation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Conversation"))?;
        if conversation.channel != Channel::WhatsApp {
            return Err(DomainError::bad_request(format!(
                "replies are only supported on WhatsApp conversations (this one is {})",
                conversation.channel
            )));
        }
        let credentials = Self::credentials(tenant)?;
        let contact = self
            .contacts
            .get_contact(&tenant.id, &conversation.contact_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact"))?;
        self.deliver(tenant, &credentials, &contact, conversation, false, message)
            .await
    }

    /// Call the gateway and store the result. A gateway failure is stored as
    /// a FAILED message and then returned.
    async fn deliver(
        &self,
        tenant: &Tenant,
        credentials: &WhatsAppCredentials,
        contact: &Contact,
        conversation: Conversation,
        is_new: bool,
        outgoing: &OutgoingMessage,
    ) -> Result<Message, DomainError> {
        let to = contact
            .phone_number
            .clone()
            .unwrap_or_else(|| contact.external_id.clone());
        let sent = self.gateway.send_message(credentials, &to, outgoing).await;

        let record = outgoing.to_record();
        let now = Utc::now();
        let (external_id, status) = match &sent {
            Ok(wamid) => (Some(wamid.clone()), MessageStatus::Sent),
            Err(_) => (None, MessageStatus::Failed),
        };
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant.id.clone(),
            conversation_id: conversation.id.clone(),
            external_id,
            direction: MessageDirection::Outbound,
            message_type: record.message_type,
            content: record.content,
            metadata: record.metadata,
            status,
            timestamp: now,
        };
        self.messages.create_message(&message).await?;
        self.conversations
            .touch_conversation(&tenant.id, &conversation.id, now)
            .await?;

        self.events.publish(CrmEvent::new(
            &tenant.id,
            MESSAGE_NEW,
            json!({ "conversationId": conversation.id, "message": message }),
        ));
        if is_new {
            if let Some(view) = self
                .conversations
                .conversation_view(&tenant.id, &conversation.id)
                .await?
            {
                self.events
                    .publish(CrmEvent::new(&tenant.id, CONVERSATION_NEW, &view));
            }
        }

        match sent {
            Ok(wamid) => {
                info!(
                    tenant_id = %tenant.id,
                    conversation_id = %conversation.id,
                    wamid = %wamid,
                    "outbound message sent"
                );
                Ok(message)
            }
            Err(e) => {
                error!(
                    tenant_id = %tenant.id,
                    conversation_id = %conversation.id,
                    error = %e,
                    "outbound message failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::BroadcastEvents;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, tenant};
    use crate::adapters::persistence::SqliteRepo;
    use crate::domain::{MediaKind, MessageType, ReplyButton};
    use crate::ports::TenantRepo;
    use crate::usecases::test_doubles::FakeGateway;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup(gateway: FakeGateway) -> (TempDir, Arc<SqliteRepo>, Arc<FakeGateway>, Tenant, OutboundService) {
        let (dir, repo) = repo().await;
        let mut t = tenant("hotel-out");
        t.whatsapp_phone_number_id = Some("PN-1".into());
        t.whatsapp_access_token = Some("token".into());
        repo.create_tenant(&t).await.unwrap();
        let repo = Arc::new(repo);
        let gateway = Arc::new(gateway);
        let svc = OutboundService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            gateway.clone(),
            Arc::new(BroadcastEvents::new(16)),
        );
        (dir, repo, gateway, t, svc)
    }

    #[tokio::test]
    async fn send_threads_into_one_conversation() {
        let (_dir, repo, gateway, t, svc) = setup(FakeGateway::default()).await;
        let first = svc
            .send(&t, "+55 11 95555-4444", &OutgoingMessage::text("Reserva confirmada"))
            .await
            .unwrap();
        assert_eq!(first.status, MessageStatus::Sent);
        assert_eq!(first.external_id.as_deref(), Some("wamid.out.1"));
        assert_eq!(first.direction, MessageDirection::Outbound);

        let media = OutgoingMessage::Media {
            kind: MediaKind::Image,
            url: "https://cdn.test/room.jpg".into(),
            caption: Some("Suite".into()),
            filename: None,
        };
        let second = svc.send(&t, "5511955554444", &media).await.unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.message_type, MessageType::Image);
        assert_eq!(gateway.sent()[0].0, "5511955554444");

        let (stored, total) = repo.list_messages(&t.id, &first.conversation_id, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(stored[0].content, "Reserva confirmada");
    }

    #[tokio::test]
    async fn gateway_failure_is_stored_and_returned() {
        let (_dir, repo, _gateway, t, svc) = setup(FakeGateway::failing()).await;
        let err = svc
            .send(&t, "5511944443333", &OutgoingMessage::text("Oi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Gateway(_)));

        let contact = repo
            .find_contact_by_phone(&t.id, "5511944443333")
            .await
            .unwrap()
            .unwrap();
        let conv = repo
            .find_latest_conversation(&t.id, &contact.id, &crate::domain::ConversationStatus::ACTIVE)
            .await
            .unwrap()
            .unwrap();
        let (stored, _) = repo.list_messages(&t.id, &conv.id, 1, 10).await.unwrap();
        assert_eq!(stored[0].status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn slow_send_keeps_concurrent_board_changes() {
        let (_dir, repo, _gateway, t, svc) =
            setup(FakeGateway::slow(Duration::from_millis(400))).await;
        let first = svc
            .send(&t, "5511944445555", &OutgoingMessage::text("Oi"))
            .await
            .unwrap();

        let triage = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut conv = repo
                .get_conversation(&t.id, &first.conversation_id)
                .await
                .unwrap()
                .unwrap();
            conv.ia_locked = true;
            conv.priority = crate::domain::Priority::Urgent;
            repo.update_conversation(&conv).await.unwrap();
        };
        let reply_msg = OutgoingMessage::text("Já volto");
        let (second, ()) = tokio::join!(
            svc.reply(&t, &first.conversation_id, &reply_msg),
            triage
        );
        let second = second.unwrap();

        let conv = repo
            .get_conversation(&t.id, &first.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert!(conv.ia_locked);
        assert_eq!(conv.priority, crate::domain::Priority::Urgent);
        assert_eq!(
            conv.last_message_at.timestamp_millis(),
            second.timestamp.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn rejects_invalid_input_and_unconfigured_tenants() {
        let (_dir, repo, gateway, t, svc) = setup(FakeGateway::default()).await;
        let too_many = OutgoingMessage::Buttons {
            body: "Escolha".into(),
            buttons: (0..4)
                .map(|i| ReplyButton {
                    id: i.to_string(),
                    title: "Ok".into(),
                })
                .collect(),
            header: None,
            footer: None,
        };
        assert!(svc.send(&t, "5511933332222", &too_many).await.is_err());
        assert!(svc.send(&t, "123", &OutgoingMessage::text("Oi")).await.is_err());

        let bare = tenant("hotel-out-bare");
        repo.create_tenant(&bare).await.unwrap();
        let err = svc
            .send(&bare, "5511933332222", &OutgoingMessage::text("Oi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(m) if m.contains("not configured")));
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn reply_only_on_whatsapp_conversations() {
        let (_dir, repo, _gateway, t, svc) = setup(FakeGateway::default()).await;
        let sent = svc
            .send(&t, "5511922221111", &OutgoingMessage::text("Bem-vindo"))
            .await
            .unwrap();
        let reply = svc
            .reply(&t, &sent.conversation_id, &OutgoingMessage::text("Posso ajudar?"))
            .await
            .unwrap();
        assert_eq!(reply.conversation_id, sent.conversation_id);

        let ig = ensure_contact(repo.as_ref(), &t.id, Channel::Instagram, "IG-1", None)
            .await
            .unwrap();
        let (ig_conv, _) = ensure_conversation(repo.as_ref(), &t.id, &ig, Utc::now())
            .await
            .unwrap();
        assert!(svc
            .reply(&t, &ig_conv.id, &OutgoingMessage::text("Oi"))
            .await
            .is_err());
        assert!(svc.reply(&t, "missing", &OutgoingMessage::text("Oi")).await.is_err());
    }
}
