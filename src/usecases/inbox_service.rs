//! Inbound pipeline: webhook batches become contacts, conversations and
//! stored messages, and are handed to the tenant's automation.

use super::forward_service::ForwardService;
use super::threading::{ensure_contact, ensure_conversation};
use crate::domain::{
    build_payload, DomainError, InboundBatch, InboundMessage, Message, MessageDirection,
    MessageStatus, StatusReceipt, Tenant,
};
use crate::ports::events::{CONVERSATION_NEW, MESSAGE_NEW, MESSAGE_STATUS};
use crate::ports::{
    ContactRepo, ConversationRepo, CrmEvent, EventPublisher, MessageRepo, WhatsAppCredentials,
    WhatsAppGateway,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxReport {
    pub stored: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub forwarded: usize,
    pub receipts: usize,
}

enum Handled {
    Stored { forwarded: bool },
    Duplicate,
}

pub struct InboxService {
    contacts: Arc<dyn ContactRepo>,
    conversations: Arc<dyn ConversationRepo>,
    messages: Arc<dyn MessageRepo>,
    gateway: Arc<dyn WhatsAppGateway>,
    forwarder: Arc<ForwardService>,
    events: Arc<dyn EventPublisher>,
}

impl InboxService {
    pub fn new(
        contacts: Arc<dyn ContactRepo>,
        conversations: Arc<dyn ConversationRepo>,
        messages: Arc<dyn MessageRepo>,
        gateway: Arc<dyn WhatsAppGateway>,
        forwarder: Arc<ForwardService>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            contacts,
            conversations,
            messages,
            gateway,
            forwarder,
            events,
        }
    }

    /// Process a batch for one tenant. A failing message is logged and the
    /// rest of the batch continues.
    pub async fn receive(&self, tenant: &Tenant, batch: InboundBatch) -> InboxReport {
        let mut report = InboxReport::default();

        for err in &batch.errors {
            warn!(
                tenant_id = %tenant.id,
                code = err.code,
                title = %err.title,
                "platform reported an account error"
            );
        }

        for msg in batch.messages {
            let external_id = msg.external_id.clone();
            let channel = msg.channel;
            match self.handle_message(tenant, msg).await {
                Ok(Handled::Stored { forwarded }) => {
                    report.stored += 1;
                    if forwarded {
                        report.forwarded += 1;
                    }
                }
                Ok(Handled::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        tenant_id = %tenant.id,
                        channel = %channel,
                        external_id = %external_id,
                        error = %e,
                        "failed to process inbound message"
                    );
                }
            }
        }

        for receipt in batch.receipts {
            match self.apply_receipt(tenant, &receipt).await {
                Ok(true) => report.receipts += 1,
                Ok(false) => {}
                Err(e) => error!(
                    tenant_id = %tenant.id,
                    external_id = %receipt.external_id,
                    error = %e,
                    "failed to apply status receipt"
                ),
            }
        }

        info!(
            tenant_id = %tenant.id,
            stored = report.stored,
            duplicates = report.duplicates,
            failed = report.failed,
            receipts = report.receipts,
            "webhook batch processed"
        );
        report
    }

    async fn handle_message(
        &self,
        tenant: &Tenant,
        msg: InboundMessage,
    ) -> Result<Handled, DomainError> {
        if self
            .messages
            .message_exists(&tenant.id, &msg.external_id)
            .await?
        {
            debug!(tenant_id = %tenant.id, external_id = %msg.external_id, "duplicate message skipped");
            return Ok(Handled::Duplicate);
        }

        let contact = ensure_contact(
            self.contacts.as_ref(),
            &tenant.id,
            msg.channel,
            &msg.from,
            msg.profile_name.as_deref(),
        )
        .await?;
        let (conversation, is_new) =
            ensure_conversation(self.conversations.as_ref(), &tenant.id, &contact, Utc::now())
                .await?;

        let media_url = self.resolve_media(tenant, &msg).await;
        let channel = msg.channel;
        let external_id = msg.external_id.clone();
        let timestamp = msg.timestamp;
        let mut record = msg.into_record();
        if media_url.is_some() {
            record.metadata.media_url = media_url;
        }

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant.id.clone(),
            conversation_id: conversation.id.clone(),
            external_id: Some(external_id),
            direction: MessageDirection::Inbound,
            message_type: record.message_type,
            content: record.content,
            metadata: record.metadata,
            status: MessageStatus::Received,
            timestamp,
        };
        self.messages.create_message(&message).await?;

        self.conversations
            .touch_conversation(&tenant.id, &conversation.id, timestamp)
            .await?;
        // Board changes may have landed while the media URL was resolving.
        let conversation = self
            .conversations
            .get_conversation(&tenant.id, &conversation.id)
            .await?
            .unwrap_or(conversation);

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

        info!(
            tenant_id = %tenant.id,
            conversation_id = %conversation.id,
            message_id = %message.id,
            channel = %channel,
            kind = %message.message_type,
            "inbound message stored"
        );

        if conversation.ia_locked {
            debug!(conversation_id = %conversation.id, "IA locked, not forwarding");
            return Ok(Handled::Stored { forwarded: false });
        }
        let phone = contact
            .phone_number
            .clone()
            .unwrap_or_else(|| contact.external_id.clone());
        let payload = build_payload(
            &phone,
            &message,
            &conversation.id,
            contact.name.as_deref(),
            is_new,
            channel,
        );
        let outcome = self.forwarder.forward(&tenant.id, &payload).await;
        Ok(Handled::Stored {
            forwarded: outcome.success,
        })
    }

    /// Download URL for WhatsApp media ids. Best effort: failures are logged.
    async fn resolve_media(&self, tenant: &Tenant, msg: &InboundMessage) -> Option<String> {
        let media_id = msg.content.media_id()?;
        let credentials = WhatsAppCredentials::of(tenant)?;
        match self.gateway.media_url(&credentials, media_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(tenant_id = %tenant.id, media_id, error = %e, "could not resolve media URL");
                None
            }
        }
    }

    /// Returns whether a stored message was updated.
    async fn apply_receipt(
        &self,
        tenant: &Tenant,
        receipt: &StatusReceipt,
    ) -> Result<bool, DomainError> {
        if receipt.status == MessageStatus::Failed {
            let titles: Vec<&str> = receipt.errors.iter().map(|e| e.title.as_str()).collect();
            warn!(
                tenant_id = %tenant.id,
                external_id = %receipt.external_id,
                recipient = receipt.recipient.as_deref().unwrap_or(""),
                errors = %titles.join(", "),
                "message delivery failed"
            );
        }
        let Some(message) = self
            .messages
            .update_message_status(&tenant.id, &receipt.external_id, receipt.status)
            .await?
        else {
            debug!(external_id = %receipt.external_id, "receipt for unknown message");
            return Ok(false);
        };
        self.events.publish(CrmEvent::new(
            &tenant.id,
            MESSAGE_STATUS,
            json!({
                "messageId": message.id,
                "externalId": receipt.external_id,
                "conversationId": message.conversation_id,
                "status": message.status,
            }),
        ));
        Ok(true)
    }
}
