//! Messenger and Instagram webhooks. Both use the Messenger Platform shape:
//! `{ object, entry: [{ id, messaging: [...] }] }`.

use crate::domain::{
    ButtonSelection, Channel, DomainError, InboundBatch, InboundContent, InboundMessage, MediaRef,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEnvelope {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<MessagingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEntry {
    /// Page id (Messenger) or Instagram account id.
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagingEvent {
    pub sender: Option<Party>,
    /// Milliseconds since epoch.
    pub timestamp: Option<i64>,
    pub message: Option<MetaMessage>,
    pub postback: Option<Postback>,
    pub delivery: Option<serde_json::Value>,
    pub read: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaMessage {
    pub mid: String,
    pub text: Option<String>,
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub mid: Option<String>,
    pub title: String,
    pub payload: String,
}

/// Webhook `object` expected for a channel.
pub fn expected_object(channel: Channel) -> &'static str {
    match channel {
        Channel::Instagram => "instagram",
        _ => "page",
    }
}

pub fn parse_messaging(body: &[u8], channel: Channel) -> Result<MessagingEnvelope, DomainError> {
    let envelope: MessagingEnvelope = serde_json::from_slice(body)
        .map_err(|e| DomainError::bad_request(format!("invalid webhook payload: {}", e)))?;
    if envelope.object != expected_object(channel) {
        return Err(DomainError::bad_request(format!(
            "unexpected webhook object: {}",
            envelope.object
        )));
    }
    Ok(envelope)
}

fn attachment_content(att: &Attachment) -> InboundContent {
    let url = att.payload.as_ref().and_then(|p| p.url.clone());
    let media = MediaRef {
        url: url.clone(),
        ..Default::default()
    };
    match att.kind.as_str() {
        "image" => InboundContent::Image(media),
        "video" => InboundContent::Video(media),
        "audio" => InboundContent::Audio {
            media,
            voice: false,
        },
        "file" => InboundContent::Document {
            media,
            filename: None,
        },
        other => InboundContent::Text {
            body: url.unwrap_or_else(|| format!("[{}]", other)),
        },
    }
}

/// Turn one messaging event into an inbound message.
///
/// Returns `None` for events the inbox does not store: delivery and read
/// receipts, echoes of our own sends, and events without a sender.
pub fn classify_messaging(channel: Channel, event: &MessagingEvent) -> Option<InboundMessage> {
    let sender = event.sender.as_ref()?.id.clone();
    let timestamp = event
        .timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    let (external_id, content) = if let Some(postback) = &event.postback {
        let id = postback
            .mid
            .clone()
            .unwrap_or_else(|| format!("postback-{}-{}", sender, timestamp.timestamp_millis()));
        (
            id,
            InboundContent::ButtonReply(ButtonSelection {
                id: postback.payload.clone(),
                title: postback.title.clone(),
            }),
        )
    } else if let Some(msg) = event.message.as_ref().filter(|m| !m.is_echo) {
        let content = if let Some(qr) = &msg.quick_reply {
            InboundContent::ButtonReply(ButtonSelection {
                id: qr.payload.clone(),
                title: msg.text.clone().unwrap_or_else(|| qr.payload.clone()),
            })
        } else if let Some(text) = msg.text.as_ref().filter(|t| !t.is_empty()) {
            InboundContent::Text { body: text.clone() }
        } else if let Some(att) = msg.attachments.first() {
            attachment_content(att)
        } else {
            return None;
        };
        (msg.mid.clone(), content)
    } else {
        if event.delivery.is_some() {
            debug!(channel = %channel, sender = %sender, "delivery receipt ignored");
        } else if event.read.is_some() {
            debug!(channel = %channel, sender = %sender, "read receipt ignored");
        }
        return None;
    };

    Some(InboundMessage {
        channel,
        from: sender,
        external_id,
        timestamp,
        profile_name: None,
        content,
        context: None,
        referral: None,
    })
}

/// Inbound messages of one entry. Receipts on these channels are not tracked.
pub fn to_batch(channel: Channel, entry: &MessagingEntry) -> InboundBatch {
    InboundBatch {
        messages: entry
            .messaging
            .iter()
            .filter_map(|event| classify_messaging(channel, event))
            .collect(),
        ..Default::default()
    }
}
