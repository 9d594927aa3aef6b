//! Maps WhatsApp wire messages to domain inbound messages.
//!
//! Keeps the Graph API shapes out of the inbox.

use super::webhook::{ChangeValue, WaMedia, WaMessage, WaReply, WaStatus, WebhookEnvelope};
use crate::domain::{
    ButtonSelection, Channel, FlowReply, InboundBatch, InboundContent, InboundMessage,
    ListSelection, MediaRef, MessageStatus, Reaction, Referral, SharedContact, StatusReceipt,
};
use chrono::{DateTime, Utc};

fn media_ref(media: &WaMedia) -> MediaRef {
    MediaRef {
        id: Some(media.id.clone()),
        url: None,
        mime_type: media.mime_type.clone(),
        sha256: media.sha256.clone(),
        caption: media.caption.clone(),
    }
}

fn button(reply: &WaReply) -> ButtonSelection {
    ButtonSelection {
        id: reply.id.clone(),
        title: reply.title.clone(),
    }
}

/// Unix seconds as sent by WhatsApp; falls back to now when malformed.
pub fn parse_timestamp(ts: &str) -> DateTime<Utc> {
    ts.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Classify one message by its `type` and body. The first matching branch wins.
pub fn classify(msg: &WaMessage) -> InboundContent {
    let kind = msg.kind.as_str();

    if let (Some(text), "text") = (&msg.text, kind) {
        return InboundContent::Text {
            body: text.body.clone(),
        };
    }
    if let (Some(media), "image") = (&msg.image, kind) {
        return InboundContent::Image(media_ref(media));
    }
    if let (Some(media), "video") = (&msg.video, kind) {
        return InboundContent::Video(media_ref(media));
    }
    if let (Some(media), "audio") = (&msg.audio, kind) {
        return InboundContent::Audio {
            media: media_ref(media),
            voice: media.voice.unwrap_or(false),
        };
    }
    if let (Some(media), "document") = (&msg.document, kind) {
        return InboundContent::Document {
            media: media_ref(media),
            filename: media.filename.clone(),
        };
    }
    if let (Some(loc), "location") = (&msg.location, kind) {
        return InboundContent::Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
            name: loc.name.clone(),
            address: loc.address.clone(),
        };
    }
    if let (Some(b), "button") = (&msg.button, kind) {
        // Template quick reply
        if let (Some(payload), Some(text)) = (&b.payload, &b.text) {
            return InboundContent::ButtonReply(ButtonSelection {
                id: payload.clone(),
                title: text.clone(),
            });
        }
        if let Some(reply) = &b.button_reply {
            return InboundContent::ButtonReply(button(reply));
        }
    }
    if let (Some(i), "interactive") = (&msg.interactive, kind) {
        if let Some(list) = &i.list_reply {
            return InboundContent::ListReply(ListSelection {
                id: list.id.clone(),
                title: list.title.clone(),
                description: list.description.clone(),
            });
        }
        if let Some(reply) = &i.button_reply {
            return InboundContent::ButtonReply(button(reply));
        }
        if let Some(flow) = &i.nfm_reply {
            let response_data = serde_json::from_str(&flow.response_json)
                .unwrap_or_else(|_| serde_json::json!({}));
            return InboundContent::FlowReply(FlowReply {
                flow_name: flow.name.clone().unwrap_or_else(|| "flow".to_string()),
                flow_token: response_data
                    .get("flow_token")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                response_data,
            });
        }
    }
    if let (Some(contacts), "contacts") = (&msg.contacts, kind) {
        return InboundContent::SharedContacts(
            contacts
                .iter()
                .map(|c| SharedContact {
                    name: c.name.as_ref().map(|n| n.formatted_name.clone()),
                    phones: c.phones.iter().map(|p| p.phone.clone()).collect(),
                    emails: c.emails.iter().map(|e| e.email.clone()).collect(),
                })
                .collect(),
        );
    }
    if let (Some(media), "sticker") = (&msg.sticker, kind) {
        return InboundContent::Sticker {
            media: media_ref(media),
            animated: media.animated.unwrap_or(false),
        };
    }
    if let (Some(r), "reaction") = (&msg.reaction, kind) {
        return InboundContent::Reaction(Reaction {
            message_id: r.message_id.clone(),
            emoji: r.emoji.clone().unwrap_or_default(),
        });
    }
    if let Some(errors) = msg.errors.as_ref().filter(|e| !e.is_empty()) {
        return InboundContent::Error(errors.clone());
    }

    InboundContent::Unsupported {
        kind: msg.kind.clone(),
        raw: serde_json::to_value(msg).unwrap_or(serde_json::Value::Null),
    }
}

/// Build the channel-agnostic inbound message, pulling the sender's profile
/// name from the change's `contacts` block.
pub fn to_inbound(value: &ChangeValue, msg: &WaMessage) -> InboundMessage {
    InboundMessage {
        channel: Channel::WhatsApp,
        from: msg.from.clone(),
        external_id: msg.id.clone(),
        timestamp: parse_timestamp(&msg.timestamp),
        profile_name: value.profile_name(&msg.from),
        content: classify(msg),
        context: msg.context.clone(),
        referral: msg.referral.as_ref().map(|r| Referral {
            source_url: r.source_url.clone(),
            source_type: r.source_type.clone(),
            source_id: r.source_id.clone(),
            headline: r.headline.clone(),
            body: r.body.clone(),
        }),
    }
}

/// Map a status receipt. Unknown status strings yield `None`.
pub fn to_receipt(status: &WaStatus) -> Option<StatusReceipt> {
    let mapped = match status.status.as_str() {
        "sent" => MessageStatus::Sent,
        "delivered" => MessageStatus::Delivered,
        "read" => MessageStatus::Read,
        "failed" => MessageStatus::Failed,
        "deleted" => MessageStatus::Deleted,
        _ => return None,
    };
    Some(StatusReceipt {
        external_id: status.id.clone(),
        status: mapped,
        recipient: status.recipient_id.clone(),
        timestamp: parse_timestamp(&status.timestamp),
        errors: status.errors.clone(),
    })
}

/// Collect the messages, receipts and errors of every `messages` change.
pub fn to_batch(envelope: &WebhookEnvelope) -> InboundBatch {
    let mut batch = InboundBatch::default();
    for value in envelope
        .entry
        .iter()
        .flat_map(|e| e.changes.iter())
        .filter(|c| c.field == "messages")
        .map(|c| &c.value)
    {
        batch
            .messages
            .extend(value.messages.iter().map(|m| to_inbound(value, m)));
        batch
            .receipts
            .extend(value.statuses.iter().filter_map(to_receipt));
        batch.errors.extend(value.errors.iter().cloned());
    }
    batch
}
