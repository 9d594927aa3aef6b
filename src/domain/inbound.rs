//! Inbound message content as a tagged union, and its lowering to the stored record.
//!
//! Channel mappers (WhatsApp, Messenger/Instagram) produce `InboundMessage`;
//! the inbox stores `InboundMessage::into_record()`.

use crate::domain::{
    ButtonSelection, Channel, FlowReply, ListSelection, MessageContext, MessageError,
    MessageMetadata, MessageType, Reaction, Referral, SharedContact,
};
use chrono::{DateTime, Utc};

/// Reference to a media object: a platform media id (WhatsApp) or a direct URL (Messenger).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRef {
    pub id: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub caption: Option<String>,
}

impl MediaRef {
    fn content(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.url.clone())
            .unwrap_or_default()
    }

    fn into_metadata(self) -> MessageMetadata {
        MessageMetadata {
            media_url: self.url,
            mime_type: self.mime_type,
            sha256: self.sha256,
            caption: self.caption,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundContent {
    Text {
        body: String,
    },
    Image(MediaRef),
    Video(MediaRef),
    Audio {
        media: MediaRef,
        voice: bool,
    },
    Document {
        media: MediaRef,
        filename: Option<String>,
    },
    Sticker {
        media: MediaRef,
        animated: bool,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    ButtonReply(ButtonSelection),
    ListReply(ListSelection),
    FlowReply(FlowReply),
    SharedContacts(Vec<SharedContact>),
    Reaction(Reaction),
    Error(Vec<MessageError>),
    Unsupported {
        kind: String,
        raw: serde_json::Value,
    },
}

/// Stored triple: what goes into the `messages` row.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub message_type: MessageType,
    pub content: String,
    pub metadata: MessageMetadata,
}

impl InboundContent {
    pub fn into_record(self) -> MessageRecord {
        let (message_type, content, metadata) = match self {
            InboundContent::Text { body } => (MessageType::Text, body, MessageMetadata::default()),
            InboundContent::Image(media) => {
                (MessageType::Image, media.content(), media.into_metadata())
            }
            InboundContent::Video(media) => {
                (MessageType::Video, media.content(), media.into_metadata())
            }
            InboundContent::Audio { media, voice } => {
                let content = media.content();
                let metadata = MessageMetadata {
                    voice: Some(voice),
                    ..media.into_metadata()
                };
                (MessageType::Audio, content, metadata)
            }
            InboundContent::Document { media, filename } => {
                let content = media.content();
                let metadata = MessageMetadata {
                    filename,
                    ..media.into_metadata()
                };
                (MessageType::Document, content, metadata)
            }
            InboundContent::Sticker { media, animated } => {
                let content = media.content();
                let metadata = MessageMetadata {
                    animated: Some(animated),
                    is_sticker: true,
                    ..media.into_metadata()
                };
                (MessageType::Image, content, metadata)
            }
            InboundContent::Location {
                latitude,
                longitude,
                name,
                address,
            } => {
                let content =
                    serde_json::json!({ "latitude": latitude, "longitude": longitude }).to_string();
                let metadata = MessageMetadata {
                    name,
                    address,
                    ..Default::default()
                };
                (MessageType::Location, content, metadata)
            }
            InboundContent::ButtonReply(button) => {
                let content = button.title.clone();
                let metadata = MessageMetadata {
                    button: Some(button),
                    ..Default::default()
                };
                (MessageType::Text, content, metadata)
            }
            InboundContent::ListReply(list) => {
                let content = list.title.clone();
                let metadata = MessageMetadata {
                    list: Some(list),
                    ..Default::default()
                };
                (MessageType::Text, content, metadata)
            }
            InboundContent::FlowReply(flow) => {
                let content = format!("Flow response ({}): {}", flow.flow_name, flow.response_data);
                let metadata = MessageMetadata {
                    interactive_type: Some("nfm_reply".to_string()),
                    flow_reply: Some(flow),
                    ..Default::default()
                };
                (MessageType::Interactive, content, metadata)
            }
            InboundContent::SharedContacts(contacts) => {
                let names: Vec<&str> = contacts
                    .iter()
                    .map(|c| c.name.as_deref().unwrap_or(""))
                    .collect();
                let content = format!("[Shared contact: {}]", names.join(", "));
                let metadata = MessageMetadata {
                    contacts: Some(contacts),
                    ..Default::default()
                };
                (MessageType::Text, content, metadata)
            }
            InboundContent::Reaction(reaction) => {
                let content = reaction.emoji.clone();
                let metadata = MessageMetadata {
                    reaction: Some(reaction),
                    ..Default::default()
                };
                (MessageType::Other, content, metadata)
            }
            InboundContent::Error(errors) => {
                let titles: Vec<&str> = errors.iter().map(|e| e.title.as_str()).collect();
                let content = format!("[Error: {}]", titles.join(", "));
                let metadata = MessageMetadata {
                    errors: Some(errors),
                    ..Default::default()
                };
                (MessageType::Other, content, metadata)
            }
            InboundContent::Unsupported { kind, raw } => {
                let metadata = MessageMetadata {
                    raw_message: Some(raw),
                    ..Default::default()
                };
                (
                    MessageType::Text,
                    format!("[Unsupported type: {}]", kind),
                    metadata,
                )
            }
        };
        MessageRecord {
            message_type,
            content,
            metadata,
        }
    }

    /// Media id to resolve through the Graph API, if any.
    pub fn media_id(&self) -> Option<&str> {
        match self {
            InboundContent::Image(m)
            | InboundContent::Video(m)
            | InboundContent::Audio { media: m, .. }
            | InboundContent::Document { media: m, .. }
            | InboundContent::Sticker { media: m, .. } => m.id.as_deref(),
            _ => None,
        }
    }
}

/// One inbound message, channel-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub channel: Channel,
    /// Sender id on the channel (wa_id, PSID, IGSID).
    pub from: String,
    /// Platform message id, used for deduplication.
    pub external_id: String,
    pub timestamp: DateTime<Utc>,
    pub profile_name: Option<String>,
    pub content: InboundContent,
    pub context: Option<MessageContext>,
    pub referral: Option<Referral>,
}

impl InboundMessage {
    /// Lower to the stored record, carrying reply context and ad referral into metadata.
    pub fn into_record(self) -> MessageRecord {
        let mut record = self.content.into_record();
        if self.context.is_some() {
            record.metadata.context = self.context;
        }
        if self.referral.is_some() {
            record.metadata.referral = self.referral;
        }
        if self.channel != Channel::WhatsApp {
            record.metadata.source = Some(self.channel.as_str().to_string());
        }
        record
    }
}

/// Delivery receipt for a previously sent message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReceipt {
    pub external_id: String,
    pub status: crate::domain::MessageStatus,
    pub recipient: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<MessageError>,
}

/// Everything one webhook delivery carries for a single tenant.
#[derive(Debug, Clone, Default)]
pub struct InboundBatch {
    pub messages: Vec<InboundMessage>,
    pub receipts: Vec<StatusReceipt>,
    /// Account-level errors reported by the platform.
    pub errors: Vec<MessageError>,
}

impl InboundBatch {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.receipts.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_content_is_json_with_details_in_metadata() {
        let record = InboundContent::Location {
            latitude: -23.5,
            longitude: -46.6,
            name: Some("Hotel".into()),
            address: None,
        }
        .into_record();
        assert_eq!(record.message_type, MessageType::Location);
        let coords: serde_json::Value = serde_json::from_str(&record.content).unwrap();
        assert_eq!(coords["latitude"], -23.5);
        assert_eq!(record.metadata.name.as_deref(), Some("Hotel"));
    }

    #[test]
    fn sticker_is_stored_as_image() {
        let record = InboundContent::Sticker {
            media: MediaRef {
                id: Some("st-1".into()),
                mime_type: Some("image/webp".into()),
                ..Default::default()
            },
            animated: false,
        }
        .into_record();
        assert_eq!(record.message_type, MessageType::Image);
        assert_eq!(record.content, "st-1");
        assert!(record.metadata.is_sticker);
    }

    #[test]
    fn shared_contacts_render_names() {
        let record = InboundContent::SharedContacts(vec![
            SharedContact {
                name: Some("Ana".into()),
                phones: vec![],
                emails: vec![],
            },
            SharedContact {
                name: Some("Bruno".into()),
                phones: vec![],
                emails: vec![],
            },
        ])
        .into_record();
        assert_eq!(record.content, "[Shared contact: Ana, Bruno]");
    }

    #[test]
    fn referral_and_context_are_kept() {
        let msg = InboundMessage {
            channel: Channel::WhatsApp,
            from: "5511999999999".into(),
            external_id: "wamid.1".into(),
            timestamp: Utc::now(),
            profile_name: None,
            content: InboundContent::Text { body: "hi".into() },
            context: Some(MessageContext {
                id: Some("wamid.0".into()),
                ..Default::default()
            }),
            referral: Some(Referral {
                source_url: "https://fb.me/ad".into(),
                source_type: "ad".into(),
                source_id: None,
                headline: None,
                body: None,
            }),
        };
        let record = msg.into_record();
        assert!(record.metadata.context.is_some());
        assert!(record.metadata.referral.is_some());
        assert!(record.metadata.source.is_none());
    }
}
