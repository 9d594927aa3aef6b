//! Payload forwarded to a tenant's N8N workflow for each inbound message.
//!
//! Field names are the ones the workflows already consume (camelCase). The
//! legacy `buttonResponseMessage` block is sent alongside `buttonReply`.

use crate::domain::{ButtonSelection, Channel, Message, MessageType, Tenant};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonResponse {
    pub selected_button_id: String,
    pub selected_button_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub selected_row_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct N8nPayload {
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_response_message: Option<ButtonResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_response_message: Option<ListResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<ButtonSelection>,
    pub message_id: String,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub conversation_id: String,
    pub is_new_conversation: bool,
    pub channel: Channel,
}

/// Result of a forward attempt. Forwarding never fails the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForwardOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize)]
struct Coordinates {
    latitude: f64,
    longitude: f64,
}

/// Build the workflow payload for a stored inbound message.
pub fn build_payload(
    phone: &str,
    message: &Message,
    conversation_id: &str,
    contact_name: Option<&str>,
    is_new_conversation: bool,
    channel: Channel,
) -> N8nPayload {
    let meta = &message.metadata;
    let mut payload = N8nPayload {
        phone: phone.to_string(),
        kind: "text".to_string(),
        text: None,
        image: None,
        video: None,
        audio: None,
        document: None,
        location: None,
        button_response_message: None,
        list_response_message: None,
        button_reply: None,
        message_id: message.id.clone(),
        timestamp: message.timestamp.timestamp(),
        contact_name: contact_name.filter(|n| !n.is_empty()).map(str::to_string),
        conversation_id: conversation_id.to_string(),
        is_new_conversation,
        channel,
    };
    let as_text = |payload: &mut N8nPayload| {
        payload.kind = "text".to_string();
        payload.text = Some(TextBody {
            message: message.content.clone(),
        });
    };

    match message.message_type {
        MessageType::Text => {
            as_text(&mut payload);
            if let Some(button) = &meta.button {
                payload.kind = "button_reply".to_string();
                payload.button_reply = Some(button.clone());
                payload.button_response_message = Some(ButtonResponse {
                    selected_button_id: button.id.clone(),
                    selected_button_text: button.title.clone(),
                });
            }
            if let Some(list) = &meta.list {
                payload.kind = "list".to_string();
                payload.list_response_message = Some(ListResponse {
                    selected_row_id: list.id.clone(),
                    title: list.title.clone(),
                    description: list.description.clone(),
                });
            }
        }
        MessageType::Image => {
            payload.kind = if meta.is_sticker { "sticker" } else { "image" }.to_string();
            payload.image = Some(MediaBody {
                url: meta.media_url.clone(),
                caption: meta.caption.clone(),
            });
        }
        MessageType::Video => {
            payload.kind = "video".to_string();
            payload.video = Some(MediaBody {
                url: meta.media_url.clone(),
                caption: meta.caption.clone(),
            });
        }
        MessageType::Audio => {
            payload.kind = "audio".to_string();
            payload.audio = Some(AudioBody {
                url: meta.media_url.clone(),
            });
        }
        MessageType::Document => {
            payload.kind = "document".to_string();
            payload.document = Some(DocumentBody {
                url: meta.media_url.clone(),
                filename: meta.filename.clone(),
                caption: meta.caption.clone(),
            });
        }
        MessageType::Location => match serde_json::from_str::<Coordinates>(&message.content) {
            Ok(coords) => {
                payload.kind = "location".to_string();
                payload.location = Some(LocationBody {
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    name: meta.name.clone(),
                    address: meta.address.clone(),
                });
            }
            Err(_) => as_text(&mut payload),
        },
        MessageType::Interactive | MessageType::Other => as_text(&mut payload),
    }
    payload
}

/// Webhook URL for a channel. Messenger and Instagram use their own URL when
/// set and fall back to the default one.
pub fn resolve_webhook_url(tenant: &Tenant, channel: Option<Channel>) -> Option<&str> {
    let specific = match channel {
        Some(Channel::Messenger) => tenant.n8n_webhook_url_messenger.as_deref(),
        Some(Channel::Instagram) => tenant.n8n_webhook_url_instagram.as_deref(),
        Some(Channel::WhatsApp) | None => None,
    };
    specific
        .filter(|u| !u.is_empty())
        .or_else(|| tenant.n8n_webhook_url.as_deref().filter(|u| !u.is_empty()))
}
