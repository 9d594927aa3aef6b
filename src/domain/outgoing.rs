//! Outgoing WhatsApp messages and their limits.

use crate::domain::{DomainError, MessageMetadata, MessageRecord, MessageType};
use serde::{Deserialize, Serialize};

pub const MAX_TEXT_LEN: usize = 4096;
pub const MAX_BUTTONS: usize = 3;
pub const MAX_BUTTON_TITLE: usize = 20;
pub const MAX_LIST_ROWS: usize = 10;
pub const MAX_ROW_TITLE: usize = 24;
pub const MAX_ROW_DESCRIPTION: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }

    fn message_type(&self) -> MessageType {
        match self {
            MediaKind::Image => MessageType::Image,
            MediaKind::Video => MessageType::Video,
            MediaKind::Audio => MessageType::Audio,
            MediaKind::Document => MessageType::Document,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub rows: Vec<ListRow>,
}

/// Message an attendant or a workflow sends to a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text {
        body: String,
    },
    Media {
        kind: MediaKind,
        url: String,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        filename: Option<String>,
    },
    Buttons {
        body: String,
        buttons: Vec<ReplyButton>,
        #[serde(default)]
        header: Option<String>,
        #[serde(default)]
        footer: Option<String>,
    },
    List {
        body: String,
        button: String,
        sections: Vec<ListSection>,
        #[serde(default)]
        header: Option<String>,
        #[serde(default)]
        footer: Option<String>,
    },
}

fn too_long(field: &str, value: &str, max: usize) -> Option<DomainError> {
    (value.chars().count() > max).then(|| {
        DomainError::bad_request(format!("{} must have at most {} characters", field, max))
    })
}

impl OutgoingMessage {
    pub fn text(body: impl Into<String>) -> Self {
        OutgoingMessage::Text { body: body.into() }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            OutgoingMessage::Text { body } => {
                if body.trim().is_empty() {
                    return Err(DomainError::bad_request("message is required"));
                }
                if let Some(e) = too_long("message", body, MAX_TEXT_LEN) {
                    return Err(e);
                }
            }
            OutgoingMessage::Media { url, .. } => {
                if !crate::domain::inputs::is_http_url(url) {
                    return Err(DomainError::bad_request("url must be an http(s) URL"));
                }
            }
            OutgoingMessage::Buttons { body, buttons, .. } => {
                if body.trim().is_empty() {
                    return Err(DomainError::bad_request("message is required"));
                }
                if buttons.is_empty() || buttons.len() > MAX_BUTTONS {
                    return Err(DomainError::bad_request("between 1 and 3 buttons required"));
                }
                for b in buttons {
                    if b.id.is_empty() || b.title.is_empty() {
                        return Err(DomainError::bad_request("button id and title are required"));
                    }
                    if let Some(e) = too_long("button title", &b.title, MAX_BUTTON_TITLE) {
                        return Err(e);
                    }
                }
            }
            OutgoingMessage::List {
                body,
                button,
                sections,
                ..
            } => {
                if body.trim().is_empty() {
                    return Err(DomainError::bad_request("message is required"));
                }
                if let Some(e) = too_long("button label", button, MAX_BUTTON_TITLE) {
                    return Err(e);
                }
                let rows: usize = sections.iter().map(|s| s.rows.len()).sum();
                if rows == 0 || rows > MAX_LIST_ROWS {
                    return Err(DomainError::bad_request("between 1 and 10 list rows required"));
                }
                for row in sections.iter().flat_map(|s| s.rows.iter()) {
                    if let Some(e) = too_long("row title", &row.title, MAX_ROW_TITLE) {
                        return Err(e);
                    }
                    if let Some(desc) = &row.description {
                        if let Some(e) = too_long("row description", desc, MAX_ROW_DESCRIPTION) {
                            return Err(e);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// What gets stored for this message in the conversation history.
    pub fn to_record(&self) -> MessageRecord {
        match self {
            OutgoingMessage::Text { body } => MessageRecord {
                message_type: MessageType::Text,
                content: body.clone(),
                metadata: MessageMetadata::default(),
            },
            OutgoingMessage::Media {
                kind,
                url,
                caption,
                filename,
            } => MessageRecord {
                message_type: kind.message_type(),
                content: caption.clone().unwrap_or_else(|| url.clone()),
                metadata: MessageMetadata {
                    media_url: Some(url.clone()),
                    caption: caption.clone(),
                    filename: filename.clone(),
                    ..Default::default()
                },
            },
            OutgoingMessage::Buttons { body, buttons, .. } => MessageRecord {
                message_type: MessageType::Interactive,
                content: body.clone(),
                metadata: MessageMetadata {
                    interactive_type: Some("button".to_string()),
                    raw_message: serde_json::to_value(buttons).ok(),
                    ..Default::default()
                },
            },
            OutgoingMessage::List { body, sections, .. } => MessageRecord {
                message_type: MessageType::Interactive,
                content: body.clone(),
                metadata: MessageMetadata {
                    interactive_type: Some("list".to_string()),
                    raw_message: serde_json::to_value(sections).ok(),
                    ..Default::default()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(id: &str, title: &str) -> ReplyButton {
        ReplyButton {
            id: id.into(),
            title: title.into(),
        }
    }

    #[test]
    fn buttons_are_limited_to_three() {
        let msg = OutgoingMessage::Buttons {
            body: "Choose".into(),
            buttons: (0..4).map(|i| button(&i.to_string(), "Ok")).collect(),
            header: None,
            footer: None,
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn button_title_limit() {
        let msg = OutgoingMessage::Buttons {
            body: "Choose".into(),
            buttons: vec![button("a", "This title is far too long")],
            header: None,
            footer: None,
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn list_needs_rows() {
        let msg = OutgoingMessage::List {
            body: "Pick a room".into(),
            button: "Rooms".into(),
            sections: vec![ListSection {
                title: None,
                rows: vec![],
            }],
            header: None,
            footer: None,
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn tagged_json_shape() {
        let msg: OutgoingMessage =
            serde_json::from_str(r#"{"type":"media","kind":"image","url":"https://x.io/a.jpg"}"#)
                .unwrap();
        assert!(matches!(
            msg,
            OutgoingMessage::Media {
                kind: MediaKind::Image,
                ..
            }
        ));
        assert_eq!(msg.to_record().message_type, MessageType::Image);
    }
}
