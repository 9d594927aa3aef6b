//! Request bodies of the N8N action API. The shapes follow what Z-API style
//! workflows already send; each converts into an [`OutgoingMessage`].

use crate::domain::{DomainError, ListRow, ListSection, MediaKind, OutgoingMessage, ReplyButton};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SendTextRequest {
    pub phone: String,
    pub message: String,
}

impl SendTextRequest {
    pub fn into_message(self) -> Result<(String, OutgoingMessage), DomainError> {
        Ok((self.phone, OutgoingMessage::text(self.message)))
    }
}

/// `"image": "https://..."` or `"image": { "url": ..., "caption": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MediaField {
    Url(String),
    Object {
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl MediaField {
    fn split(self) -> (String, Option<String>) {
        match self {
            MediaField::Url(url) => (url, None),
            MediaField::Object { url, caption } => (url, caption),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMediaRequest {
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub url: Option<String>,
    pub media_url: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub image: Option<MediaField>,
    pub video: Option<MediaField>,
    pub audio: Option<MediaField>,
    pub document: Option<MediaField>,
}

impl SendMediaRequest {
    /// Resolution order: `type` + `url`/`mediaUrl`, then the first of
    /// `image`, `video`, `audio`, `document`, then a bare `mediaUrl` as image.
    pub fn into_message(self) -> Result<(String, OutgoingMessage), DomainError> {
        let SendMediaRequest {
            phone,
            kind,
            url,
            media_url,
            caption,
            filename,
            image,
            video,
            audio,
            document,
        } = self;

        let explicit = kind.zip(url.clone().or_else(|| media_url.clone()));
        let (kind, url, inline_caption) = if let Some((kind, url)) = explicit {
            (kind, url, None)
        } else if let Some((kind, field)) = [
            (MediaKind::Image, image),
            (MediaKind::Video, video),
            (MediaKind::Audio, audio),
            (MediaKind::Document, document),
        ]
        .into_iter()
        .find_map(|(kind, field)| field.map(|f| (kind, f)))
        {
            let (url, caption) = field.split();
            (kind, url, caption)
        } else if let Some(url) = media_url {
            (MediaKind::Image, url, None)
        } else {
            return Err(DomainError::bad_request(
                "provide type and url, one of image/video/audio/document, or mediaUrl",
            ));
        };

        let message = OutgoingMessage::Media {
            kind,
            url,
            caption: caption.or(inline_caption),
            filename,
        };
        Ok((phone, message))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonInput {
    pub id: String,
    pub label: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendButtonsRequest {
    pub phone: String,
    pub message: String,
    pub buttons: Vec<ButtonInput>,
    /// Rendered as the interactive header.
    pub title: Option<String>,
    pub footer: Option<String>,
}

impl SendButtonsRequest {
    pub fn into_message(self) -> Result<(String, OutgoingMessage), DomainError> {
        let buttons = self
            .buttons
            .into_iter()
            .map(|b| {
                let title = b
                    .label
                    .or(b.title)
                    .or(b.text)
                    .ok_or_else(|| DomainError::bad_request(format!("button {} has no label", b.id)))?;
                Ok(ReplyButton { id: b.id, title })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        Ok((
            self.phone,
            OutgoingMessage::Buttons {
                body: self.message,
                buttons,
                header: self.title,
                footer: self.footer,
            },
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowInput {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl From<RowInput> for ListRow {
    fn from(r: RowInput) -> Self {
        ListRow {
            id: r.id,
            title: r.title,
            description: r.description,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionInput {
    pub title: Option<String>,
    pub rows: Vec<RowInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionList {
    pub title: Option<String>,
    pub button_label: Option<String>,
    pub options: Vec<RowInput>,
}

const DEFAULT_LIST_BUTTON: &str = "Ver opções";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendListRequest {
    pub phone: String,
    pub message: String,
    pub option_list: Option<OptionList>,
    pub button_text: Option<String>,
    pub sections: Option<Vec<SectionInput>>,
}

impl SendListRequest {
    /// `optionList` becomes a single section; explicit `sections` win when both are sent.
    pub fn into_message(self) -> Result<(String, OutgoingMessage), DomainError> {
        let (sections, label) = match (self.sections, self.option_list) {
            (Some(sections), list) => (
                sections
                    .into_iter()
                    .map(|s| ListSection {
                        title: s.title,
                        rows: s.rows.into_iter().map(ListRow::from).collect(),
                    })
                    .collect(),
                list.and_then(|l| l.button_label),
            ),
            (None, Some(list)) => (
                vec![ListSection {
                    title: list.title,
                    rows: list.options.into_iter().map(ListRow::from).collect(),
                }],
                list.button_label,
            ),
            (None, None) => {
                return Err(DomainError::bad_request("provide optionList or sections"));
            }
        };
        let button = self
            .button_text
            .or(label)
            .unwrap_or_else(|| DEFAULT_LIST_BUTTON.to_string());
        Ok((
            self.phone,
            OutgoingMessage::List {
                body: self.message,
                button,
                sections,
                header: None,
                footer: None,
            },
        ))
    }
}

/// `GET /api/n8n/check-ia-lock?phone=...` (`phoneNumber` also accepted).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IaLockQuery {
    pub phone: Option<String>,
    pub phone_number: Option<String>,
}

impl IaLockQuery {
    pub fn phone(&self) -> Result<&str, DomainError> {
        self.phone
            .as_deref()
            .or(self.phone_number.as_deref())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| DomainError::bad_request("query parameter phone is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse<T: serde::de::DeserializeOwned>(v: serde_json::Value) -> T {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn media_from_type_and_url_or_inline_object() {
        let req: SendMediaRequest = parse(json!({
            "phone": "5511999999999",
            "type": "document",
            "url": "https://cdn.test/v.pdf",
            "filename": "voucher.pdf"
        }));
        let (_, msg) = req.into_message().unwrap();
        assert!(matches!(
            msg,
            OutgoingMessage::Media { kind: MediaKind::Document, ref filename, .. }
                if filename.as_deref() == Some("voucher.pdf")
        ));

        let req: SendMediaRequest = parse(json!({
            "phone": "5511999999999",
            "image": { "url": "https://cdn.test/a.jpg", "caption": "Suite" }
        }));
        let (_, msg) = req.into_message().unwrap();
        assert_eq!(
            msg,
            OutgoingMessage::Media {
                kind: MediaKind::Image,
                url: "https://cdn.test/a.jpg".into(),
                caption: Some("Suite".into()),
                filename: None,
            }
        );

        let req: SendMediaRequest = parse(json!({ "phone": "5511", "video": "https://cdn.test/v.mp4" }));
        assert!(matches!(
            req.into_message().unwrap().1,
            OutgoingMessage::Media { kind: MediaKind::Video, .. }
        ));

        let req: SendMediaRequest = parse(json!({ "phone": "5511" }));
        assert!(req.into_message().is_err());
    }

    #[test]
    fn button_labels_accept_every_alias() {
        let req: SendButtonsRequest = parse(json!({
            "phone": "5511999999999",
            "message": "Confirma?",
            "buttons": [
                { "id": "a", "label": "Sim" },
                { "id": "b", "title": "Não" },
                { "id": "c", "text": "Talvez" }
            ],
            "title": "Reserva"
        }));
        let (_, msg) = req.into_message().unwrap();
        let OutgoingMessage::Buttons { buttons, header, .. } = msg else {
            panic!("expected buttons");
        };
        let titles: Vec<_> = buttons.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Sim", "Não", "Talvez"]);
        assert_eq!(header.as_deref(), Some("Reserva"));

        let bad: SendButtonsRequest = parse(json!({
            "phone": "5511", "message": "x", "buttons": [{ "id": "a" }]
        }));
        assert!(bad.into_message().is_err());
    }

    #[test]
    fn option_list_becomes_one_section() {
        let req: SendListRequest = parse(json!({
            "phone": "5511999999999",
            "message": "Escolha o quarto",
            "optionList": {
                "title": "Quartos",
                "buttonLabel": "Ver quartos",
                "options": [{ "id": "std", "title": "Standard", "description": "2 pessoas" }]
            }
        }));
        let (_, msg) = req.into_message().unwrap();
        let OutgoingMessage::List { button, sections, .. } = msg else {
            panic!("expected list");
        };
        assert_eq!(button, "Ver quartos");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title.as_deref(), Some("Quartos"));
        assert_eq!(sections[0].rows[0].description.as_deref(), Some("2 pessoas"));

        let none: SendListRequest = parse(json!({ "phone": "5511", "message": "x" }));
        assert!(none.into_message().is_err());
    }

    #[test]
    fn ia_lock_query_accepts_phone_number_alias() {
        let q = IaLockQuery {
            phone: None,
            phone_number: Some("5511".into()),
        };
        assert_eq!(q.phone().unwrap(), "5511");
        assert!(IaLockQuery::default().phone().is_err());
    }
}
