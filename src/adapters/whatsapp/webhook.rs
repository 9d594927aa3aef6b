//! WhatsApp Cloud API webhook wire types and envelope parsing.
//!
//! Field names follow the Graph API payload (snake_case). Only the parts the
//! inbox consumes are modelled; unknown fields are ignored by serde.

use crate::domain::{DomainError, MessageContext, MessageError};
use serde::{Deserialize, Serialize};

pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";
pub const WHATSAPP_PRODUCT: &str = "whatsapp";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// WhatsApp Business Account id.
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: String,
    pub metadata: Option<ValueMetadata>,
    #[serde(default)]
    pub contacts: Vec<WaContact>,
    #[serde(default)]
    pub messages: Vec<WaMessage>,
    #[serde(default)]
    pub statuses: Vec<WaStatus>,
    #[serde(default)]
    pub errors: Vec<MessageError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaContact {
    pub wa_id: String,
    pub profile: Option<WaProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaProfile {
    pub name: Option<String>,
}

/// One inbound message. `kind` is the Graph API `type` discriminator; the
/// matching optional field carries the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaMessage {
    pub from: String,
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<WaText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<WaMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<WaMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<WaMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<WaMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<WaMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<WaLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<WaSharedContact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<WaButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<WaInteractive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<WaReaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral: Option<WaReferral>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<MessageError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaText {
    pub body: String,
}

/// Media body shared by image, video, audio, document and sticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaMedia {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaSharedContact {
    #[serde(default)]
    pub name: Option<WaContactName>,
    #[serde(default)]
    pub phones: Vec<WaContactPhone>,
    #[serde(default)]
    pub emails: Vec<WaContactEmail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaContactName {
    pub formatted_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaContactPhone {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaContactEmail {
    pub email: String,
}

/// Template quick-reply button (`payload`/`text`) or the legacy
/// `button_reply` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<WaReply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaReply {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaInteractive {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<WaReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_reply: Option<WaReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfm_reply: Option<WaFlowReply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaFlowReply {
    pub response_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaReaction {
    pub message_id: String,
    /// Empty or absent when the reaction was removed.
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaReferral {
    pub source_url: String,
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Delivery receipt for a message we sent.
#[derive(Debug, Clone, Deserialize)]
pub struct WaStatus {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<MessageError>,
}

/// Parse a webhook body, rejecting anything that is not a WhatsApp Business
/// Account event.
pub fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, DomainError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| DomainError::bad_request(format!("invalid webhook payload: {}", e)))?;
    if envelope.object != WHATSAPP_OBJECT {
        return Err(DomainError::bad_request(format!(
            "unexpected webhook object: {}",
            envelope.object
        )));
    }
    for change in envelope.entry.iter().flat_map(|e| &e.changes) {
        if change.value.messaging_product != WHATSAPP_PRODUCT {
            return Err(DomainError::bad_request(format!(
                "unexpected messaging_product: {}",
                change.value.messaging_product
            )));
        }
    }
    Ok(envelope)
}

/// Meta subscription handshake. Returns the challenge to echo back when the
/// mode is `subscribe` and the token matches.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected: &str,
) -> Option<String> {
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge))
            if !expected.is_empty() && token == expected =>
        {
            Some(challenge.to_string())
        }
        _ => None,
    }
}

impl WebhookEnvelope {
    /// `phone_number_id` of the first change carrying metadata.
    pub fn phone_number_id(&self) -> Option<&str> {
        self.entry
            .iter()
            .flat_map(|e| &e.changes)
            .find_map(|c| c.value.metadata.as_ref())
            .map(|m| m.phone_number_id.as_str())
    }
}

impl ChangeValue {
    /// Profile name WhatsApp reports for `wa_id`.
    pub fn profile_name(&self, wa_id: &str) -> Option<String> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone())
    }
}
