//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP or DB types here. Adapters map wire and row formats into these.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Enum stored as text in the database and serialized with the same spelling on the wire.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(DomainError::BadRequest(format!(
                        "invalid {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(TenantStatus {
    Trial => "TRIAL",
    Active => "ACTIVE",
    Suspended => "SUSPENDED",
    Cancelled => "CANCELLED",
});

text_enum!(Plan {
    Basic => "BASIC",
    Pro => "PRO",
    Enterprise => "ENTERPRISE",
});

text_enum!(Role {
    TenantAdmin => "TENANT_ADMIN",
    Attendant => "ATTENDANT",
});

text_enum!(UserStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

text_enum!(
    /// Messaging channel a contact/conversation lives on.
    Channel {
        WhatsApp => "whatsapp",
        Messenger => "messenger",
        Instagram => "instagram",
    }
);

text_enum!(
    /// Kanban column of a conversation.
    ConversationStatus {
        BotHandling => "BOT_HANDLING",
        Open => "OPEN",
        InProgress => "IN_PROGRESS",
        Waiting => "WAITING",
        Closed => "CLOSED",
        Archived => "ARCHIVED",
    }
);

text_enum!(Priority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

text_enum!(MessageDirection {
    Inbound => "INBOUND",
    Outbound => "OUTBOUND",
});

text_enum!(
    /// Stored message kind. `Other` covers everything without a dedicated branch.
    MessageType {
        Text => "TEXT",
        Image => "IMAGE",
        Video => "VIDEO",
        Audio => "AUDIO",
        Document => "DOCUMENT",
        Location => "LOCATION",
        Interactive => "INTERACTIVE",
        Other => "OTHER",
    }
);

text_enum!(MessageStatus {
    Received => "RECEIVED",
    Sent => "SENT",
    Delivered => "DELIVERED",
    Read => "READ",
    Failed => "FAILED",
    Deleted => "DELETED",
});

impl ConversationStatus {
    /// Statuses in which a conversation still accepts new inbound messages.
    pub const ACTIVE: [ConversationStatus; 4] = [
        ConversationStatus::BotHandling,
        ConversationStatus::Open,
        ConversationStatus::InProgress,
        ConversationStatus::Waiting,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl MessageStatus {
    /// Receipts can arrive out of order; never move back from READ to DELIVERED.
    /// FAILED and DELETED always apply.
    pub fn advances_to(&self, next: MessageStatus) -> bool {
        fn rank(s: MessageStatus) -> u8 {
            match s {
                MessageStatus::Received | MessageStatus::Sent => 0,
                MessageStatus::Delivered => 1,
                MessageStatus::Read => 2,
                MessageStatus::Failed | MessageStatus::Deleted => 3,
            }
        }
        matches!(next, MessageStatus::Failed | MessageStatus::Deleted) || rank(next) > rank(*self)
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::WhatsApp
    }
}

/// A hotel account. All CRM data is partitioned by tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub status: TenantStatus,
    pub plan: Plan,
    pub max_attendants: i64,
    pub max_messages: i64,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    #[serde(skip_serializing, default)]
    pub whatsapp_access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub whatsapp_app_secret: Option<String>,
    #[serde(skip_serializing, default)]
    pub whatsapp_webhook_verify_token: String,
    pub messenger_page_id: Option<String>,
    pub instagram_account_id: Option<String>,
    #[serde(skip_serializing, default)]
    pub n8n_api_key: String,
    pub n8n_webhook_url: Option<String>,
    pub n8n_webhook_url_messenger: Option<String>,
    pub n8n_webhook_url_instagram: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn whatsapp_configured(&self) -> bool {
        self.whatsapp_phone_number_id.is_some() && self.whatsapp_access_token.is_some()
    }

    /// TRIAL and ACTIVE tenants may use the automation API.
    pub fn is_operational(&self) -> bool {
        matches!(self.status, TenantStatus::Trial | TenantStatus::Active)
    }
}

/// Attendant working a tenant's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub channel: Channel,
    /// wa_id for WhatsApp, PSID/IGSID for Messenger/Instagram.
    pub external_id: String,
    pub phone_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture_url: Option<String>,
    pub organization_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub conversations_count: i64,
    #[serde(default)]
    pub last_conversation_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub contacts_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub conversations_count: i64,
}

/// Tenant-scoped canned response keyed by a unique shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReply {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub shortcut: String,
    pub content: String,
    pub category: Option<String>,
    pub order: i64,
    pub is_active: bool,
    pub created_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub contact_id: String,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub assigned_to_id: Option<String>,
    /// When set, inbound messages are not forwarded to the automation engine.
    pub ia_locked: bool,
    pub last_message_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub external_id: Option<String>,
    pub direction: MessageDirection,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub metadata: MessageMetadata,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Per-kind details attached to a stored message.
///
/// Only the fields relevant to the message kind are set; the rest serialize away.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_sticker: bool,
    /// Location name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Location address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_reply: Option<FlowReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<SharedContact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<Referral>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<MessageError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<serde_json::Value>,
    /// Originating channel when not WhatsApp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Reply/quote or forward marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequently_forwarded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonSelection {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSelection {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// WhatsApp Flow form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReply {
    pub flow_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_token: Option<String>,
    pub response_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedContact {
    pub name: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub message_id: String,
    pub emoji: String,
}

/// Click-to-WhatsApp ad data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub source_url: String,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageError {
    pub code: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            (total + limit as i64 - 1) / limit as i64
        };
        Self {
            data,
            total,
            page,
            limit,
            pages,
        }
    }
}

/// Clamp client paging input: page ≥ 1, 1 ≤ limit ≤ 100 (default 20).
pub fn paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    (page, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_db_spelling() {
        assert_eq!(ConversationStatus::BotHandling.as_str(), "BOT_HANDLING");
        assert_eq!(
            "IN_PROGRESS".parse::<ConversationStatus>().unwrap(),
            ConversationStatus::InProgress
        );
        assert_eq!("instagram".parse::<Channel>().unwrap(), Channel::Instagram);
        assert!("bogus".parse::<Priority>().is_err());
    }

    #[test]
    fn receipts_do_not_regress() {
        assert!(MessageStatus::Sent.advances_to(MessageStatus::Delivered));
        assert!(MessageStatus::Delivered.advances_to(MessageStatus::Read));
        assert!(!MessageStatus::Read.advances_to(MessageStatus::Delivered));
        assert!(MessageStatus::Read.advances_to(MessageStatus::Deleted));
    }

    #[test]
    fn metadata_omits_unset_fields() {
        let meta = MessageMetadata {
            caption: Some("hi".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({ "caption": "hi" }));
    }

    #[test]
    fn page_count_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 41, 1, 20);
        assert_eq!(page.pages, 3);
        assert_eq!(paging(Some(0), Some(500)), (1, 100));
    }
}
