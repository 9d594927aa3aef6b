//! Read models returned by listings, the board and reports.

use crate::domain::{Channel, Conversation, ConversationStatus, Message, Tenant};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub id: String,
    pub channel: Channel,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagSummary {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Conversation card: what the board and the list render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub contact: ContactSummary,
    pub tags: Vec<TagSummary>,
    pub last_message: Option<String>,
    /// Inbound messages not yet marked read.
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub view: ConversationView,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: ConversationStatus,
    pub count: usize,
    pub conversations: Vec<ConversationView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: ConversationStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    /// Unread inbound messages in active conversations.
    pub unread: i64,
}

/// Whether the automation should stay silent for a contact.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IaLockStatus {
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Tenant creation result. The only response that carries the N8N API key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCreated {
    pub tenant: Tenant,
    pub login_url: String,
    pub n8n_api_key: String,
    pub whatsapp_webhook_verify_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfigView {
    pub configured: bool,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    pub whatsapp_webhook_verify_token: String,
    pub has_access_token: bool,
    pub has_app_secret: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub index: usize,
    pub phone_number: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub created: usize,
    pub skipped: usize,
    pub failed: Vec<ImportFailure>,
}

// ─────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportPeriod {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl ReportPeriod {
    /// Unknown or missing values fall back to 30 days.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("7d") => ReportPeriod::Week,
            Some("90d") => ReportPeriod::Quarter,
            Some("1y") => ReportPeriod::Year,
            _ => ReportPeriod::Month,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            ReportPeriod::Week => 7,
            ReportPeriod::Month => 30,
            ReportPeriod::Quarter => 90,
            ReportPeriod::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusShare {
    pub status: ConversationStatus,
    pub count: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewNumbers {
    pub total_conversations: i64,
    /// Percent change versus the previous period of equal length.
    pub conversations_change: i64,
    /// Mean minutes from creation to close, over conversations closed in the period.
    pub average_resolution_minutes: i64,
    pub resolution_rate: i64,
    pub active_attendants: i64,
    pub total_attendants: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    pub period: ReportPeriod,
    pub overview: OverviewNumbers,
    pub status_breakdown: Vec<StatusShare>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendantPerformance {
    pub id: String,
    pub name: String,
    pub email: String,
    pub conversations_count: i64,
    pub resolved_count: i64,
    pub resolution_rate: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendantsReport {
    pub period: ReportPeriod,
    pub attendants: Vec<AttendantPerformance>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyVolumeReport {
    pub period: ReportPeriod,
    pub hourly_volume: Vec<HourCount>,
}

/// Rounded percentage of `part` in `whole`; 0 when `whole` is 0.
pub fn percent(part: i64, whole: i64) -> i64 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as i64
    }
}
