//! Request inputs accepted by the use cases, with their validation rules.
//!
//! Every `validate` returns `DomainError::BadRequest` naming the offending field.

use crate::domain::{ConversationStatus, DomainError, Plan, Priority, Role, TenantStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn is_email(s: &str) -> bool {
    let mut parts = s.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

/// `#RRGGBB`
pub fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_http_url(s: &str) -> bool {
    (s.starts_with("https://") || s.starts_with("http://")) && s.len() > "https://".len()
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), DomainError> {
    let n = value.chars().count();
    if n < min {
        return Err(DomainError::bad_request(format!(
            "{} must have at least {} characters",
            field, min
        )));
    }
    if n > max {
        return Err(DomainError::bad_request(format!(
            "{} must have at most {} characters",
            field, max
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), DomainError> {
    if is_email(email) {
        Ok(())
    } else {
        Err(DomainError::bad_request("invalid email"))
    }
}

fn check_url(field: &str, url: &str) -> Result<(), DomainError> {
    if is_http_url(url) {
        Ok(())
    } else {
        Err(DomainError::bad_request(format!("{} must be an http(s) URL", field)))
    }
}

/// Digits only, 10..15 long; Brazilian numbers (55…) must carry DDD + number.
pub fn check_phone(phone: &str) -> Result<(), DomainError> {
    if !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::bad_request(
            "phone number must contain only digits",
        ));
    }
    check_len("phone number", phone, 10, 15)?;
    if phone.starts_with("55") && phone.len() < 12 {
        return Err(DomainError::bad_request(
            "Brazilian numbers must include country code (55) + area code + number",
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────
// Tenants & users
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantInput {
    pub name: String,
    pub slug: String,
    pub email: String,
    pub plan: Option<Plan>,
    pub max_attendants: Option<i64>,
    pub max_messages: Option<i64>,
}

impl CreateTenantInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_len("name", &self.name, 2, 200)?;
        if self.slug.chars().count() < 3 {
            return Err(DomainError::bad_request(
                "slug must have at least 3 characters",
            ));
        }
        if !is_slug(&self.slug) {
            return Err(DomainError::bad_request(
                "slug must contain only lowercase letters, digits and hyphens",
            ));
        }
        check_email(&self.email)?;
        for (field, v) in [
            ("maxAttendants", self.max_attendants),
            ("maxMessages", self.max_messages),
        ] {
            if matches!(v, Some(n) if n <= 0) {
                return Err(DomainError::bad_request(format!("{} must be positive", field)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<TenantStatus>,
    pub plan: Option<Plan>,
    pub max_attendants: Option<i64>,
    pub max_messages: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub messenger_page_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub instagram_account_id: Option<Option<String>>,
}

impl UpdateTenantInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            check_len("name", name, 2, 200)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        for (field, v) in [
            ("maxAttendants", self.max_attendants),
            ("maxMessages", self.max_messages),
        ] {
            if matches!(v, Some(n) if n <= 0) {
                return Err(DomainError::bad_request(format!("{} must be positive", field)));
            }
        }
        Ok(())
    }

    pub fn status(status: TenantStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureWhatsAppInput {
    pub whatsapp_phone_number_id: String,
    pub whatsapp_access_token: String,
    pub whatsapp_business_account_id: String,
    pub whatsapp_app_secret: String,
}

impl ConfigureWhatsAppInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, v) in [
            ("whatsappPhoneNumberId", &self.whatsapp_phone_number_id),
            ("whatsappAccessToken", &self.whatsapp_access_token),
            ("whatsappBusinessAccountId", &self.whatsapp_business_account_id),
            ("whatsappAppSecret", &self.whatsapp_app_secret),
        ] {
            if v.trim().is_empty() {
                return Err(DomainError::bad_request(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// Replaces all three N8N webhook URLs; `null`/absent clears one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct N8nWebhooksInput {
    pub n8n_webhook_url: Option<String>,
    pub n8n_webhook_url_messenger: Option<String>,
    pub n8n_webhook_url_instagram: Option<String>,
}

impl N8nWebhooksInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, v) in [
            ("n8nWebhookUrl", &self.n8n_webhook_url),
            ("n8nWebhookUrlMessenger", &self.n8n_webhook_url_messenger),
            ("n8nWebhookUrlInstagram", &self.n8n_webhook_url_instagram),
        ] {
            if let Some(url) = v {
                check_url(field, url)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuery {
    pub status: Option<TenantStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
}

impl CreateUserInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_len("name", &self.name, 1, 100)?;
        check_email(&self.email)
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Contacts & organizations
// ─────────────────────────────────────────────────────────────────────────

const MAX_METADATA_BYTES: usize = 10_000;

fn check_metadata(metadata: Option<&serde_json::Value>) -> Result<(), DomainError> {
    let Some(value) = metadata else {
        return Ok(());
    };
    if !value.is_object() {
        return Err(DomainError::bad_request("metadata must be an object"));
    }
    if value.to_string().len() > MAX_METADATA_BYTES {
        return Err(DomainError::bad_request("metadata too large (max 10KB)"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactInput {
    pub phone_number: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture_url: Option<String>,
    pub organization_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateContactInput {
    /// Trims the name and lowercases the email before checking them.
    pub fn normalize_and_validate(&mut self) -> Result<(), DomainError> {
        check_phone(&self.phone_number)?;
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
            check_len("name", name, 1, 100)?;
        }
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_lowercase();
            check_email(email)?;
        }
        if let Some(url) = &self.profile_picture_url {
            check_url("profilePictureUrl", url)?;
        }
        check_metadata(self.metadata.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactInput {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_picture_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub organization_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<serde_json::Value>>,
}

impl UpdateContactInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.profile_picture_url.is_none()
            && self.organization_id.is_none()
            && self.metadata.is_none()
    }

    pub fn normalize_and_validate(&mut self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::bad_request(
                "at least one field must be provided",
            ));
        }
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
            check_len("name", name, 1, 100)?;
        }
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_lowercase();
            check_email(email)?;
        }
        if let Some(Some(url)) = &self.profile_picture_url {
            check_url("profilePictureUrl", url)?;
        }
        if let Some(meta) = &self.metadata {
            check_metadata(meta.as_ref())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ContactSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
    PhoneNumber,
}

impl ContactSort {
    pub fn column(&self) -> &'static str {
        match self {
            ContactSort::Name => "name",
            ContactSort::CreatedAt => "created_at",
            ContactSort::UpdatedAt => "updated_at",
            ContactSort::PhoneNumber => "phone_number",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: ContactSort,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkImportInput {
    pub contacts: Vec<CreateContactInput>,
}

impl BulkImportInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.contacts.is_empty() {
            return Err(DomainError::bad_request(
                "at least one contact must be provided",
            ));
        }
        if self.contacts.len() > 100 {
            return Err(DomainError::bad_request(
                "at most 100 contacts per import",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    pub name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<String>,
    pub address: Option<String>,
}

impl CreateOrganizationInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_len("name", self.name.trim(), 1, 255)?;
        if let Some(site) = &self.website {
            check_url("website", site)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub employees: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

impl UpdateOrganizationInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            check_len("name", name.trim(), 1, 255)?;
        }
        if let Some(Some(site)) = &self.website {
            check_url("website", site)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Tags & quick replies
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
    pub color: String,
}

impl CreateTagInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_len("name", &self.name, 1, 50)?;
        if !is_hex_color(&self.color) {
            return Err(DomainError::bad_request(
                "color must be a hex value like #FF5733",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTagInput {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl UpdateTagInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            check_len("name", name, 1, 50)?;
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(DomainError::bad_request(
                    "color must be a hex value like #FF5733",
                ));
            }
        }
        Ok(())
    }
}

fn check_shortcut(shortcut: &str) -> Result<(), DomainError> {
    check_len("shortcut", shortcut, 2, 50)?;
    if !is_slug(shortcut) {
        return Err(DomainError::bad_request(
            "shortcut must contain only lowercase letters, digits and hyphens",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuickReplyInput {
    pub title: String,
    pub shortcut: String,
    pub content: String,
    pub category: Option<String>,
    pub order: Option<i64>,
}

impl CreateQuickReplyInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_len("title", &self.title, 1, 100)?;
        check_shortcut(&self.shortcut)?;
        check_len("content", &self.content, 1, 4000)?;
        if let Some(category) = &self.category {
            check_len("category", category, 0, 50)?;
        }
        if matches!(self.order, Some(n) if n < 0) {
            return Err(DomainError::bad_request("order must be zero or greater"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuickReplyInput {
    pub title: Option<String>,
    pub shortcut: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub order: Option<i64>,
    pub is_active: Option<bool>,
}

impl UpdateQuickReplyInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, 100)?;
        }
        if let Some(shortcut) = &self.shortcut {
            check_shortcut(shortcut)?;
        }
        if let Some(content) = &self.content {
            check_len("content", content, 1, 4000)?;
        }
        if let Some(Some(category)) = &self.category {
            check_len("category", category, 0, 50)?;
        }
        if matches!(self.order, Some(n) if n < 0) {
            return Err(DomainError::bad_request("order must be zero or greater"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReplyQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────
// Conversations & audit
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    /// Single status or CSV list, e.g. `OPEN,IN_PROGRESS`.
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ConversationQuery {
    pub fn statuses(&self) -> Result<Vec<ConversationStatus>, DomainError> {
        match &self.status {
            None => Ok(Vec::new()),
            Some(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect(),
        }
    }
}

/// Hand-off of a conversation from the automation to a human.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalateInput {
    pub phone: Option<String>,
    pub contact_phone_number: Option<String>,
    pub reason: Option<String>,
    pub reason_detail: Option<String>,
    pub priority: Option<Priority>,
}

impl EscalateInput {
    /// Digits of `phone`, falling back to `contactPhoneNumber`.
    pub fn phone_digits(&self) -> Result<String, DomainError> {
        let raw = self
            .phone
            .as_deref()
            .or(self.contact_phone_number.as_deref())
            .ok_or_else(|| DomainError::bad_request("phone is required"))?;
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        check_phone(&digits)?;
        if let Some(detail) = &self.reason_detail {
            check_len("reasonDetail", detail, 0, 500)?;
        }
        Ok(digits)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub action: Option<String>,
    pub entity: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Audit entry to be recorded.
#[derive(Debug, Clone, Default)]
pub struct NewAuditLog {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_and_color_rules() {
        assert!(is_slug("hotel-test-1"));
        assert!(!is_slug("Hotel Test"));
        assert!(is_hex_color("#FF5733"));
        assert!(is_hex_color("#a1b2c3"));
        assert!(!is_hex_color("FF5733"));
        assert!(!is_hex_color("#GG0000"));
    }

    #[test]
    fn email_rule() {
        assert!(is_email("front@hotel.com"));
        assert!(!is_email("front@hotel"));
        assert!(!is_email("front hotel@x.com"));
        assert!(!is_email("@hotel.com"));
    }

    #[test]
    fn brazilian_phone_needs_area_code() {
        assert!(check_phone("5511999999999").is_ok());
        assert!(check_phone("55119999999").is_err());
        assert!(check_phone("14155550100").is_ok());
        assert!(check_phone("+14155550100").is_err());
        assert!(check_phone("123").is_err());
    }

    #[test]
    fn quick_reply_shortcut_rules() {
        let mut input = CreateQuickReplyInput {
            title: "Welcome".into(),
            shortcut: "welcome-msg".into(),
            content: "Hi there".into(),
            category: None,
            order: None,
        };
        assert!(input.validate().is_ok());
        input.shortcut = "Welcome".into();
        assert!(input.validate().is_err());
        input.shortcut = "w".into();
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_contact_distinguishes_null_from_absent() {
        let input: UpdateContactInput =
            serde_json::from_str(r#"{"profilePictureUrl": null}"#).unwrap();
        assert_eq!(input.profile_picture_url, Some(None));
        assert_eq!(input.metadata, None);

        let mut empty = UpdateContactInput::default();
        assert!(empty.normalize_and_validate().is_err());
    }

    #[test]
    fn conversation_status_csv() {
        let q = ConversationQuery {
            status: Some("OPEN, IN_PROGRESS".into()),
            ..Default::default()
        };
        assert_eq!(
            q.statuses().unwrap(),
            vec![ConversationStatus::Open, ConversationStatus::InProgress]
        );
        let bad = ConversationQuery {
            status: Some("OPEN,NOPE".into()),
            ..Default::default()
        };
        assert!(bad.statuses().is_err());
    }
}
