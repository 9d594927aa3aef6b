//! Tenant administration and N8N API-key authentication.

use super::audit_service::{snapshot, AuditService};
use crate::domain::inputs::{
    ConfigureWhatsAppInput, CreateTenantInput, N8nWebhooksInput, TenantQuery, UpdateTenantInput,
};
use crate::domain::{
    paging, Channel, DomainError, Page, Plan, Tenant, TenantCreated, TenantStatus,
    WhatsAppConfigView,
};
use crate::ports::TenantRepo;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

const TRIAL_DAYS: i64 = 14;
const DEFAULT_MAX_ATTENDANTS: i64 = 10;
const DEFAULT_MAX_MESSAGES: i64 = 10_000;

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Constant-time key comparison: both keys are MACed under the stored one
/// and the tags checked with `verify_slice`.
fn key_matches(stored: &str, presented: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    let mac = |data: &str| {
        Hmac::<Sha256>::new_from_slice(stored.as_bytes()).map(|mut m| {
            m.update(data.as_bytes());
            m
        })
    };
    match (mac(stored), mac(presented)) {
        (Ok(reference), Ok(candidate)) => candidate
            .verify_slice(&reference.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

pub struct TenantService {
    repo: Arc<dyn TenantRepo>,
    audit: Arc<AuditService>,
    base_domain: String,
}

impl TenantService {
    /// `base_domain` builds login URLs as `https://{slug}.{base_domain}`.
    pub fn new(repo: Arc<dyn TenantRepo>, audit: Arc<AuditService>, base_domain: String) -> Self {
        Self {
            repo,
            audit,
            base_domain,
        }
    }

    pub async fn create(&self, input: CreateTenantInput) -> Result<TenantCreated, DomainError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        if self.repo.find_tenant_by_slug(&input.slug).await?.is_some() {
            return Err(DomainError::bad_request("slug already in use"));
        }
        if self.repo.find_tenant_by_email(&email).await?.is_some() {
            return Err(DomainError::bad_request("email already in use"));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            slug: input.slug,
            email,
            status: TenantStatus::Trial,
            plan: input.plan.unwrap_or(Plan::Basic),
            max_attendants: input.max_attendants.unwrap_or(DEFAULT_MAX_ATTENDANTS),
            max_messages: input.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES),
            trial_ends_at: Some(now + Duration::days(TRIAL_DAYS)),
            whatsapp_phone_number_id: None,
            whatsapp_business_account_id: None,
            whatsapp_access_token: None,
            whatsapp_app_secret: None,
            whatsapp_webhook_verify_token: random_token(),
            messenger_page_id: None,
            instagram_account_id: None,
            n8n_api_key: format!("n8n_{}", random_token()),
            n8n_webhook_url: None,
            n8n_webhook_url_messenger: None,
            n8n_webhook_url_instagram: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_tenant(&tenant).await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant created");
        self.audit
            .entity_event(&tenant.id, "CREATE", "Tenant", &tenant.id, None, snapshot(&tenant));

        Ok(TenantCreated {
            login_url: format!("https://{}.{}", tenant.slug, self.base_domain),
            n8n_api_key: tenant.n8n_api_key.clone(),
            whatsapp_webhook_verify_token: tenant.whatsapp_webhook_verify_token.clone(),
            tenant,
        })
    }

    pub async fn list(&self, query: &TenantQuery) -> Result<Page<Tenant>, DomainError> {
        let (page, limit) = paging(query.page, query.limit);
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let (tenants, total) = self
            .repo
            .list_tenants(query.status, search, page, limit)
            .await?;
        Ok(Page::new(tenants, total, page, limit))
    }

    pub async fn get(&self, id: &str) -> Result<Tenant, DomainError> {
        self.repo
            .get_tenant(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tenant"))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError> {
        self.repo.find_tenant_by_slug(slug).await
    }

    /// Tenant a webhook belongs to, by the platform account id it was sent for.
    pub async fn find_by_channel_account(
        &self,
        channel: Channel,
        account_id: &str,
    ) -> Result<Option<Tenant>, DomainError> {
        self.repo
            .find_tenant_by_channel_account(channel, account_id)
            .await
    }

    pub async fn update(&self, id: &str, input: UpdateTenantInput) -> Result<Tenant, DomainError> {
        input.validate()?;
        let before = self.get(id).await?;
        let mut tenant = before.clone();

        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            if email != tenant.email {
                if let Some(other) = self.repo.find_tenant_by_email(&email).await? {
                    if other.id != tenant.id {
                        return Err(DomainError::bad_request("email already in use"));
                    }
                }
                tenant.email = email;
            }
        }
        if let Some(name) = input.name {
            tenant.name = name.trim().to_string();
        }
        if let Some(status) = input.status {
            tenant.status = status;
        }
        if let Some(plan) = input.plan {
            tenant.plan = plan;
        }
        if let Some(n) = input.max_attendants {
            tenant.max_attendants = n;
        }
        if let Some(n) = input.max_messages {
            tenant.max_messages = n;
        }
        if let Some(page_id) = input.messenger_page_id {
            tenant.messenger_page_id = page_id.filter(|s| !s.is_empty());
        }
        if let Some(account_id) = input.instagram_account_id {
            tenant.instagram_account_id = account_id.filter(|s| !s.is_empty());
        }
        tenant.updated_at = Utc::now();

        self.repo.update_tenant(&tenant).await?;
        info!(tenant_id = %tenant.id, status = %tenant.status, "tenant updated");
        self.audit.entity_event(
            &tenant.id,
            "UPDATE",
            "Tenant",
            &tenant.id,
            snapshot(&before),
            snapshot(&tenant),
        );
        Ok(tenant)
    }

    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        if !self.repo.delete_tenant(id).await? {
            return Err(DomainError::not_found("Tenant"));
        }
        info!(tenant_id = %id, "tenant deleted");
        self.audit.record(crate::domain::inputs::NewAuditLog {
            action: "DELETE".into(),
            entity: "Tenant".into(),
            entity_id: Some(id.to_string()),
            ..Default::default()
        });
        Ok(())
    }

    pub async fn suspend(&self, id: &str) -> Result<Tenant, DomainError> {
        self.update(id, UpdateTenantInput::status(TenantStatus::Suspended))
            .await
    }

    pub async fn activate(&self, id: &str) -> Result<Tenant, DomainError> {
        self.update(id, UpdateTenantInput::status(TenantStatus::Active))
            .await
    }

    pub async fn configure_whatsapp(
        &self,
        id: &str,
        input: ConfigureWhatsAppInput,
    ) -> Result<WhatsAppConfigView, DomainError> {
        input.validate()?;
        let mut tenant = self.get(id).await?;
        tenant.whatsapp_phone_number_id = Some(input.whatsapp_phone_number_id.trim().to_string());
        tenant.whatsapp_access_token = Some(input.whatsapp_access_token.trim().to_string());
        tenant.whatsapp_business_account_id =
            Some(input.whatsapp_business_account_id.trim().to_string());
        tenant.whatsapp_app_secret = Some(input.whatsapp_app_secret.trim().to_string());
        tenant.updated_at = Utc::now();
        self.repo.update_tenant(&tenant).await?;
        info!(tenant_id = %tenant.id, "whatsapp configured");
        self.audit.entity_event(
            &tenant.id,
            "CONFIGURE_WHATSAPP",
            "Tenant",
            &tenant.id,
            None,
            Some(serde_json::json!({
                "whatsappPhoneNumberId": tenant.whatsapp_phone_number_id,
                "whatsappBusinessAccountId": tenant.whatsapp_business_account_id,
            })),
        );
        Ok(whatsapp_view(&tenant))
    }

    pub async fn whatsapp_config(&self, id: &str) -> Result<WhatsAppConfigView, DomainError> {
        Ok(whatsapp_view(&self.get(id).await?))
    }

    pub async fn configure_n8n(
        &self,
        id: &str,
        input: N8nWebhooksInput,
    ) -> Result<Tenant, DomainError> {
        input.validate()?;
        let mut tenant = self.get(id).await?;
        tenant.n8n_webhook_url = input.n8n_webhook_url;
        tenant.n8n_webhook_url_messenger = input.n8n_webhook_url_messenger;
        tenant.n8n_webhook_url_instagram = input.n8n_webhook_url_instagram;
        tenant.updated_at = Utc::now();
        self.repo.update_tenant(&tenant).await?;
        info!(tenant_id = %tenant.id, "n8n webhooks configured");
        self.audit.entity_event(
            &tenant.id,
            "CONFIGURE_N8N",
            "Tenant",
            &tenant.id,
            None,
            Some(serde_json::json!({
                "n8nWebhookUrl": tenant.n8n_webhook_url,
                "n8nWebhookUrlMessenger": tenant.n8n_webhook_url_messenger,
                "n8nWebhookUrlInstagram": tenant.n8n_webhook_url_instagram,
            })),
        );
        Ok(tenant)
    }

    /// Authenticate an N8N action call. `api_key` is `{tenant-slug}:{n8n_api_key}`.
    ///
    /// # Errors
    /// `Unauthorized` when the key is missing, malformed, names an unknown
    /// tenant or does not match; `Forbidden` when the tenant is not TRIAL/ACTIVE.
    pub async fn authenticate_n8n(&self, api_key: Option<&str>) -> Result<Tenant, DomainError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DomainError::Unauthorized("Missing API key".into()))?;
        let (slug, key) = api_key
            .split_once(':')
            .filter(|(slug, key)| !slug.is_empty() && !key.is_empty())
            .ok_or_else(|| DomainError::Unauthorized("Invalid API key format".into()))?;

        let Some(tenant) = self.repo.find_tenant_by_slug(slug).await? else {
            warn!(slug, "n8n auth: unknown tenant");
            return Err(DomainError::Unauthorized("Invalid API key".into()));
        };
        if !tenant.is_operational() {
            warn!(tenant_id = %tenant.id, status = %tenant.status, "n8n auth: tenant inactive");
            return Err(DomainError::Forbidden("Tenant is not active".into()));
        }
        if !key_matches(&tenant.n8n_api_key, key) {
            warn!(tenant_id = %tenant.id, "n8n auth: wrong key");
            return Err(DomainError::Unauthorized("Invalid API key".into()));
        }
        Ok(tenant)
    }
}

fn whatsapp_view(tenant: &Tenant) -> WhatsAppConfigView {
    WhatsAppConfigView {
        configured: tenant.whatsapp_configured(),
        whatsapp_phone_number_id: tenant.whatsapp_phone_number_id.clone(),
        whatsapp_business_account_id: tenant.whatsapp_business_account_id.clone(),
        whatsapp_webhook_verify_token: tenant.whatsapp_webhook_verify_token.clone(),
        has_access_token: tenant.whatsapp_access_token.is_some(),
        has_app_secret: tenant.whatsapp_app_secret.is_some(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::persistence::sqlite_repo::test_support::repo;
    use crate::adapters::persistence::SqliteRepo;
    use tempfile::TempDir;

    pub(crate) async fn service() -> (TempDir, Arc<SqliteRepo>, TenantService) {
        let (dir, repo) = repo().await;
        let repo = Arc::new(repo);
        let audit = Arc::new(AuditService::new(repo.clone()));
        let svc = TenantService::new(repo.clone(), audit, "crm.test".into());
        (dir, repo, svc)
    }

    pub(crate) fn create_input(slug: &str) -> CreateTenantInput {
        CreateTenantInput {
            name: format!("Hotel {}", slug),
            slug: slug.to_string(),
            email: format!("Admin@{}.test", slug),
            plan: None,
            max_attendants: None,
            max_messages: None,
        }
    }

    #[tokio::test]
    async fn create_starts_trial_with_generated_secrets() {
        let (_dir, _repo, svc) = service().await;
        let created = svc.create(create_input("pousada-sol")).await.unwrap();
        assert_eq!(created.tenant.status, TenantStatus::Trial);
        assert_eq!(created.tenant.plan, Plan::Basic);
        assert_eq!(created.tenant.email, "admin@pousada-sol.test");
        assert_eq!(created.login_url, "https://pousada-sol.crm.test");
        assert!(created.n8n_api_key.starts_with("n8n_"));
        assert!(!created.whatsapp_webhook_verify_token.is_empty());
        assert!(created.tenant.trial_ends_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_slug_or_email_is_rejected() {
        let (_dir, _repo, svc) = service().await;
        svc.create(create_input("hotel-a")).await.unwrap();
        let err = svc.create(create_input("hotel-a")).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(m) if m.contains("slug")));

        let mut same_email = create_input("hotel-b");
        same_email.email = "admin@hotel-a.test".into();
        let err = svc.create(same_email).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(m) if m.contains("email")));

        let mut bad_slug = create_input("Hotel C");
        bad_slug.email = "c@c.test".into();
        assert!(svc.create(bad_slug).await.is_err());
    }

    #[tokio::test]
    async fn suspend_activate_and_whatsapp_view_hides_secrets() {
        let (_dir, _repo, svc) = service().await;
        let id = svc.create(create_input("hotel-w")).await.unwrap().tenant.id;
        assert_eq!(svc.suspend(&id).await.unwrap().status, TenantStatus::Suspended);
        assert_eq!(svc.activate(&id).await.unwrap().status, TenantStatus::Active);

        let view = svc
            .configure_whatsapp(
                &id,
                ConfigureWhatsAppInput {
                    whatsapp_phone_number_id: "PN-9".into(),
                    whatsapp_access_token: "EAAG...".into(),
                    whatsapp_business_account_id: "WABA-9".into(),
                    whatsapp_app_secret: "shh".into(),
                },
            )
            .await
            .unwrap();
        assert!(view.configured);
        assert!(view.has_app_secret);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("EAAG"));
        assert!(!json.contains("shh"));
    }

    #[tokio::test]
    async fn n8n_urls_must_be_http() {
        let (_dir, _repo, svc) = service().await;
        let id = svc.create(create_input("hotel-n")).await.unwrap().tenant.id;
        let bad = N8nWebhooksInput {
            n8n_webhook_url: Some("ftp://x".into()),
            ..Default::default()
        };
        assert!(svc.configure_n8n(&id, bad).await.is_err());
        let good = N8nWebhooksInput {
            n8n_webhook_url: Some("https://n8n.test/webhook/wa".into()),
            ..Default::default()
        };
        let t = svc.configure_n8n(&id, good).await.unwrap();
        assert_eq!(t.n8n_webhook_url.as_deref(), Some("https://n8n.test/webhook/wa"));
    }

    #[tokio::test]
    async fn n8n_authentication_rules() {
        let (_dir, _repo, svc) = service().await;
        let created = svc.create(create_input("hotel-k")).await.unwrap();
        let key = format!("hotel-k:{}", created.n8n_api_key);

        assert_eq!(svc.authenticate_n8n(Some(&key)).await.unwrap().id, created.tenant.id);
        assert!(matches!(svc.authenticate_n8n(None).await, Err(DomainError::Unauthorized(_))));
        assert!(matches!(
            svc.authenticate_n8n(Some("no-colon")).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            svc.authenticate_n8n(Some("ghost:key")).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            svc.authenticate_n8n(Some("hotel-k:wrong")).await,
            Err(DomainError::Unauthorized(_))
        ));
        // Same length, one character off.
        let mut near = created.n8n_api_key.clone();
        let last = if near.ends_with('0') { '1' } else { '0' };
        near.pop();
        near.push(last);
        assert!(matches!(
            svc.authenticate_n8n(Some(&format!("hotel-k:{}", near))).await,
            Err(DomainError::Unauthorized(_))
        ));

        svc.suspend(&created.tenant.id).await.unwrap();
        assert!(matches!(
            svc.authenticate_n8n(Some(&key)).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn key_comparison() {
        assert!(key_matches("abc123", "abc123"));
        assert!(!key_matches("abc123", "abc124"));
        assert!(!key_matches("abc123", "abc1234"));
        assert!(!key_matches("", ""));
    }
}
