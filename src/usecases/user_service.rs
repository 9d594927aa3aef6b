//! Attendants of a tenant.

use super::audit_service::{snapshot, AuditService};
use crate::domain::inputs::CreateUserInput;
use crate::domain::{DomainError, Role, User, UserStatus};
use crate::ports::{TenantRepo, UserRepo};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct UserService {
    users: Arc<dyn UserRepo>,
    tenants: Arc<dyn TenantRepo>,
    audit: Arc<AuditService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        tenants: Arc<dyn TenantRepo>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            users,
            tenants,
            audit,
        }
    }

    /// Create an attendant. Email is unique per tenant and the tenant's
    /// `max_attendants` is enforced.
    pub async fn create(&self, tenant_id: &str, input: CreateUserInput) -> Result<User, DomainError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        let tenant = self
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tenant"))?;
        if self.users.find_user_by_email(tenant_id, &email).await?.is_some() {
            return Err(DomainError::bad_request("email already in use"));
        }
        let existing = self.users.list_users(tenant_id).await?.len() as i64;
        if existing >= tenant.max_attendants {
            return Err(DomainError::bad_request(format!(
                "attendant limit reached ({})",
                tenant.max_attendants
            )));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: input.name.trim().to_string(),
            email,
            role: input.role.unwrap_or(Role::Attendant),
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        self.users.create_user(&user).await?;
        info!(tenant_id, user_id = %user.id, "user created");
        self.audit
            .entity_event(tenant_id, "CREATE", "User", &user.id, None, snapshot(&user));
        Ok(user)
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<User>, DomainError> {
        self.users.list_users(tenant_id).await
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<User, DomainError> {
        self.users
            .get_user(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("User"))
    }
}
