//! Request extractors for the caller's tenant.

use super::SharedState;
use crate::domain::{DomainError, Tenant};
use axum::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Tenant named by `X-Tenant-Id`, plus the acting user from `X-User-Id`.
///
/// Missing header → 401, unknown tenant → 404.
pub struct TenantContext {
    pub tenant: Tenant,
    pub user_id: Option<String>,
}

impl TenantContext {
    pub fn id(&self) -> &str {
        &self.tenant.id
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for TenantContext {
    type Rejection = DomainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let id = header(parts, TENANT_HEADER)
            .ok_or_else(|| DomainError::Unauthorized("Missing X-Tenant-Id header".into()))?;
        let tenant = state.tenants.get(id).await?;
        Ok(Self {
            tenant,
            user_id: header(parts, USER_HEADER).map(str::to_string),
        })
    }
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

/// Tenant authenticated by an N8N API key (`X-Api-Key` header or `apiKey` query).
pub struct N8nTenant(pub Tenant);

#[async_trait]
impl FromRequestParts<SharedState> for N8nTenant {
    type Rejection = DomainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let key = match header(parts, API_KEY_HEADER) {
            Some(k) => Some(k.to_string()),
            None => Query::<ApiKeyQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.api_key),
        };
        state
            .tenants
            .authenticate_n8n(key.as_deref())
            .await
            .map(N8nTenant)
    }
}
