//! Audit trail. Recording never blocks or fails the caller.

use crate::domain::inputs::{AuditLogQuery, NewAuditLog};
use crate::domain::{paging, AuditLog, DomainError, Page};
use crate::ports::AuditLogRepo;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

pub struct AuditService {
    repo: Arc<dyn AuditLogRepo>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditLogRepo>) -> Self {
        Self { repo }
    }

    /// Persist `entry` on a background task. Failures are logged only.
    pub fn record(&self, entry: NewAuditLog) {
        let log = AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: entry.tenant_id,
            user_id: entry.user_id,
            action: entry.action,
            entity: entry.entity,
            entity_id: entry.entity_id,
            old_data: entry.old_data,
            new_data: entry.new_data,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        let repo = self.repo.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.insert_audit_log(&log).await {
                warn!(action = %log.action, entity = %log.entity, error = %e, "audit log write failed");
            }
        });
    }

    /// Shorthand for the common `tenant / action / entity / id` entry.
    pub fn entity_event(
        &self,
        tenant_id: &str,
        action: &str,
        entity: &str,
        entity_id: &str,
        old_data: Option<serde_json::Value>,
        new_data: Option<serde_json::Value>,
    ) {
        self.record(NewAuditLog {
            tenant_id: Some(tenant_id.to_string()),
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id: Some(entity_id.to_string()),
            old_data,
            new_data,
            ..Default::default()
        });
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        query: &AuditLogQuery,
    ) -> Result<Page<AuditLog>, DomainError> {
        let (page, limit) = paging(query.page, query.limit);
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(DomainError::bad_request("startDate must be before endDate"));
            }
        }
        let (logs, total) = self.repo.list_audit_logs(tenant_id, query, page, limit).await?;
        Ok(Page::new(logs, total, page, limit))
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<AuditLog, DomainError> {
        self.repo
            .get_audit_log(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Audit log"))
    }
}

/// Serialize an entity for `old_data`/`new_data`.
pub fn snapshot(value: &impl serde::Serialize) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, seeded_tenant};

    #[tokio::test]
    async fn recorded_entries_show_up_in_listing() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-audit-svc").await;
        let svc = AuditService::new(Arc::new(repo));
        svc.entity_event(&t.id, "CREATE", "Tag", "tag-1", None, Some(serde_json::json!({ "name": "VIP" })));

        let mut page = svc.list(&t.id, &AuditLogQuery::default()).await.unwrap();
        for _ in 0..50 {
            if page.total > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            page = svc.list(&t.id, &AuditLogQuery::default()).await.unwrap();
        }
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].entity_id.as_deref(), Some("tag-1"));
        let fetched = svc.get(&t.id, &page.data[0].id).await.unwrap();
        assert_eq!(fetched.action, "CREATE");
        assert!(svc.get("other-tenant", &fetched.id).await.is_err());
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected() {
        let (_dir, repo) = repo().await;
        let svc = AuditService::new(Arc::new(repo));
        let now = Utc::now();
        let query = AuditLogQuery {
            start_date: Some(now),
            end_date: Some(now - chrono::Duration::days(1)),
            ..Default::default()
        };
        assert!(matches!(svc.list("t", &query).await, Err(DomainError::BadRequest(_))));
    }
}
