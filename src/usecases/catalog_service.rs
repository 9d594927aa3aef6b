//! Tags and quick replies: the tenant's conversation labels and canned answers.

use super::audit_service::{snapshot, AuditService};
use crate::domain::inputs::{
    CreateQuickReplyInput, CreateTagInput, QuickReplyQuery, UpdateQuickReplyInput, UpdateTagInput,
};
use crate::domain::{DomainError, QuickReply, Tag};
use crate::ports::{QuickReplyRepo, TagRepo};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct TagService {
    repo: Arc<dyn TagRepo>,
    audit: Arc<AuditService>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepo>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    pub async fn list(&self, tenant_id: &str, search: Option<&str>) -> Result<Vec<Tag>, DomainError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.repo.list_tags(tenant_id, search).await
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<Tag, DomainError> {
        self.repo
            .get_tag(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tag"))
    }

    async fn check_name_free(
        &self,
        tenant_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> Result<(), DomainError> {
        match self.repo.find_tag_by_name(tenant_id, name).await? {
            Some(other) if Some(other.id.as_str()) != except_id => {
                Err(DomainError::bad_request("a tag with this name already exists"))
            }
            _ => Ok(()),
        }
    }

    pub async fn create(&self, tenant_id: &str, input: CreateTagInput) -> Result<Tag, DomainError> {
        input.validate()?;
        self.check_name_free(tenant_id, &input.name, None).await?;
        let tag = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: input.name,
            color: input.color.to_uppercase(),
            created_at: Utc::now(),
            conversations_count: 0,
        };
        self.repo.create_tag(&tag).await?;
        info!(tenant_id, tag_id = %tag.id, name = %tag.name, "tag created");
        self.audit
            .entity_event(tenant_id, "CREATE", "Tag", &tag.id, None, snapshot(&tag));
        Ok(tag)
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: UpdateTagInput,
    ) -> Result<Tag, DomainError> {
        input.validate()?;
        let before = self.get(tenant_id, id).await?;
        let mut tag = before.clone();
        if let Some(name) = input.name {
            self.check_name_free(tenant_id, &name, Some(id)).await?;
            tag.name = name;
        }
        if let Some(color) = input.color {
            tag.color = color.to_uppercase();
        }
        self.repo.update_tag(&tag).await?;
        info!(tenant_id, tag_id = %id, name = %tag.name, "tag updated");
        self.audit
            .entity_event(tenant_id, "UPDATE", "Tag", id, snapshot(&before), snapshot(&tag));
        Ok(tag)
    }

    /// Removes the tag from every conversation carrying it.
    pub async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), DomainError> {
        let tag = self.get(tenant_id, id).await?;
        self.repo.delete_tag(tenant_id, id).await?;
        info!(tenant_id, tag_id = %id, "tag deleted");
        self.audit
            .entity_event(tenant_id, "DELETE", "Tag", id, snapshot(&tag), None);
        Ok(())
    }
}

pub struct QuickReplyService {
    repo: Arc<dyn QuickReplyRepo>,
    audit: Arc<AuditService>,
}

impl QuickReplyService {
    pub fn new(repo: Arc<dyn QuickReplyRepo>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        query: &QuickReplyQuery,
    ) -> Result<Vec<QuickReply>, DomainError> {
        self.repo.list_quick_replies(tenant_id, query).await
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<QuickReply, DomainError> {
        self.repo
            .get_quick_reply(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Quick reply"))
    }

    async fn check_shortcut_free(
        &self,
        tenant_id: &str,
        shortcut: &str,
        except_id: Option<&str>,
    ) -> Result<(), DomainError> {
        match self.repo.find_quick_reply_by_shortcut(tenant_id, shortcut).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(DomainError::bad_request(
                format!("shortcut '{}' is already in use", shortcut),
            )),
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        created_by: Option<&str>,
        input: CreateQuickReplyInput,
    ) -> Result<QuickReply, DomainError> {
        input.validate()?;
        self.check_shortcut_free(tenant_id, &input.shortcut, None)
            .await?;
        let now = Utc::now();
        let reply = QuickReply {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            title: input.title,
            shortcut: input.shortcut,
            content: input.content,
            category: input.category.filter(|c| !c.trim().is_empty()),
            order: input.order.unwrap_or(0),
            is_active: true,
            created_by_id: created_by.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.repo.create_quick_reply(&reply).await?;
        info!(
            tenant_id,
            quick_reply_id = %reply.id,
            shortcut = %reply.shortcut,
            "quick reply created"
        );
        self.audit.entity_event(
            tenant_id,
            "CREATE",
            "QuickReply",
            &reply.id,
            None,
            snapshot(&reply),
        );
        Ok(reply)
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: UpdateQuickReplyInput,
    ) -> Result<QuickReply, DomainError> {
        input.validate()?;
        let before = self.get(tenant_id, id).await?;
        let mut reply = before.clone();
        if let Some(shortcut) = input.shortcut {
            self.check_shortcut_free(tenant_id, &shortcut, Some(id))
                .await?;
            reply.shortcut = shortcut;
        }
        if let Some(title) = input.title {
            reply.title = title;
        }
        if let Some(content) = input.content {
            reply.content = content;
        }
        if let Some(category) = input.category {
            reply.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(order) = input.order {
            reply.order = order;
        }
        if let Some(active) = input.is_active {
            reply.is_active = active;
        }
        reply.updated_at = Utc::now();
        self.repo.update_quick_reply(&reply).await?;
        info!(
            tenant_id,
            quick_reply_id = %id,
            shortcut = %reply.shortcut,
            "quick reply updated"
        );
        self.audit.entity_event(
            tenant_id,
            "UPDATE",
            "QuickReply",
            id,
            snapshot(&before),
            snapshot(&reply),
        );
        Ok(reply)
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), DomainError> {
        let reply = self.get(tenant_id, id).await?;
        self.repo.delete_quick_reply(tenant_id, id).await?;
        info!(tenant_id, quick_reply_id = %id, "quick reply deleted");
        self.audit
            .entity_event(tenant_id, "DELETE", "QuickReply", id, snapshot(&reply), None);
        Ok(())
    }

    /// Expand a `/shortcut` typed by an attendant into the reply content.
    /// Inactive replies do not expand.
    pub async fn expand(&self, tenant_id: &str, typed: &str) -> Result<QuickReply, DomainError> {
        let shortcut = typed.trim().trim_start_matches('/');
        self.repo
            .find_quick_reply_by_shortcut(tenant_id, shortcut)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| DomainError::not_found("Quick reply"))
    }
}
