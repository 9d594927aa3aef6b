//! Tenants and their users.

use super::sqlite_repo::{
    enum_col, int, int_col, like_pattern, millis, opt_millis, opt_text, opt_time, repo_err,
    scalar_i64, text, text_col, time_col, write_err, SqliteRepo,
};
use crate::domain::{Channel, DomainError, Tenant, TenantStatus, User};
use crate::ports::{TenantRepo, UserRepo};
use libsql::params;

const TENANT_COLUMNS: &str = "id, name, slug, email, status, plan, max_attendants, max_messages, \
    trial_ends_at, whatsapp_phone_number_id, whatsapp_business_account_id, whatsapp_access_token, \
    whatsapp_app_secret, whatsapp_webhook_verify_token, messenger_page_id, instagram_account_id, \
    n8n_api_key, n8n_webhook_url, n8n_webhook_url_messenger, n8n_webhook_url_instagram, \
    created_at, updated_at";

fn tenant_from_row(row: &libsql::Row) -> Result<Tenant, DomainError> {
    Ok(Tenant {
        id: text_col(row, 0)?,
        name: text_col(row, 1)?,
        slug: text_col(row, 2)?,
        email: text_col(row, 3)?,
        status: enum_col(row, 4)?,
        plan: enum_col(row, 5)?,
        max_attendants: int_col(row, 6)?,
        max_messages: int_col(row, 7)?,
        trial_ends_at: opt_time(row, 8),
        whatsapp_phone_number_id: opt_text(row, 9),
        whatsapp_business_account_id: opt_text(row, 10),
        whatsapp_access_token: opt_text(row, 11),
        whatsapp_app_secret: opt_text(row, 12),
        whatsapp_webhook_verify_token: text_col(row, 13)?,
        messenger_page_id: opt_text(row, 14),
        instagram_account_id: opt_text(row, 15),
        n8n_api_key: text_col(row, 16)?,
        n8n_webhook_url: opt_text(row, 17),
        n8n_webhook_url_messenger: opt_text(row, 18),
        n8n_webhook_url_instagram: opt_text(row, 19),
        created_at: time_col(row, 20)?,
        updated_at: time_col(row, 21)?,
    })
}

fn user_from_row(row: &libsql::Row) -> Result<User, DomainError> {
    Ok(User {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        name: text_col(row, 2)?,
        email: text_col(row, 3)?,
        role: enum_col(row, 4)?,
        status: enum_col(row, 5)?,
        created_at: time_col(row, 6)?,
    })
}

impl SqliteRepo {
    async fn tenant_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<Tenant>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM tenants WHERE {} LIMIT 1", TENANT_COLUMNS, clause);
        let mut rows = conn.query(&sql, params![value]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(tenant_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl TenantRepo for SqliteRepo {
    async fn create_tenant(&self, t: &Tenant) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            &format!(
                "INSERT INTO tenants ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
                 ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                TENANT_COLUMNS
            ),
            params![
                t.id.as_str(),
                t.name.as_str(),
                t.slug.as_str(),
                t.email.as_str(),
                t.status.as_str(),
                t.plan.as_str(),
                t.max_attendants,
                t.max_messages,
                opt_millis(t.trial_ends_at),
                t.whatsapp_phone_number_id.clone(),
                t.whatsapp_business_account_id.clone(),
                t.whatsapp_access_token.clone(),
                t.whatsapp_app_secret.clone(),
                t.whatsapp_webhook_verify_token.as_str(),
                t.messenger_page_id.clone(),
                t.instagram_account_id.clone(),
                t.n8n_api_key.as_str(),
                t.n8n_webhook_url.clone(),
                t.n8n_webhook_url_messenger.clone(),
                t.n8n_webhook_url_instagram.clone(),
                millis(t.created_at),
                millis(t.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_tenant(&self, id: &str) -> Result<Option<Tenant>, DomainError> {
        self.tenant_where("id = ?1", id).await
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError> {
        self.tenant_where("slug = ?1", slug).await
    }

    async fn find_tenant_by_email(&self, email: &str) -> Result<Option<Tenant>, DomainError> {
        self.tenant_where("email = ?1 COLLATE NOCASE", email).await
    }

    async fn find_tenant_by_channel_account(
        &self,
        channel: Channel,
        account_id: &str,
    ) -> Result<Option<Tenant>, DomainError> {
        let clause = match channel {
            Channel::WhatsApp => "whatsapp_phone_number_id = ?1",
            Channel::Messenger => "messenger_page_id = ?1",
            Channel::Instagram => "instagram_account_id = ?1",
        };
        self.tenant_where(clause, account_id).await
    }

    async fn list_tenants(
        &self,
        status: Option<TenantStatus>,
        search: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Tenant>, i64), DomainError> {
        let mut filters = vec!["1 = 1".to_string()];
        let mut values = Vec::new();
        if let Some(status) = status {
            values.push(text(status.as_str()));
            filters.push(format!("status = ?{}", values.len()));
        }
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            values.push(text(like_pattern(term.trim())));
            let n = values.len();
            filters.push(format!(
                "(name LIKE ?{n} ESCAPE '\\' OR email LIKE ?{n} ESCAPE '\\' OR slug LIKE ?{n} ESCAPE '\\')"
            ));
        }
        let where_sql = filters.join(" AND ");
        let conn = self.conn().await?;
        let total = scalar_i64(
            &conn,
            &format!("SELECT COUNT(*) FROM tenants WHERE {}", where_sql),
            values.clone(),
        )
        .await?;

        values.push(int(limit as i64));
        values.push(int(((page - 1) * limit) as i64));
        let sql = format!(
            "SELECT {} FROM tenants WHERE {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            TENANT_COLUMNS,
            where_sql,
            values.len() - 1,
            values.len()
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut tenants = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            tenants.push(tenant_from_row(&row)?);
        }
        Ok((tenants, total))
    }

    async fn update_tenant(&self, t: &Tenant) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            UPDATE tenants SET
                name = ?2, email = ?3, status = ?4, plan = ?5, max_attendants = ?6,
                max_messages = ?7, trial_ends_at = ?8, whatsapp_phone_number_id = ?9,
                whatsapp_business_account_id = ?10, whatsapp_access_token = ?11,
                whatsapp_app_secret = ?12, messenger_page_id = ?13, instagram_account_id = ?14,
                n8n_webhook_url = ?15, n8n_webhook_url_messenger = ?16,
                n8n_webhook_url_instagram = ?17, updated_at = ?18
            WHERE id = ?1
            "#,
            params![
                t.id.as_str(),
                t.name.as_str(),
                t.email.as_str(),
                t.status.as_str(),
                t.plan.as_str(),
                t.max_attendants,
                t.max_messages,
                opt_millis(t.trial_ends_at),
                t.whatsapp_phone_number_id.clone(),
                t.whatsapp_business_account_id.clone(),
                t.whatsapp_access_token.clone(),
                t.whatsapp_app_secret.clone(),
                t.messenger_page_id.clone(),
                t.instagram_account_id.clone(),
                t.n8n_webhook_url.clone(),
                t.n8n_webhook_url_messenger.clone(),
                t.n8n_webhook_url_instagram.clone(),
                millis(t.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_tenant(&self, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let n = conn
            .execute("DELETE FROM tenants WHERE id = ?1", params![id])
            .await
            .map_err(repo_err)?;
        Ok(n > 0)
    }
}

const USER_COLUMNS: &str = "id, tenant_id, name, email, role, status, created_at";

#[async_trait::async_trait]
impl UserRepo for SqliteRepo {
    async fn create_user(&self, u: &User) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO users (id, tenant_id, name, email, role, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                u.id.as_str(),
                u.tenant_id.as_str(),
                u.name.as_str(),
                u.email.as_str(),
                u.role.as_str(),
                u.status.as_str(),
                millis(u.created_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_user(&self, tenant_id: &str, id: &str) -> Result<Option<User>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM users WHERE tenant_id = ?1 AND id = ?2",
                    USER_COLUMNS
                ),
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<User>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM users WHERE tenant_id = ?1 AND email = ?2 COLLATE NOCASE",
                    USER_COLUMNS
                ),
                params![tenant_id, email],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM users WHERE tenant_id = ?1 ORDER BY name",
                    USER_COLUMNS
                ),
                params![tenant_id],
            )
            .await
            .map_err(repo_err)?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            users.push(user_from_row(&row)?);
        }
        Ok(users)
    }
}
