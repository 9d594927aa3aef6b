//! Contacts and organizations.

use super::sqlite_repo::{
    enum_col, int, int_col, like_pattern, millis, opt_text, opt_time, repo_err, scalar_i64,
    text, text_col, time_col, write_err, SqliteRepo,
};
use crate::domain::inputs::ContactQuery;
use crate::domain::{Channel, Contact, DomainError, Organization};
use crate::ports::{ContactRepo, OrganizationRepo};
use libsql::params;

/// Base projection; list queries append the two aggregate columns (12, 13).
const CONTACT_COLUMNS: &str = "c.id, c.tenant_id, c.channel, c.external_id, c.phone_number, \
    c.name, c.email, c.profile_picture_url, c.organization_id, c.metadata, c.created_at, \
    c.updated_at";

const CONTACT_AGGREGATES: &str = "(SELECT COUNT(*) FROM conversations v WHERE v.contact_id = c.id), \
    (SELECT MAX(v.last_message_at) FROM conversations v WHERE v.contact_id = c.id)";

fn contact_from_row(row: &libsql::Row, with_aggregates: bool) -> Result<Contact, DomainError> {
    let metadata = text_col(row, 9)?;
    let (conversations_count, last_conversation_at) = if with_aggregates {
        (row.get::<i64>(12).unwrap_or(0), opt_time(row, 13))
    } else {
        (0, None)
    };
    Ok(Contact {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        channel: enum_col(row, 2)?,
        external_id: text_col(row, 3)?,
        phone_number: opt_text(row, 4),
        name: opt_text(row, 5),
        email: opt_text(row, 6),
        profile_picture_url: opt_text(row, 7),
        organization_id: opt_text(row, 8),
        metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| serde_json::json!({})),
        created_at: time_col(row, 10)?,
        updated_at: time_col(row, 11)?,
        conversations_count,
        last_conversation_at,
    })
}

impl SqliteRepo {
    async fn contact_where(
        &self,
        clause: &str,
        values: Vec<libsql::Value>,
    ) -> Result<Option<Contact>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {}, {} FROM contacts c WHERE {} ORDER BY c.created_at LIMIT 1",
            CONTACT_COLUMNS, CONTACT_AGGREGATES, clause
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(contact_from_row(&row, true)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ContactRepo for SqliteRepo {
    async fn create_contact(&self, c: &Contact) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO contacts (id, tenant_id, channel, external_id, phone_number, name, email,
                profile_picture_url, organization_id, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                c.id.as_str(),
                c.tenant_id.as_str(),
                c.channel.as_str(),
                c.external_id.as_str(),
                c.phone_number.clone(),
                c.name.clone(),
                c.email.clone(),
                c.profile_picture_url.clone(),
                c.organization_id.clone(),
                c.metadata.to_string(),
                millis(c.created_at),
                millis(c.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_contact(&self, tenant_id: &str, id: &str) -> Result<Option<Contact>, DomainError> {
        self.contact_where("c.tenant_id = ?1 AND c.id = ?2", vec![text(tenant_id), text(id)])
            .await
    }

    async fn find_contact_by_external(
        &self,
        tenant_id: &str,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<Contact>, DomainError> {
        self.contact_where(
            "c.tenant_id = ?1 AND c.channel = ?2 AND c.external_id = ?3",
            vec![text(tenant_id), text(channel.as_str()), text(external_id)],
        )
        .await
    }

    async fn find_contact_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Contact>, DomainError> {
        self.contact_where(
            "c.tenant_id = ?1 AND c.phone_number = ?2",
            vec![text(tenant_id), text(phone)],
        )
        .await
    }

    async fn find_contact_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<Contact>, DomainError> {
        self.contact_where(
            "c.tenant_id = ?1 AND c.email = ?2",
            vec![text(tenant_id), text(email)],
        )
        .await
    }

    async fn update_contact(&self, c: &Contact) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            UPDATE contacts SET phone_number = ?3, name = ?4, email = ?5,
                profile_picture_url = ?6, organization_id = ?7, metadata = ?8, updated_at = ?9
            WHERE tenant_id = ?1 AND id = ?2
            "#,
            params![
                c.tenant_id.as_str(),
                c.id.as_str(),
                c.phone_number.clone(),
                c.name.clone(),
                c.email.clone(),
                c.profile_picture_url.clone(),
                c.organization_id.clone(),
                c.metadata.to_string(),
                millis(c.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_contact(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let n = conn
            .execute(
                "DELETE FROM contacts WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        Ok(n > 0)
    }

    async fn list_contacts(
        &self,
        tenant_id: &str,
        query: &ContactQuery,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Contact>, i64), DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut where_sql = "c.tenant_id = ?1".to_string();
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(text(like_pattern(term)));
            where_sql.push_str(
                " AND (c.name LIKE ?2 ESCAPE '\\' OR c.phone_number LIKE ?2 ESCAPE '\\' \
                 OR c.email LIKE ?2 ESCAPE '\\')",
            );
        }
        let conn = self.conn().await?;
        let total = scalar_i64(
            &conn,
            &format!("SELECT COUNT(*) FROM contacts c WHERE {}", where_sql),
            values.clone(),
        )
        .await?;

        values.push(int(limit as i64));
        values.push(int(((page - 1) * limit) as i64));
        let sql = format!(
            "SELECT {}, {} FROM contacts c WHERE {} ORDER BY c.{} {} LIMIT ?{} OFFSET ?{}",
            CONTACT_COLUMNS,
            CONTACT_AGGREGATES,
            where_sql,
            query.sort_by.column(),
            query.sort_order.sql(),
            values.len() - 1,
            values.len()
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            contacts.push(contact_from_row(&row, true)?);
        }
        Ok((contacts, total))
    }

    async fn all_contacts(&self, tenant_id: &str) -> Result<Vec<Contact>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM contacts c WHERE c.tenant_id = ?1 ORDER BY c.created_at",
                    CONTACT_COLUMNS
                ),
                params![tenant_id],
            )
            .await
            .map_err(repo_err)?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            contacts.push(contact_from_row(&row, false)?);
        }
        Ok(contacts)
    }
}

const ORG_COLUMNS: &str = "o.id, o.tenant_id, o.name, o.website, o.industry, o.employees, \
    o.address, o.created_at, o.updated_at, \
    (SELECT COUNT(*) FROM contacts c WHERE c.organization_id = o.id)";

fn organization_from_row(row: &libsql::Row) -> Result<Organization, DomainError> {
    Ok(Organization {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        name: text_col(row, 2)?,
        website: opt_text(row, 3),
        industry: opt_text(row, 4),
        employees: opt_text(row, 5),
        address: opt_text(row, 6),
        created_at: time_col(row, 7)?,
        updated_at: time_col(row, 8)?,
        contacts_count: int_col(row, 9)?,
    })
}

impl SqliteRepo {
    async fn organization_where(
        &self,
        clause: &str,
        a: &str,
        b: &str,
    ) -> Result<Option<Organization>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM organizations o WHERE {}", ORG_COLUMNS, clause);
        let mut rows = conn.query(&sql, params![a, b]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(organization_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl OrganizationRepo for SqliteRepo {
    async fn create_organization(&self, o: &Organization) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO organizations (id, tenant_id, name, website, industry, employees, address,
                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                o.id.as_str(),
                o.tenant_id.as_str(),
                o.name.as_str(),
                o.website.clone(),
                o.industry.clone(),
                o.employees.clone(),
                o.address.clone(),
                millis(o.created_at),
                millis(o.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_organization(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Organization>, DomainError> {
        self.organization_where("o.tenant_id = ?1 AND o.id = ?2", tenant_id, id)
            .await
    }

    async fn find_organization_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Organization>, DomainError> {
        self.organization_where("o.tenant_id = ?1 AND o.name = ?2", tenant_id, name)
            .await
    }

    async fn update_organization(&self, o: &Organization) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            UPDATE organizations SET name = ?3, website = ?4, industry = ?5, employees = ?6,
                address = ?7, updated_at = ?8
            WHERE tenant_id = ?1 AND id = ?2
            "#,
            params![
                o.tenant_id.as_str(),
                o.id.as_str(),
                o.name.as_str(),
                o.website.clone(),
                o.industry.clone(),
                o.employees.clone(),
                o.address.clone(),
                millis(o.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_organization(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute(
            "UPDATE contacts SET organization_id = NULL WHERE tenant_id = ?1 AND organization_id = ?2",
            params![tenant_id, id],
        )
        .await
        .map_err(repo_err)?;
        let n = tx
            .execute(
                "DELETE FROM organizations WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        tx.commit().await.map_err(repo_err)?;
        Ok(n > 0)
    }

    async fn list_organizations(
        &self,
        tenant_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Organization>, DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut sql = format!("SELECT {} FROM organizations o WHERE o.tenant_id = ?1", ORG_COLUMNS);
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            values.push(text(like_pattern(term)));
            sql.push_str(" AND (o.name LIKE ?2 ESCAPE '\\' OR o.industry LIKE ?2 ESCAPE '\\')");
        }
        sql.push_str(" ORDER BY o.name");
        let conn = self.conn().await?;
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut orgs = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            orgs.push(organization_from_row(&row)?);
        }
        Ok(orgs)
    }
}
