//! Audit log storage and report aggregates.

use super::sqlite_repo::{
    enum_col, int, int_col, millis, opt_text, repo_err, scalar_i64, text, text_col, time_col,
    write_err, SqliteRepo,
};
use crate::domain::inputs::AuditLogQuery;
use crate::domain::{AuditLog, DomainError, StatusCount, User};
use crate::ports::{AttendantTotals, AuditLogRepo, ReportRepo};
use chrono::{DateTime, Utc};
use libsql::params;

const AUDIT_COLUMNS: &str =
    "id, tenant_id, user_id, action, entity, entity_id, old_data, new_data, metadata, created_at";

fn json_col(row: &libsql::Row, idx: i32) -> Option<serde_json::Value> {
    opt_text(row, idx).and_then(|s| serde_json::from_str(&s).ok())
}

fn audit_from_row(row: &libsql::Row) -> Result<AuditLog, DomainError> {
    Ok(AuditLog {
        id: text_col(row, 0)?,
        tenant_id: opt_text(row, 1),
        user_id: opt_text(row, 2),
        action: text_col(row, 3)?,
        entity: text_col(row, 4)?,
        entity_id: opt_text(row, 5),
        old_data: json_col(row, 6),
        new_data: json_col(row, 7),
        metadata: json_col(row, 8),
        created_at: time_col(row, 9)?,
    })
}

#[async_trait::async_trait]
impl AuditLogRepo for SqliteRepo {
    async fn insert_audit_log(&self, e: &AuditLog) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            &format!(
                "INSERT INTO audit_logs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                AUDIT_COLUMNS
            ),
            params![
                e.id.as_str(),
                e.tenant_id.clone(),
                e.user_id.clone(),
                e.action.as_str(),
                e.entity.as_str(),
                e.entity_id.clone(),
                e.old_data.as_ref().map(|v| v.to_string()),
                e.new_data.as_ref().map(|v| v.to_string()),
                e.metadata.as_ref().map(|v| v.to_string()),
                millis(e.created_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        tenant_id: &str,
        query: &AuditLogQuery,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<AuditLog>, i64), DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut filters = vec!["tenant_id = ?1".to_string()];
        for (column, value) in [
            ("action", &query.action),
            ("entity", &query.entity),
            ("user_id", &query.user_id),
        ] {
            if let Some(v) = value {
                values.push(text(v.as_str()));
                filters.push(format!("{} = ?{}", column, values.len()));
            }
        }
        if let Some(start) = query.start_date {
            values.push(int(millis(start)));
            filters.push(format!("created_at >= ?{}", values.len()));
        }
        if let Some(end) = query.end_date {
            values.push(int(millis(end)));
            filters.push(format!("created_at <= ?{}", values.len()));
        }
        let where_sql = filters.join(" AND ");
        let conn = self.conn().await?;
        let total = scalar_i64(
            &conn,
            &format!("SELECT COUNT(*) FROM audit_logs WHERE {}", where_sql),
            values.clone(),
        )
        .await?;
        values.push(int(limit as i64));
        values.push(int(((page.max(1) - 1) * limit) as i64));
        let sql = format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC, rowid DESC \
             LIMIT ?{} OFFSET ?{}",
            AUDIT_COLUMNS,
            where_sql,
            values.len() - 1,
            values.len()
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            logs.push(audit_from_row(&row)?);
        }
        Ok((logs, total))
    }

    async fn get_audit_log(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<AuditLog>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM audit_logs WHERE tenant_id = ?1 AND id = ?2",
                    AUDIT_COLUMNS
                ),
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(audit_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ReportRepo for SqliteRepo {
    async fn count_conversations_created(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let conn = self.conn().await?;
        scalar_i64(
            &conn,
            "SELECT COUNT(*) FROM conversations WHERE tenant_id = ?1 \
             AND created_at >= ?2 AND created_at < ?3",
            vec![text(tenant_id), int(millis(from)), int(millis(to))],
        )
        .await
    }

    async fn conversations_by_status_created(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatusCount>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT status, COUNT(*) FROM conversations WHERE tenant_id = ?1 \
                 AND created_at >= ?2 AND created_at < ?3 GROUP BY status ORDER BY COUNT(*) DESC",
                params![tenant_id, millis(from), millis(to)],
            )
            .await
            .map_err(repo_err)?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            counts.push(StatusCount {
                status: enum_col(&row, 0)?,
                count: int_col(&row, 1)?,
            });
        }
        Ok(counts)
    }

    async fn average_resolution_minutes(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT AVG(closed_at - created_at) FROM conversations WHERE tenant_id = ?1 \
                 AND created_at >= ?2 AND created_at < ?3 AND status = 'CLOSED' \
                 AND closed_at IS NOT NULL",
                params![tenant_id, millis(from), millis(to)],
            )
            .await
            .map_err(repo_err)?;
        let avg_ms = match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<f64>(0).unwrap_or(0.0),
            None => 0.0,
        };
        Ok((avg_ms / 60_000.0).round() as i64)
    }

    async fn attendant_totals(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendantTotals>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT u.id, u.tenant_id, u.name, u.email, u.role, u.status, u.created_at,
                    COUNT(v.id),
                    COALESCE(SUM(CASE WHEN v.status = 'CLOSED' THEN 1 ELSE 0 END), 0)
                FROM users u
                LEFT JOIN conversations v ON v.assigned_to_id = u.id
                    AND v.created_at >= ?2 AND v.created_at < ?3
                WHERE u.tenant_id = ?1
                GROUP BY u.id
                ORDER BY COUNT(v.id) DESC, u.name
                "#,
                params![tenant_id, millis(from), millis(to)],
            )
            .await
            .map_err(repo_err)?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            totals.push(AttendantTotals {
                user: User {
                    id: text_col(&row, 0)?,
                    tenant_id: text_col(&row, 1)?,
                    name: text_col(&row, 2)?,
                    email: text_col(&row, 3)?,
                    role: enum_col(&row, 4)?,
                    status: enum_col(&row, 5)?,
                    created_at: time_col(&row, 6)?,
                },
                conversations: int_col(&row, 7)?,
                resolved: int_col(&row, 8)?,
            });
        }
        Ok(totals)
    }

    async fn inbound_by_hour(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(u32, i64)>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT CAST(strftime('%H', timestamp / 1000, 'unixepoch') AS INTEGER) AS hour, \
                 COUNT(*) FROM messages WHERE tenant_id = ?1 AND direction = 'INBOUND' \
                 AND timestamp >= ?2 AND timestamp < ?3 GROUP BY hour ORDER BY hour",
                params![tenant_id, millis(from), millis(to)],
            )
            .await
            .map_err(repo_err)?;
        let mut hours = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            hours.push((int_col(&row, 0)? as u32, int_col(&row, 1)?));
        }
        Ok(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::super::sqlite_repo::test_support::{repo, seeded_tenant};
    use super::*;
    use chrono::Duration;

    fn entry(tenant_id: &str, action: &str, at: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: Some(tenant_id.to_string()),
            user_id: None,
            action: action.to_string(),
            entity: "Tag".into(),
            entity_id: None,
            old_data: None,
            new_data: Some(serde_json::json!({ "name": "VIP" })),
            metadata: None,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn audit_logs_newest_first_with_filters() {
        let (_dir, repo) = repo().await;
        let t = seeded_tenant(&repo, "hotel-audit").await;
        let now = Utc::now();
        repo.insert_audit_log(&entry(&t.id, "TAG_CREATED", now - Duration::hours(2)))
            .await
            .unwrap();
        repo.insert_audit_log(&entry(&t.id, "TAG_DELETED", now))
            .await
            .unwrap();

        let (logs, total) = repo
            .list_audit_logs(&t.id, &AuditLogQuery::default(), 1, 20)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(logs[0].action, "TAG_DELETED");
        assert_eq!(logs[1].new_data, Some(serde_json::json!({ "name": "VIP" })));

        let query = AuditLogQuery {
            start_date: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        let (logs, total) = repo.list_audit_logs(&t.id, &query, 1, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].action, "TAG_DELETED");
    }
}
