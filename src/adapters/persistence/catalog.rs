//! Tags and quick replies.

use super::sqlite_repo::{
    int_col, like_pattern, millis, opt_text, repo_err, text, text_col, time_col, write_err,
    SqliteRepo,
};
use crate::domain::inputs::QuickReplyQuery;
use crate::domain::{DomainError, QuickReply, Tag};
use crate::ports::{QuickReplyRepo, TagRepo};
use libsql::params;

const TAG_COLUMNS: &str = "t.id, t.tenant_id, t.name, t.color, t.created_at, \
    (SELECT COUNT(*) FROM conversation_tags ct WHERE ct.tag_id = t.id)";

fn tag_from_row(row: &libsql::Row) -> Result<Tag, DomainError> {
    Ok(Tag {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        name: text_col(row, 2)?,
        color: text_col(row, 3)?,
        created_at: time_col(row, 4)?,
        conversations_count: int_col(row, 5)?,
    })
}

impl SqliteRepo {
    async fn tag_where(&self, clause: &str, a: &str, b: &str) -> Result<Option<Tag>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM tags t WHERE {}", TAG_COLUMNS, clause);
        let mut rows = conn.query(&sql, params![a, b]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(tag_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl TagRepo for SqliteRepo {
    async fn create_tag(&self, tag: &Tag) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO tags (id, tenant_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tag.id.as_str(),
                tag.tenant_id.as_str(),
                tag.name.as_str(),
                tag.color.as_str(),
                millis(tag.created_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_tag(&self, tenant_id: &str, id: &str) -> Result<Option<Tag>, DomainError> {
        self.tag_where("t.tenant_id = ?1 AND t.id = ?2", tenant_id, id)
            .await
    }

    async fn find_tag_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Tag>, DomainError> {
        self.tag_where("t.tenant_id = ?1 AND t.name = ?2", tenant_id, name)
            .await
    }

    async fn update_tag(&self, tag: &Tag) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE tags SET name = ?3, color = ?4 WHERE tenant_id = ?1 AND id = ?2",
            params![
                tag.tenant_id.as_str(),
                tag.id.as_str(),
                tag.name.as_str(),
                tag.color.as_str()
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_tag(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute(
            "DELETE FROM conversation_tags WHERE tag_id IN \
             (SELECT id FROM tags WHERE tenant_id = ?1 AND id = ?2)",
            params![tenant_id, id],
        )
        .await
        .map_err(repo_err)?;
        let n = tx
            .execute(
                "DELETE FROM tags WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        tx.commit().await.map_err(repo_err)?;
        Ok(n > 0)
    }

    async fn list_tags(
        &self,
        tenant_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Tag>, DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut sql = format!("SELECT {} FROM tags t WHERE t.tenant_id = ?1", TAG_COLUMNS);
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            values.push(text(like_pattern(term)));
            sql.push_str(" AND t.name LIKE ?2 ESCAPE '\\'");
        }
        sql.push_str(" ORDER BY t.name");
        let conn = self.conn().await?;
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            tags.push(tag_from_row(&row)?);
        }
        Ok(tags)
    }
}

const QUICK_REPLY_COLUMNS: &str = "id, tenant_id, title, shortcut, content, category, sort_order, \
    is_active, created_by_id, created_at, updated_at";

fn quick_reply_from_row(row: &libsql::Row) -> Result<QuickReply, DomainError> {
    Ok(QuickReply {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        title: text_col(row, 2)?,
        shortcut: text_col(row, 3)?,
        content: text_col(row, 4)?,
        category: opt_text(row, 5),
        order: int_col(row, 6)?,
        is_active: int_col(row, 7)? != 0,
        created_by_id: opt_text(row, 8),
        created_at: time_col(row, 9)?,
        updated_at: time_col(row, 10)?,
    })
}

impl SqliteRepo {
    async fn quick_reply_where(
        &self,
        clause: &str,
        a: &str,
        b: &str,
    ) -> Result<Option<QuickReply>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM quick_replies WHERE {}", QUICK_REPLY_COLUMNS, clause);
        let mut rows = conn.query(&sql, params![a, b]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(quick_reply_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl QuickReplyRepo for SqliteRepo {
    async fn create_quick_reply(&self, r: &QuickReply) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            &format!(
                "INSERT INTO quick_replies ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                QUICK_REPLY_COLUMNS
            ),
            params![
                r.id.as_str(),
                r.tenant_id.as_str(),
                r.title.as_str(),
                r.shortcut.as_str(),
                r.content.as_str(),
                r.category.clone(),
                r.order,
                r.is_active as i64,
                r.created_by_id.clone(),
                millis(r.created_at),
                millis(r.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_quick_reply(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<QuickReply>, DomainError> {
        self.quick_reply_where("tenant_id = ?1 AND id = ?2", tenant_id, id)
            .await
    }

    async fn find_quick_reply_by_shortcut(
        &self,
        tenant_id: &str,
        shortcut: &str,
    ) -> Result<Option<QuickReply>, DomainError> {
        self.quick_reply_where("tenant_id = ?1 AND shortcut = ?2", tenant_id, shortcut)
            .await
    }

    async fn update_quick_reply(&self, r: &QuickReply) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            UPDATE quick_replies SET title = ?3, shortcut = ?4, content = ?5, category = ?6,
                sort_order = ?7, is_active = ?8, updated_at = ?9
            WHERE tenant_id = ?1 AND id = ?2
            "#,
            params![
                r.tenant_id.as_str(),
                r.id.as_str(),
                r.title.as_str(),
                r.shortcut.as_str(),
                r.content.as_str(),
                r.category.clone(),
                r.order,
                r.is_active as i64,
                millis(r.updated_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_quick_reply(&self, tenant_id: &str, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let n = conn
            .execute(
                "DELETE FROM quick_replies WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        Ok(n > 0)
    }

    async fn list_quick_replies(
        &self,
        tenant_id: &str,
        query: &QuickReplyQuery,
    ) -> Result<Vec<QuickReply>, DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut sql = format!(
            "SELECT {} FROM quick_replies WHERE tenant_id = ?1",
            QUICK_REPLY_COLUMNS
        );
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(text(like_pattern(term)));
            let n = values.len();
            sql.push_str(&format!(
                " AND (title LIKE ?{n} ESCAPE '\\' OR shortcut LIKE ?{n} ESCAPE '\\' \
                 OR content LIKE ?{n} ESCAPE '\\')"
            ));
        }
        if let Some(category) = &query.category {
            values.push(text(category.as_str()));
            sql.push_str(&format!(" AND category = ?{}", values.len()));
        }
        if let Some(active) = query.is_active {
            values.push(libsql::Value::Integer(active as i64));
            sql.push_str(&format!(" AND is_active = ?{}", values.len()));
        }
        // NULL categories sort first in SQLite.
        sql.push_str(" ORDER BY category, sort_order, title");
        let conn = self.conn().await?;
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut replies = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            replies.push(quick_reply_from_row(&row)?);
        }
        Ok(replies)
    }
}
