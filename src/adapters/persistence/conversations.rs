//! Conversations, their tags, and messages.

use super::sqlite_repo::{
    enum_col, int, int_col, like_pattern, millis, opt_millis, opt_text, opt_time, repo_err,
    scalar_i64, text, text_col, time_col, write_err, SqliteRepo,
};
use crate::domain::inputs::ConversationQuery;
use crate::domain::{
    ContactSummary, Conversation, ConversationStatus, ConversationView, DomainError, Message,
    MessageStatus, StatusCount, TagSummary,
};
use crate::ports::{ConversationRepo, MessageRepo};
use chrono::{DateTime, Utc};
use libsql::params;
use std::collections::HashMap;

const CONVERSATION_COLUMNS: &str = "v.id, v.tenant_id, v.contact_id, v.channel, v.status, \
    v.priority, v.assigned_to_id, v.ia_locked, v.last_message_at, v.closed_at, v.created_at";

/// Conversation columns (0..=10), then contact summary and card aggregates (11..=16).
const VIEW_SELECT: &str = "SELECT v.id, v.tenant_id, v.contact_id, v.channel, v.status, \
    v.priority, v.assigned_to_id, v.ia_locked, v.last_message_at, v.closed_at, v.created_at, \
    c.name, c.phone_number, c.profile_picture_url, c.channel, \
    (SELECT m.content FROM messages m WHERE m.conversation_id = v.id \
        ORDER BY m.timestamp DESC LIMIT 1), \
    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = v.id \
        AND m.direction = 'INBOUND' AND m.status IN ('RECEIVED', 'DELIVERED')) \
    FROM conversations v JOIN contacts c ON c.id = v.contact_id";

fn conversation_from_row(row: &libsql::Row) -> Result<Conversation, DomainError> {
    Ok(Conversation {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        contact_id: text_col(row, 2)?,
        channel: enum_col(row, 3)?,
        status: enum_col(row, 4)?,
        priority: enum_col(row, 5)?,
        assigned_to_id: opt_text(row, 6),
        ia_locked: int_col(row, 7)? != 0,
        last_message_at: time_col(row, 8)?,
        closed_at: opt_time(row, 9),
        created_at: time_col(row, 10)?,
        tag_ids: Vec::new(),
    })
}

fn view_from_row(row: &libsql::Row) -> Result<ConversationView, DomainError> {
    let conversation = conversation_from_row(row)?;
    let contact = ContactSummary {
        id: conversation.contact_id.clone(),
        name: opt_text(row, 11),
        phone_number: opt_text(row, 12),
        profile_picture_url: opt_text(row, 13),
        channel: enum_col(row, 14)?,
    };
    Ok(ConversationView {
        conversation,
        contact,
        tags: Vec::new(),
        last_message: opt_text(row, 15),
        unread_count: row.get::<i64>(16).unwrap_or(0),
    })
}

/// `?{start}, ?{start+1}, …` for an IN list of `n` values.
fn placeholders(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

const MESSAGE_COLUMNS: &str = "id, tenant_id, conversation_id, external_id, direction, type, \
    content, metadata, status, timestamp";

fn message_from_row(row: &libsql::Row) -> Result<Message, DomainError> {
    let metadata = text_col(row, 7)?;
    Ok(Message {
        id: text_col(row, 0)?,
        tenant_id: text_col(row, 1)?,
        conversation_id: text_col(row, 2)?,
        external_id: opt_text(row, 3),
        direction: enum_col(row, 4)?,
        message_type: enum_col(row, 5)?,
        content: text_col(row, 6)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        status: enum_col(row, 8)?,
        timestamp: time_col(row, 9)?,
    })
}

impl SqliteRepo {
    async fn tag_ids_of(
        &self,
        conn: &libsql::Connection,
        conversation_id: &str,
    ) -> Result<Vec<String>, DomainError> {
        let mut rows = conn
            .query(
                "SELECT tag_id FROM conversation_tags WHERE conversation_id = ?1 ORDER BY created_at",
                params![conversation_id],
            )
            .await
            .map_err(repo_err)?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            ids.push(text_col(&row, 0)?);
        }
        Ok(ids)
    }

    /// Attach tag summaries (and tag ids) to each card with one IN query.
    async fn attach_tags(
        &self,
        conn: &libsql::Connection,
        views: &mut [ConversationView],
    ) -> Result<(), DomainError> {
        if views.is_empty() {
            return Ok(());
        }
        let ids: Vec<libsql::Value> = views.iter().map(|v| text(v.conversation.id.as_str())).collect();
        let sql = format!(
            "SELECT ct.conversation_id, t.id, t.name, t.color FROM conversation_tags ct \
             JOIN tags t ON t.id = ct.tag_id WHERE ct.conversation_id IN ({}) \
             ORDER BY t.name",
            placeholders(1, ids.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(ids))
            .await
            .map_err(repo_err)?;
        let mut by_conversation: HashMap<String, Vec<TagSummary>> = HashMap::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            by_conversation
                .entry(text_col(&row, 0)?)
                .or_default()
                .push(TagSummary {
                    id: text_col(&row, 1)?,
                    name: text_col(&row, 2)?,
                    color: text_col(&row, 3)?,
                });
        }
        for view in views.iter_mut() {
            if let Some(tags) = by_conversation.remove(&view.conversation.id) {
                view.conversation.tag_ids = tags.iter().map(|t| t.id.clone()).collect();
                view.tags = tags;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationRepo for SqliteRepo {
    async fn create_conversation(&self, v: &Conversation) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO conversations (id, tenant_id, contact_id, channel, status, priority,
                assigned_to_id, ia_locked, last_message_at, closed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                v.id.as_str(),
                v.tenant_id.as_str(),
                v.contact_id.as_str(),
                v.channel.as_str(),
                v.status.as_str(),
                v.priority.as_str(),
                v.assigned_to_id.clone(),
                v.ia_locked as i64,
                millis(v.last_message_at),
                opt_millis(v.closed_at),
                millis(v.created_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Conversation>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM conversations v WHERE v.tenant_id = ?1 AND v.id = ?2",
                    CONVERSATION_COLUMNS
                ),
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(None);
        };
        let mut conversation = conversation_from_row(&row)?;
        conversation.tag_ids = self.tag_ids_of(&conn, &conversation.id).await?;
        Ok(Some(conversation))
    }

    async fn find_latest_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        statuses: &[ConversationStatus],
    ) -> Result<Option<Conversation>, DomainError> {
        if statuses.is_empty() {
            return Ok(None);
        }
        let mut values = vec![text(tenant_id), text(contact_id)];
        values.extend(statuses.iter().map(|s| text(s.as_str())));
        let sql = format!(
            "SELECT {} FROM conversations v WHERE v.tenant_id = ?1 AND v.contact_id = ?2 \
             AND v.status IN ({}) ORDER BY v.last_message_at DESC, v.created_at DESC LIMIT 1",
            CONVERSATION_COLUMNS,
            placeholders(3, statuses.len())
        );
        let conn = self.conn().await?;
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(None);
        };
        let mut conversation = conversation_from_row(&row)?;
        conversation.tag_ids = self.tag_ids_of(&conn, &conversation.id).await?;
        Ok(Some(conversation))
    }

    async fn update_conversation(&self, v: &Conversation) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            UPDATE conversations SET status = ?3, priority = ?4, assigned_to_id = ?5,
                ia_locked = ?6, last_message_at = ?7, closed_at = ?8
            WHERE tenant_id = ?1 AND id = ?2
            "#,
            params![
                v.tenant_id.as_str(),
                v.id.as_str(),
                v.status.as_str(),
                v.priority.as_str(),
                v.assigned_to_id.clone(),
                v.ia_locked as i64,
                millis(v.last_message_at),
                opt_millis(v.closed_at)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn touch_conversation(
        &self,
        tenant_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE conversations SET last_message_at = MAX(last_message_at, ?3) \
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id, millis(at)],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        tenant_id: &str,
        query: &ConversationQuery,
        statuses: &[ConversationStatus],
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ConversationView>, i64), DomainError> {
        let mut values = vec![text(tenant_id)];
        let mut filters = vec!["v.tenant_id = ?1".to_string()];
        if !statuses.is_empty() {
            let start = values.len() + 1;
            values.extend(statuses.iter().map(|s| text(s.as_str())));
            filters.push(format!("v.status IN ({})", placeholders(start, statuses.len())));
        }
        if let Some(priority) = query.priority {
            values.push(text(priority.as_str()));
            filters.push(format!("v.priority = ?{}", values.len()));
        }
        if let Some(assignee) = &query.assigned_to_id {
            values.push(text(assignee.as_str()));
            filters.push(format!("v.assigned_to_id = ?{}", values.len()));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(text(like_pattern(term)));
            let n = values.len();
            filters.push(format!(
                "(c.name LIKE ?{n} ESCAPE '\\' OR c.phone_number LIKE ?{n} ESCAPE '\\')"
            ));
        }
        let where_sql = filters.join(" AND ");
        let conn = self.conn().await?;
        let total = scalar_i64(
            &conn,
            &format!(
                "SELECT COUNT(*) FROM conversations v JOIN contacts c ON c.id = v.contact_id \
                 WHERE {}",
                where_sql
            ),
            values.clone(),
        )
        .await?;

        values.push(int(limit as i64));
        values.push(int(((page.max(1) - 1) * limit) as i64));
        let sql = format!(
            "{} WHERE {} ORDER BY v.last_message_at DESC LIMIT ?{} OFFSET ?{}",
            VIEW_SELECT,
            where_sql,
            values.len() - 1,
            values.len()
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(repo_err)?;
        let mut views = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            views.push(view_from_row(&row)?);
        }
        self.attach_tags(&conn, &mut views).await?;
        Ok((views, total))
    }

    async fn conversation_view(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<ConversationView>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!("{} WHERE v.tenant_id = ?1 AND v.id = ?2", VIEW_SELECT),
                params![tenant_id, id],
            )
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(None);
        };
        let mut views = vec![view_from_row(&row)?];
        drop(rows);
        self.attach_tags(&conn, &mut views).await?;
        Ok(views.pop())
    }

    async fn add_conversation_tag(
        &self,
        conversation_id: &str,
        tag_id: &str,
    ) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO conversation_tags (conversation_id, tag_id, created_at) \
             VALUES (?1, ?2, ?3) ON CONFLICT (conversation_id, tag_id) DO NOTHING",
            params![conversation_id, tag_id, millis(Utc::now())],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn remove_conversation_tag(
        &self,
        conversation_id: &str,
        tag_id: &str,
    ) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let n = conn
            .execute(
                "DELETE FROM conversation_tags WHERE conversation_id = ?1 AND tag_id = ?2",
                params![conversation_id, tag_id],
            )
            .await
            .map_err(repo_err)?;
        Ok(n > 0)
    }

    async fn set_conversation_tags(
        &self,
        conversation_id: &str,
        tag_ids: &[String],
    ) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute(
            "DELETE FROM conversation_tags WHERE conversation_id = ?1",
            params![conversation_id],
        )
        .await
        .map_err(repo_err)?;
        let now = millis(Utc::now());
        for tag_id in tag_ids {
            tx.execute(
                "INSERT INTO conversation_tags (conversation_id, tag_id, created_at) \
                 VALUES (?1, ?2, ?3) ON CONFLICT (conversation_id, tag_id) DO NOTHING",
                params![conversation_id, tag_id.as_str(), now],
            )
            .await
            .map_err(write_err)?;
        }
        tx.commit().await.map_err(repo_err)?;
        Ok(())
    }

    async fn count_conversations_by_status(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<StatusCount>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT status, COUNT(*) FROM conversations WHERE tenant_id = ?1 \
                 GROUP BY status ORDER BY status",
                params![tenant_id],
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
}

#[async_trait::async_trait]
impl MessageRepo for SqliteRepo {
    async fn create_message(&self, m: &Message) -> Result<(), DomainError> {
        let metadata =
            serde_json::to_string(&m.metadata).map_err(|e| DomainError::Repo(e.to_string()))?;
        let conn = self.conn().await?;
        conn.execute(
            &format!(
                "INSERT INTO messages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                MESSAGE_COLUMNS
            ),
            params![
                m.id.as_str(),
                m.tenant_id.as_str(),
                m.conversation_id.as_str(),
                m.external_id.clone(),
                m.direction.as_str(),
                m.message_type.as_str(),
                m.content.as_str(),
                metadata,
                m.status.as_str(),
                millis(m.timestamp)
            ],
        )
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn message_exists(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let n = scalar_i64(
            &conn,
            "SELECT COUNT(*) FROM messages WHERE tenant_id = ?1 AND external_id = ?2",
            vec![text(tenant_id), text(external_id)],
        )
        .await?;
        Ok(n > 0)
    }

    async fn update_message_status(
        &self,
        tenant_id: &str,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM messages WHERE tenant_id = ?1 AND external_id = ?2 LIMIT 1",
                    MESSAGE_COLUMNS
                ),
                params![tenant_id, external_id],
            )
            .await
            .map_err(repo_err)?;
        let Some(row) = rows.next().await.map_err(repo_err)? else {
            return Ok(None);
        };
        let mut message = message_from_row(&row)?;
        drop(rows);
        if !message.status.advances_to(status) {
            return Ok(Some(message));
        }
        conn.execute(
            "UPDATE messages SET status = ?2 WHERE id = ?1",
            params![message.id.as_str(), status.as_str()],
        )
        .await
        .map_err(repo_err)?;
        message.status = status;
        Ok(Some(message))
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Message>, i64), DomainError> {
        let conn = self.conn().await?;
        let total = scalar_i64(
            &conn,
            "SELECT COUNT(*) FROM messages WHERE tenant_id = ?1 AND conversation_id = ?2",
            vec![text(tenant_id), text(conversation_id)],
        )
        .await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM messages WHERE tenant_id = ?1 AND conversation_id = ?2 \
                     ORDER BY timestamp ASC, rowid ASC LIMIT ?3 OFFSET ?4",
                    MESSAGE_COLUMNS
                ),
                params![
                    tenant_id,
                    conversation_id,
                    limit as i64,
                    ((page.max(1) - 1) * limit) as i64
                ],
            )
            .await
            .map_err(repo_err)?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            messages.push(message_from_row(&row)?);
        }
        Ok((messages, total))
    }

    async fn mark_conversation_read(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<u64, DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE messages SET status = 'READ' WHERE tenant_id = ?1 AND conversation_id = ?2 \
             AND direction = 'INBOUND' AND status IN ('RECEIVED', 'DELIVERED')",
            params![tenant_id, conversation_id],
        )
        .await
        .map_err(repo_err)
    }

    async fn count_unread(&self, tenant_id: &str) -> Result<i64, DomainError> {
        let mut values = vec![text(tenant_id)];
        values.extend(ConversationStatus::ACTIVE.iter().map(|s| text(s.as_str())));
        let sql = format!(
            "SELECT COUNT(*) FROM messages m JOIN conversations v ON v.id = m.conversation_id \
             WHERE m.tenant_id = ?1 AND m.direction = 'INBOUND' \
             AND m.status IN ('RECEIVED', 'DELIVERED') AND v.status IN ({})",
            placeholders(2, ConversationStatus::ACTIVE.len())
        );
        let conn = self.conn().await?;
        scalar_i64(&conn, &sql, values).await
    }
}
