//! SQLite-backed repository via libsql. Implements every repository port.
//!
//! One database file (`crm.db`) holds all tenants; every table carries
//! `tenant_id` and every query filters on it. A fresh connection is opened per
//! operation; multi-statement writes run in a transaction.
//! Timestamps are Unix milliseconds.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use libsql::Database;
use std::path::{Path, PathBuf};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS tenants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    plan TEXT NOT NULL,
    max_attendants INTEGER NOT NULL,
    max_messages INTEGER NOT NULL,
    trial_ends_at INTEGER,
    whatsapp_phone_number_id TEXT UNIQUE,
    whatsapp_business_account_id TEXT,
    whatsapp_access_token TEXT,
    whatsapp_app_secret TEXT,
    whatsapp_webhook_verify_token TEXT NOT NULL,
    messenger_page_id TEXT,
    instagram_account_id TEXT,
    n8n_api_key TEXT NOT NULL,
    n8n_webhook_url TEXT,
    n8n_webhook_url_messenger TEXT,
    n8n_webhook_url_instagram TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, email)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    website TEXT,
    industry TEXT,
    employees TEXT,
    address TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    channel TEXT NOT NULL,
    external_id TEXT NOT NULL,
    phone_number TEXT,
    name TEXT,
    email TEXT,
    profile_picture_url TEXT,
    organization_id TEXT REFERENCES organizations(id) ON DELETE SET NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, channel, external_id)
)"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_email ON contacts (tenant_id, email) WHERE email IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_contacts_phone ON contacts (tenant_id, phone_number)",
    r#"
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, name)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS quick_replies (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    shortcut TEXT NOT NULL,
    content TEXT NOT NULL,
    category TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_by_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, shortcut)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
    channel TEXT NOT NULL,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    assigned_to_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    ia_locked INTEGER NOT NULL DEFAULT 0,
    last_message_at INTEGER NOT NULL,
    closed_at INTEGER,
    created_at INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_contact ON conversations (tenant_id, contact_id, last_message_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_status ON conversations (tenant_id, status, last_message_at DESC)",
    r#"
CREATE TABLE IF NOT EXISTS conversation_tags (
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (conversation_id, tag_id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    external_id TEXT,
    direction TEXT NOT NULL,
    type TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL,
    timestamp INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_messages_external ON messages (tenant_id, external_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages (conversation_id, timestamp)",
    r#"
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    tenant_id TEXT,
    user_id TEXT,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id TEXT,
    old_data TEXT,
    new_data TEXT,
    metadata TEXT,
    created_at INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_tenant ON audit_logs (tenant_id, created_at DESC)",
];

/// SQLite repository. Safe to share via `Arc`.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) `crm.db` under `base_dir` and ensure the schema exists.
    ///
    /// WAL mode with synchronous=NORMAL for concurrent readers alongside one writer.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join("crm.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row; use query and drain it (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        for ddl in SCHEMA {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    /// New connection with foreign key enforcement (a per-connection setting in SQLite).
    pub(crate) async fn conn(&self) -> Result<libsql::Connection, DomainError> {
        let conn = self.db.connect().map_err(repo_err)?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(repo_err)?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

pub(crate) fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// Like `repo_err`, but a unique-constraint violation becomes `BadRequest`.
pub(crate) fn write_err(e: libsql::Error) -> DomainError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DomainError::BadRequest(format!("duplicate value: {}", msg))
    } else {
        DomainError::Repo(msg)
    }
}

pub(crate) fn millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn opt_millis(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(|d| d.timestamp_millis())
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn text_col(row: &libsql::Row, idx: i32) -> Result<String, DomainError> {
    row.get::<String>(idx).map_err(repo_err)
}

pub(crate) fn int_col(row: &libsql::Row, idx: i32) -> Result<i64, DomainError> {
    row.get::<i64>(idx).map_err(repo_err)
}

pub(crate) fn time_col(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>, DomainError> {
    int_col(row, idx).map(from_millis)
}

/// Read a nullable TEXT column (NULL becomes `None`).
pub(crate) fn opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn opt_time(row: &libsql::Row, idx: i32) -> Option<DateTime<Utc>> {
    row.get::<i64>(idx).ok().map(from_millis)
}

/// Parse a TEXT column holding one of the domain's text enums.
pub(crate) fn enum_col<T>(row: &libsql::Row, idx: i32) -> Result<T, DomainError>
where
    T: std::str::FromStr<Err = DomainError>,
{
    let s = text_col(row, idx)?;
    s.parse::<T>()
        .map_err(|e| DomainError::Repo(format!("corrupt row: {}", e)))
}

/// `%term%` pattern for LIKE, with wildcards in the term escaped (ESCAPE '\').
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Drain the first column of a single-row aggregate (`SELECT COUNT(*)`).
pub(crate) async fn scalar_i64(
    conn: &libsql::Connection,
    sql: &str,
    params: Vec<libsql::Value>,
) -> Result<i64, DomainError> {
    let mut rows = conn
        .query(sql, libsql::params_from_iter(params))
        .await
        .map_err(repo_err)?;
    match rows.next().await.map_err(repo_err)? {
        Some(row) => Ok(row.get::<i64>(0).unwrap_or(0)),
        None => Ok(0),
    }
}

pub(crate) fn text(s: impl Into<String>) -> libsql::Value {
    libsql::Value::Text(s.into())
}

pub(crate) fn int(n: i64) -> libsql::Value {
    libsql::Value::Integer(n)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::{Plan, Tenant, TenantStatus};
    use crate::ports::TenantRepo;
    use tempfile::TempDir;

    pub async fn repo() -> (TempDir, SqliteRepo) {
        let dir = TempDir::new().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        (dir, repo)
    }

    pub fn tenant(slug: &str) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("Hotel {}", slug),
            slug: slug.to_string(),
            email: format!("{}@hotel.test", slug),
            status: TenantStatus::Active,
            plan: Plan::Basic,
            max_attendants: 10,
            max_messages: 10_000,
            trial_ends_at: None,
            whatsapp_phone_number_id: None,
            whatsapp_business_account_id: None,
            whatsapp_access_token: None,
            whatsapp_app_secret: None,
            whatsapp_webhook_verify_token: "verify".into(),
            messenger_page_id: None,
            instagram_account_id: None,
            n8n_api_key: "key".into(),
            n8n_webhook_url: None,
            n8n_webhook_url_messenger: None,
            n8n_webhook_url_instagram: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn seeded_tenant(repo: &SqliteRepo, slug: &str) -> Tenant {
        let t = tenant(slug);
        repo.create_tenant(&t).await.unwrap();
        t
    }
}
