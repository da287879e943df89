//! SQLite Storage
//!
//! Durable browser sessions and the identity directory.
//!
//! # Notes
//!
//! - All SQL queries use parameterized statements
//! - Timestamps are stored as Unix epoch milliseconds
//! - Every query runs on the blocking pool so a slow disk never stalls the
//!   async workers serving polls

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::persistence::{BrowserSessionStore, IdentityDirectory};
use crate::error::{Error, Result};
use crate::models::{IdentityRecord, PersistedBrowserSession};

/// SQLite-backed [`BrowserSessionStore`] and [`IdentityDirectory`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

const SESSION_COLUMNS: &str = "session_token, approver_public_key, approver_handle, \
     requester_info, device_info, created_at, expires_at, last_used_at, is_active";

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::Storage(e.to_string()))?;

        conn.execute_batch(
            r#"
            -- Registered identities
            CREATE TABLE IF NOT EXISTS identities (
                public_key TEXT PRIMARY KEY,
                handle TEXT,
                encryption_key TEXT,
                registered_at INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_identities_handle ON identities(handle);

            -- Browser sessions issued by pairing
            CREATE TABLE IF NOT EXISTS browser_sessions (
                session_token TEXT PRIMARY KEY,
                approver_public_key TEXT NOT NULL,
                approver_handle TEXT,
                requester_info TEXT NOT NULL,
                device_info TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_used_at INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_browser_sessions_identity
                ON browser_sessions(approver_public_key, is_active);
            "#,
        )?;

        Ok(())
    }

    // ==================== Identity Operations ====================

    /// Register or update an identity.
    pub fn register_identity(&self, record: &IdentityRecord) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::Storage(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO identities (public_key, handle, encryption_key, registered_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(public_key) DO UPDATE SET
                handle = excluded.handle,
                encryption_key = excluded.encryption_key
            "#,
            params![
                record.public_key.to_lowercase(),
                record.handle,
                record.encryption_key,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|e| Error::Storage(e.to_string()))?;
            f(&guard)
        })
        .await?
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<PersistedBrowserSession> {
    let device_info: String = row.get(4)?;
    Ok(PersistedBrowserSession {
        session_token: row.get(0)?,
        approver_public_key: row.get(1)?,
        approver_handle: row.get(2)?,
        requester_info: row.get(3)?,
        device_info: serde_json::from_str(&device_info).unwrap_or(serde_json::Value::Null),
        created_at: from_millis(row.get(5)?),
        expires_at: from_millis(row.get(6)?),
        last_used_at: from_millis(row.get(7)?),
        is_active: row.get::<_, i64>(8)? != 0,
    })
}

#[async_trait]
impl BrowserSessionStore for SqliteStore {
    async fn create(&self, session: PersistedBrowserSession) -> Result<()> {
        let device_info = serde_json::to_string(&session.device_info)?;
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO browser_sessions ({SESSION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    session.session_token,
                    session.approver_public_key,
                    session.approver_handle,
                    session.requester_info,
                    device_info,
                    session.created_at.timestamp_millis(),
                    session.expires_at.timestamp_millis(),
                    session.last_used_at.timestamp_millis(),
                    session.is_active as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, token: &str) -> Result<Option<PersistedBrowserSession>> {
        let token = token.to_string();
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM browser_sessions WHERE session_token = ?1"),
                    params![token],
                    row_to_session,
                )
                .optional()?)
        })
        .await
    }

    async fn touch(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        let token = token.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE browser_sessions SET last_used_at = ?2 WHERE session_token = ?1",
                params![token, at.timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        let token = token.to_string();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE browser_sessions SET is_active = 0 WHERE session_token = ?1 AND is_active = 1",
                params![token],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_for_identity(&self, public_key: &str) -> Result<Vec<PersistedBrowserSession>> {
        let public_key = public_key.to_lowercase();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM browser_sessions \
                 WHERE approver_public_key = ?1 AND is_active = 1 \
                 ORDER BY created_at DESC"
            ))?;
            let sessions = stmt
                .query_map(params![public_key], row_to_session)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
        .await
    }

    async fn revoke_all_for_identity(&self, public_key: &str) -> Result<usize> {
        let public_key = public_key.to_lowercase();
        self.blocking(move |conn| {
            Ok(conn.execute(
                "UPDATE browser_sessions SET is_active = 0 \
                 WHERE approver_public_key = ?1 AND is_active = 1",
                params![public_key],
            )?)
        })
        .await
    }
}

#[async_trait]
impl IdentityDirectory for SqliteStore {
    async fn resolve(&self, public_key: &str) -> Result<Option<IdentityRecord>> {
        let public_key = public_key.to_lowercase();
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT public_key, handle, encryption_key FROM identities WHERE public_key = ?1",
                    params![public_key],
                    |row| {
                        Ok(IdentityRecord {
                            public_key: row.get(0)?,
                            handle: row.get(1)?,
                            encryption_key: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }
}
