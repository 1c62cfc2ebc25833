//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::outbox::{PendingOp, PendingWrite};
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_pending_write(row: &libsql::Row) -> Result<PendingWrite, DatabaseError> {
    let key: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("pending_writes.key: {e}")))?;
    let op_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("pending_writes.op: {e}")))?;
    let attempts: i64 = row.get(2).unwrap_or(0);
    let last_error: Option<String> = row.get(3).ok();
    let queued_at: String = row.get(4).unwrap_or_default();

    let op: PendingOp = serde_json::from_str(&op_str)
        .map_err(|e| DatabaseError::Serialization(format!("pending write {key}: {e}")))?;

    Ok(PendingWrite {
        key,
        op,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        last_error,
        queued_at: parse_datetime(&queued_at),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row.get(0).unwrap_or_else(|_| "null".to_string());
                let value: serde_json::Value =
                    serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key, value_str, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    // ── Outbox ──────────────────────────────────────────────────────

    async fn upsert_pending_write(
        &self,
        user_id: &str,
        write: &PendingWrite,
    ) -> Result<(), DatabaseError> {
        let op_str = serde_json::to_string(&write.op)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        // A replacement starts a fresh retry history.
        self.conn()
            .execute(
                "INSERT INTO pending_writes (user_id, key, op, attempts, last_error, queued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id, key) DO UPDATE SET
                    op = ?3, attempts = ?4, last_error = ?5, queued_at = ?6",
                params![
                    user_id,
                    write.key.as_str(),
                    op_str,
                    i64::from(write.attempts),
                    write.last_error.clone(),
                    write.queued_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_pending_write: {e}")))?;

        debug!(user_id, key = %write.key, "Queued pending write");
        Ok(())
    }

    async fn list_pending_writes(&self, user_id: &str) -> Result<Vec<PendingWrite>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, op, attempts, last_error, queued_at FROM pending_writes
                 WHERE user_id = ?1 ORDER BY queued_at ASC, key ASC",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_pending_writes: {e}")))?;

        let mut writes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_pending_writes: {e}")))?
        {
            writes.push(row_to_pending_write(&row)?);
        }
        Ok(writes)
    }

    async fn remove_pending_write(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM pending_writes WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("remove_pending_write: {e}")))?;
        Ok(count > 0)
    }

    async fn record_write_attempt(
        &self,
        user_id: &str,
        key: &str,
        error: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE pending_writes SET attempts = attempts + 1, last_error = ?3
                 WHERE user_id = ?1 AND key = ?2",
                params![user_id, key, error],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_write_attempt: {e}")))?;
        Ok(())
    }
}
