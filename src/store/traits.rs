//! `Database` trait: single async interface for local persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::store::outbox::PendingWrite;

/// Backend-agnostic database trait covering settings and the write outbox.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    /// Get a setting value by key.
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Set a setting value (upsert).
    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    // ── Outbox ──────────────────────────────────────────────────────

    /// Queue a write, replacing any earlier write with the same key.
    async fn upsert_pending_write(
        &self,
        user_id: &str,
        write: &PendingWrite,
    ) -> Result<(), DatabaseError>;

    /// All queued writes for a user, oldest first.
    async fn list_pending_writes(&self, user_id: &str) -> Result<Vec<PendingWrite>, DatabaseError>;

    /// Drop a delivered write. Returns true if it existed.
    async fn remove_pending_write(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    /// Bump the attempt counter and remember the last failure.
    async fn record_write_attempt(
        &self,
        user_id: &str,
        key: &str,
        error: &str,
    ) -> Result<(), DatabaseError>;
}
