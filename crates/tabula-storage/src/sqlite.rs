//! SQLite-backed transient store
//!
//! Keeps transients in a single `transients` table so that several processes
//! (the server and one-shot CLI commands) observe the same cache entry.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{TransientStore, validate_key};
use crate::error::StorageError;

/// SQLite transient store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a database URL (e.g. `sqlite:./data/tabula.db?mode=rwc`)
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        info!("Connecting to transient database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open (creating if needed) a database file
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        Self::new(&format!("sqlite:{}?mode=rwc", path)).await
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        info!("Running transient store migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transients (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transients_expires_at ON transients(expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete `key` only if it is still expired at `now`, leaving a concurrent rewrite intact
    async fn remove_if_expired(&self, key: &str, now: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM transients WHERE key = ? AND expires_at <= ?")
            .bind(key)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Current time in Unix milliseconds
fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl TransientStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        validate_key(key)?;

        let row = sqlx::query("SELECT value, expires_at FROM transients WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let now = now_millis();
        let expires_at: i64 = row.get("expires_at");
        if expires_at <= now {
            debug!("Transient expired: {}", key);
            self.remove_if_expired(key, now).await?;
            return Ok(None);
        }

        let value: Vec<u8> = row.get("value");
        Ok(Some(Bytes::from(value)))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StorageError> {
        validate_key(key)?;

        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_millis);

        debug!("Storing transient {} ({} bytes, ttl {:?})", key, value.len(), ttl);

        sqlx::query(
            r#"
            INSERT INTO transients (key, value, expires_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_vec())
        .bind(expires_at)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;

        let result = sqlx::query("DELETE FROM transients WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM transients WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("transients.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (store, _temp_dir) = create_test_store().await;

        store
            .set("key", Bytes::from_static(b"{\"a\":1}"), Duration::from_secs(3600))
            .await
            .unwrap();

        let value = store.get("key").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"{\"a\":1}")));
    }

    #[tokio::test]
    async fn test_set_replaces_existing_value() {
        let (store, _temp_dir) = create_test_store().await;

        store
            .set("key", Bytes::from_static(b"first"), Duration::from_secs(3600))
            .await
            .unwrap();
        store
            .set("key", Bytes::from_static(b"second"), Duration::from_secs(3600))
            .await
            .unwrap();

        let value = store.get("key").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"second")));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_expired() {
        let (store, _temp_dir) = create_test_store().await;

        store
            .set("key", Bytes::from_static(b"value"), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.get("key").await.unwrap().is_none());
        // The expired row was removed on read
        assert!(!store.delete("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_cleanup_keeps_rewritten_entry() {
        let (store, _temp_dir) = create_test_store().await;

        store
            .set("key", Bytes::from_static(b"old"), Duration::ZERO)
            .await
            .unwrap();
        // A reader saw the stale row at this instant
        let seen_at = now_millis();

        // Another process rewrites the entry before the reader cleans up
        store
            .set("key", Bytes::from_static(b"new"), Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(!store.remove_if_expired("key", seen_at).await.unwrap());
        assert_eq!(
            store.get("key").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp_dir) = create_test_store().await;

        assert!(!store.delete("key").await.unwrap());

        store
            .set("key", Bytes::from_static(b"value"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.delete("key").await.unwrap());
        assert!(store.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, _temp_dir) = create_test_store().await;

        store
            .set("stale", Bytes::from_static(b"a"), Duration::ZERO)
            .await
            .unwrap();
        store
            .set("fresh", Bytes::from_static(b"b"), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entries_shared_between_connections() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("shared.db");
        let path = path.to_str().unwrap();

        let writer = SqliteStore::open(path).await.unwrap();
        let other = SqliteStore::open(path).await.unwrap();

        writer
            .set("key", Bytes::from_static(b"value"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(other.delete("key").await.unwrap());
        assert!(writer.get("key").await.unwrap().is_none());
    }
}
