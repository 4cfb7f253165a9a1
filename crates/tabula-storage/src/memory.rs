//! In-process memory store

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::backend::{TransientStore, validate_key};
use crate::error::StorageError;

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local transient store
///
/// Entries are expired lazily on read and in bulk by `purge_expired`.
/// Uses tokio's clock so expiry follows a paused test runtime.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        info!("Initialized in-memory transient store");
        Self::default()
    }

    /// Number of entries currently held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransientStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        validate_key(key)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Transient expired: {}", key);
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StorageError> {
        validate_key(key)?;
        debug!("Storing transient {} ({} bytes, ttl {:?})", key, value.len(), ttl);

        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set("key", Bytes::from_static(b"value"), Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("key").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"value")));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("key", Bytes::from_static(b"value"), Duration::from_secs(3600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(store.get("key").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("key").await.unwrap().is_none());
        // Lazy expiry removes the entry
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .set("key", Bytes::from_static(b"value"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("key").await.unwrap());
        assert!(!store.delete("key").await.unwrap());
        assert!(store.get("key").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .set("short", Bytes::from_static(b"a"), Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set("long", Bytes::from_static(b"b"), Duration::from_secs(100))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_empty_key() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
