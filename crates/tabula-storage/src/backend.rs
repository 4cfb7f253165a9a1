//! Transient store trait

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::StorageError;

/// Maximum key length accepted by the stores
pub const MAX_KEY_LENGTH: usize = 172;

/// Expiring key/value store
///
/// Implementations hold opaque values under string keys until they expire or
/// are deleted. An expired entry must never be returned by `get`.
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Read a value if present and not expired
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Store a value, replacing any previous one, expiring after `ttl`
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StorageError>;

    /// Delete a value, returns whether anything was removed
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove every expired entry, returns how many were removed
    async fn purge_expired(&self) -> Result<u64, StorageError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Validate a key before it reaches a backend
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey(format!(
            "key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
