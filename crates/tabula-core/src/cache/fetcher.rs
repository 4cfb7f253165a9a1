//! Cache-aside record-set fetcher

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tabula_source::RecordSource;
use tabula_storage::TransientStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::CachedRecordSet;
use crate::sanitize::sanitize_record_set;

/// Configuration for the fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Store key holding the cached record set
    pub cache_key: String,
    /// Lifetime of a cached record set
    pub ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_key: "tabula_record_set".to_string(),
            ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Serves the latest known-good record set, hiding remote latency and
/// failures behind an expiring cache entry
pub struct CachedFetcher {
    store: Arc<dyn TransientStore>,
    source: Arc<dyn RecordSource>,
    config: FetcherConfig,
    refresh_lock: Mutex<()>,
}

impl CachedFetcher {
    /// Create a new fetcher
    pub fn new(
        store: Arc<dyn TransientStore>,
        source: Arc<dyn RecordSource>,
        config: FetcherConfig,
    ) -> Self {
        info!(
            "Initializing record fetcher (source: {}, store: {}, key: {}, ttl: {}s)",
            source.endpoint(),
            store.name(),
            config.cache_key,
            config.ttl.as_secs()
        );

        Self {
            store,
            source,
            config,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Remote endpoint this fetcher reads from
    pub fn endpoint(&self) -> &str {
        self.source.endpoint()
    }

    /// Get the record set, from cache when fresh, otherwise from the source
    ///
    /// Never fails: when the source cannot be reached or returns something
    /// that is not JSON, the empty record set is returned and nothing is
    /// cached, so the next call retries.
    pub async fn get(&self) -> CachedRecordSet {
        if let Some(cached) = self.cached().await {
            metrics::counter!("tabula_cache_hits_total").increment(1);
            return cached;
        }

        // Collapse concurrent misses into a single remote call
        let _guard = self.refresh_lock.lock().await;
        if let Some(cached) = self.cached().await {
            metrics::counter!("tabula_cache_hits_total").increment(1);
            return cached;
        }

        metrics::counter!("tabula_cache_misses_total").increment(1);

        let document = match self.source.fetch().await {
            Ok(document) => document,
            Err(e) => {
                metrics::counter!("tabula_fetch_failures_total").increment(1);
                warn!("No data available from {}: {}", self.source.endpoint(), e);
                return CachedRecordSet::empty();
            }
        };

        let record_set = sanitize_record_set(&document);
        debug!(
            "Fetched record set \"{}\" with {} rows",
            record_set.title,
            record_set.rows.len()
        );

        if let Err(e) = self.store_record_set(&record_set).await {
            warn!("Failed to cache record set: {}", e);
        }

        record_set
    }

    /// Drop the cached record set; the next `get` refetches
    pub async fn invalidate(&self) -> Result<(), CoreError> {
        let deleted = self.store.delete(&self.config.cache_key).await?;
        info!(
            "Invalidated cached record set ({})",
            if deleted { "entry removed" } else { "nothing cached" }
        );
        Ok(())
    }

    /// Read a fresh cached record set, treating any store problem as a miss
    async fn cached(&self) -> Option<CachedRecordSet> {
        let bytes = match self.store.get(&self.config.cache_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cached record set: {}", e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record_set) => {
                debug!("Cache hit: {}", self.config.cache_key);
                Some(record_set)
            }
            Err(e) => {
                warn!("Discarding undecodable cached record set: {}", e);
                None
            }
        }
    }

    async fn store_record_set(&self, record_set: &CachedRecordSet) -> Result<(), CoreError> {
        let bytes = Bytes::from(serde_json::to_vec(record_set)?);
        self.store
            .set(&self.config.cache_key, bytes, self.config.ttl)
            .await?;
        Ok(())
    }
}

/// Spawn a background task that periodically purges expired transients
pub fn spawn_purge_task(
    store: Arc<dyn TransientStore>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::{Duration, interval};

    info!(
        "Starting background transient purge task (interval: {} seconds)",
        interval_secs
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.purge_expired().await {
                Ok(purged) if purged > 0 => {
                    info!("Purged {} expired transients", purged);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Error during transient purge: {}", e);
                }
            }
        }
    })
}
