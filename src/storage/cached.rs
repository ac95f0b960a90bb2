use crate::models::LinkRecord;
use crate::storage::{ShortLinkStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of a link store.
///
/// Misses are cached too, so repeated lookups of unknown codes stay off the
/// database. Every write path refreshes or invalidates the affected entry.
///
/// A fill races with writes: a lookup may read the old row, then insert it
/// after the writer invalidated. Writers bump `epoch` before invalidating and
/// fills re-check it after inserting, dropping their entry if a write
/// happened while they were reading.
pub struct CachedLinkStore {
    /// Underlying storage implementation
    inner: Arc<dyn ShortLinkStore>,
    read_cache: Cache<String, Option<LinkRecord>>,
    epoch: AtomicU64,
}

impl CachedLinkStore {
    pub fn new(inner: Arc<dyn ShortLinkStore>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner,
            read_cache,
            epoch: AtomicU64::new(0),
        }
    }

    async fn invalidate_cache(&self, short_code: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.read_cache.invalidate(short_code).await;
    }

    /// Cache a value read at `read_epoch`, unless a write has happened since
    async fn fill(&self, short_code: &str, value: Option<LinkRecord>, read_epoch: u64) {
        self.read_cache.insert(short_code.to_string(), value).await;
        if self.epoch.load(Ordering::SeqCst) != read_epoch {
            self.read_cache.invalidate(short_code).await;
        }
    }
}

#[async_trait]
impl ShortLinkStore for CachedLinkStore {
    async fn find(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        if let Some(cached) = self.read_cache.get(short_code).await {
            return Ok(cached);
        }

        let read_epoch = self.epoch.load(Ordering::SeqCst);
        let result = self.inner.find(short_code).await?;
        self.fill(short_code, result.clone(), read_epoch).await;

        Ok(result)
    }

    async fn save(&self, record: &LinkRecord) -> StorageResult<LinkRecord> {
        let read_epoch = self.epoch.load(Ordering::SeqCst);
        let result = match self.inner.save(record).await {
            Ok(saved) => saved,
            Err(err) => {
                // A cached miss may be hiding the row that caused the conflict
                self.invalidate_cache(&record.short_code).await;
                return Err(err);
            }
        };

        self.fill(&record.short_code, Some(result.clone()), read_epoch)
            .await;

        Ok(result)
    }

    async fn mark_qr_requested(&self, short_code: &str) -> Result<bool> {
        let result = self.inner.mark_qr_requested(short_code).await?;
        if result {
            self.invalidate_cache(short_code).await;
        }
        Ok(result)
    }

    async fn set_active(&self, short_code: &str, active: bool) -> Result<bool> {
        let result = self.inner.set_active(short_code, active).await?;
        if result {
            self.invalidate_cache(short_code).await;
        }
        Ok(result)
    }
}
