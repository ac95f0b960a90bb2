use crate::models::{ClickEvent, LinkRecord};
use crate::storage::{ClickLog, QrArtifactStore, ShortLinkStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Process-local storage backed by DashMap.
///
/// Nothing survives a restart; intended for tests and throwaway deployments.
#[derive(Default)]
pub struct MemoryStorage {
    links: DashMap<String, LinkRecord>,
    qr_codes: DashMap<String, Arc<[u8]>>,
    clicks: DashMap<String, Vec<ClickEvent>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShortLinkStore for MemoryStorage {
    async fn find(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        Ok(self.links.get(short_code).map(|entry| entry.value().clone()))
    }

    async fn save(&self, record: &LinkRecord) -> StorageResult<LinkRecord> {
        match self.links.entry(record.short_code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(record.clone())
            }
        }
    }

    async fn mark_qr_requested(&self, short_code: &str) -> Result<bool> {
        Ok(self
            .links
            .get_mut(short_code)
            .map(|mut entry| entry.qr_requested = true)
            .is_some())
    }

    async fn set_active(&self, short_code: &str, active: bool) -> Result<bool> {
        Ok(self
            .links
            .get_mut(short_code)
            .map(|mut entry| entry.is_active = active)
            .is_some())
    }
}

#[async_trait]
impl QrArtifactStore for MemoryStorage {
    async fn put(&self, short_code: &str, image: &[u8]) -> Result<()> {
        // Whole-value swap, readers see either the old or the new image
        self.qr_codes.insert(short_code.to_string(), Arc::from(image));
        Ok(())
    }

    async fn get(&self, short_code: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .qr_codes
            .get(short_code)
            .map(|entry| entry.value().to_vec()))
    }
}

#[async_trait]
impl ClickLog for MemoryStorage {
    async fn append(&self, events: &[ClickEvent]) -> Result<()> {
        for event in events {
            self.clicks
                .entry(event.short_code.clone())
                .or_default()
                .push(event.clone());
        }
        Ok(())
    }

    async fn count(&self, short_code: &str) -> Result<i64> {
        Ok(self
            .clicks
            .get(short_code)
            .map(|entry| entry.len() as i64)
            .unwrap_or(0))
    }
}
