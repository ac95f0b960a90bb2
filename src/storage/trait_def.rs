use crate::models::{ClickEvent, LinkRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ShortLinkStore: Send + Sync {
    /// Get a link by short code, active or not
    async fn find(&self, short_code: &str) -> Result<Option<LinkRecord>>;

    /// Persist a new link. Fails with [`StorageError::Conflict`] if the short code is taken.
    async fn save(&self, record: &LinkRecord) -> StorageResult<LinkRecord>;

    /// Set `qr_requested` on an existing link. Returns false if the link does not exist.
    async fn mark_qr_requested(&self, short_code: &str) -> Result<bool>;

    /// Soft delete (`false`) or restore (`true`) a link
    async fn set_active(&self, short_code: &str, active: bool) -> Result<bool>;
}

#[async_trait]
pub trait QrArtifactStore: Send + Sync {
    /// Store the image for a short code, replacing any previous one atomically
    async fn put(&self, short_code: &str, image: &[u8]) -> Result<()>;

    async fn get(&self, short_code: &str) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait ClickLog: Send + Sync {
    async fn append(&self, events: &[ClickEvent]) -> Result<()>;

    async fn count(&self, short_code: &str) -> Result<i64>;
}
