pub mod cached;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedLinkStore;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{ClickLog, QrArtifactStore, ShortLinkStore, StorageError, StorageResult};

use crate::config::{CacheConfig, DatabaseBackend, DatabaseConfig};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// The three store capabilities, all served by one backend
#[derive(Clone)]
pub struct Stores {
    pub links: Arc<dyn ShortLinkStore>,
    pub qr_codes: Arc<dyn QrArtifactStore>,
    pub clicks: Arc<dyn ClickLog>,
}

impl Stores {
    fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ShortLinkStore + QrArtifactStore + ClickLog + 'static,
    {
        Self {
            links: backend.clone(),
            qr_codes: backend.clone(),
            clicks: backend,
        }
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStorage::new()))
    }

    /// Connect to the configured backend and make sure its schema exists
    pub async fn open(database: &DatabaseConfig) -> Result<Self> {
        let stores = match database.backend {
            DatabaseBackend::Sqlite => {
                info!("Using SQLite storage: {}", database.url);
                let storage = SqliteStorage::new(&database.url, database.max_connections).await?;
                storage.init().await?;
                Self::from_backend(Arc::new(storage))
            }
            DatabaseBackend::Postgres => {
                info!("Using PostgreSQL storage: {}", database.url);
                let storage =
                    PostgresStorage::new(&database.url, database.max_connections).await?;
                storage.init().await?;
                Self::from_backend(Arc::new(storage))
            }
            DatabaseBackend::Memory => {
                info!("Using in-memory storage, nothing will be persisted");
                Self::memory()
            }
        };

        Ok(stores)
    }

    /// Put the moka read cache in front of link lookups
    pub fn with_link_cache(mut self, cache: &CacheConfig) -> Self {
        self.links = Arc::new(CachedLinkStore::new(
            self.links,
            cache.max_entries,
            cache.ttl_secs,
        ));
        self
    }
}
