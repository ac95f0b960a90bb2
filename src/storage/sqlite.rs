use crate::models::{ClickEvent, LinkRecord};
use crate::storage::{ClickLog, QrArtifactStore, ShortLinkStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                short_code TEXT PRIMARY KEY,
                target_url TEXT NOT NULL,
                ip TEXT,
                sponsor TEXT,
                safe INTEGER NOT NULL DEFAULT 1,
                owner TEXT,
                country TEXT,
                qr_requested INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_codes (
                short_code TEXT PRIMARY KEY,
                image BLOB NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL,
                clicked_at INTEGER NOT NULL,
                ip TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_short_code ON clicks(short_code)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ShortLinkStore for SqliteStorage {
    async fn find(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        let record = sqlx::query_as::<_, LinkRecord>(
            r#"
            SELECT short_code, target_url, ip, sponsor, safe, owner, country,
                   qr_requested, is_active, created_at
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn save(&self, record: &LinkRecord) -> StorageResult<LinkRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO links (short_code, target_url, ip, sponsor, safe, owner, country,
                               qr_requested, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(&record.short_code)
        .bind(&record.target_url)
        .bind(&record.ip)
        .bind(&record.sponsor)
        .bind(record.safe)
        .bind(&record.owner)
        .bind(&record.country)
        .bind(record.qr_requested)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(record.clone())
    }

    async fn mark_qr_requested(&self, short_code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET qr_requested = 1 WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, short_code: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET is_active = ? WHERE short_code = ?")
            .bind(active)
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QrArtifactStore for SqliteStorage {
    async fn put(&self, short_code: &str, image: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_codes (short_code, image)
            VALUES (?, ?)
            ON CONFLICT(short_code) DO UPDATE SET image = excluded.image
            "#,
        )
        .bind(short_code)
        .bind(image)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get(&self, short_code: &str) -> Result<Option<Vec<u8>>> {
        let image = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT image FROM qr_codes WHERE short_code = ?",
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(image)
    }
}

#[async_trait]
impl ClickLog for SqliteStorage {
    async fn append(&self, events: &[ClickEvent]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query("INSERT INTO clicks (short_code, clicked_at, ip) VALUES (?, ?, ?)")
                .bind(&event.short_code)
                .bind(event.clicked_at)
                .bind(&event.ip)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn count(&self, short_code: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clicks WHERE short_code = ?",
        )
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }
}
