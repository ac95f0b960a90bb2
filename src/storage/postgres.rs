use crate::models::{ClickEvent, LinkRecord};
use crate::storage::{ClickLog, QrArtifactStore, ShortLinkStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                short_code TEXT PRIMARY KEY,
                target_url TEXT NOT NULL,
                ip TEXT,
                sponsor TEXT,
                safe BOOLEAN NOT NULL DEFAULT TRUE,
                owner TEXT,
                country TEXT,
                qr_requested BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_codes (
                short_code TEXT PRIMARY KEY,
                image BYTEA NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL,
                clicked_at BIGINT NOT NULL,
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
impl ShortLinkStore for PostgresStorage {
    async fn find(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        let record = sqlx::query_as::<_, LinkRecord>(
            r#"
            SELECT short_code, target_url, ip, sponsor, safe, owner, country,
                   qr_requested, is_active, created_at
            FROM links
            WHERE short_code = $1
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (short_code) DO NOTHING
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
        let result = sqlx::query("UPDATE links SET qr_requested = TRUE WHERE short_code = $1")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, short_code: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET is_active = $1 WHERE short_code = $2")
            .bind(active)
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QrArtifactStore for PostgresStorage {
    async fn put(&self, short_code: &str, image: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_codes (short_code, image)
            VALUES ($1, $2)
            ON CONFLICT (short_code) DO UPDATE SET image = EXCLUDED.image
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
            "SELECT image FROM qr_codes WHERE short_code = $1",
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(image)
    }
}

#[async_trait]
impl ClickLog for PostgresStorage {
    async fn append(&self, events: &[ClickEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let short_codes: Vec<&str> = events.iter().map(|e| e.short_code.as_str()).collect();
        let clicked_at: Vec<i64> = events.iter().map(|e| e.clicked_at).collect();
        let ips: Vec<Option<&str>> = events.iter().map(|e| e.ip.as_deref()).collect();

        sqlx::query(
            r#"
            INSERT INTO clicks (short_code, clicked_at, ip)
            SELECT * FROM UNNEST($1::TEXT[], $2::BIGINT[], $3::TEXT[])
            "#,
        )
        .bind(&short_codes)
        .bind(&clicked_at)
        .bind(&ips)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn count(&self, short_code: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clicks WHERE short_code = $1")
                .bind(short_code)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count)
    }
}
