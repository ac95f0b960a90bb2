use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    /// Public base URL of the redirect server, used to build short and QR links
    pub redirect_base_url: String,
    pub cache: CacheConfig,
    pub clicks: ClickConfig,
    pub qr: QrConfig,
    pub redirect: RedirectConfig,
    pub short_code: ShortCodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickConfig {
    /// Capacity of the recorder channel; clicks beyond it are dropped
    pub buffer_size: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    /// Minimum width and height of the rendered PNG, in pixels
    pub min_size: u32,
    pub ec_level: QrEcLevel,
    /// How long a QR fetch waits for an in-flight generation
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrEcLevel {
    L,
    M,
    Q,
    H,
}

impl FromStr for QrEcLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L" | "LOW" => Ok(Self::L),
            "M" | "MEDIUM" => Ok(Self::M),
            "Q" | "QUARTILE" => Ok(Self::Q),
            "H" | "HIGH" => Ok(Self::H),
            other => anyhow::bail!("unknown QR error correction level '{other}'"),
        }
    }
}

/// HTTP status used for a redirect response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedirectMode {
    /// 301
    MovedPermanently,
    /// 302
    Found,
    /// 307
    #[default]
    Temporary,
    /// 308
    Permanent,
}

impl RedirectMode {
    pub fn status_code(self) -> u16 {
        match self {
            Self::MovedPermanently => 301,
            Self::Found => 302,
            Self::Temporary => 307,
            Self::Permanent => 308,
        }
    }
}

impl FromStr for RedirectMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "301" | "moved" | "moved_permanently" => Ok(Self::MovedPermanently),
            "302" | "found" => Ok(Self::Found),
            "307" | "temporary" => Ok(Self::Temporary),
            "308" | "permanent" => Ok(Self::Permanent),
            other => anyhow::bail!(
                "unsupported redirect status '{other}'. Supported values: 301, 302, 307, 308"
            ),
        }
    }
}

/// Redirect status per link safety
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub safe: RedirectMode,
    pub unsafe_: RedirectMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortCodeStrategy {
    /// Deterministic, derived from the target URL
    Hash,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortCodeConfig {
    pub strategy: ShortCodeStrategy,
    pub length: usize,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_or(key, default);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid value '{raw}' for {key}"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, memory"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./shortqr.db?mode=rwc");
        let max_connections = parse_env("DATABASE_MAX_CONNECTIONS", "10")?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = parse_env("API_PORT", "8080")?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port: u16 = parse_env("REDIRECT_PORT", "3000")?;

        let redirect_base_url = std::env::var("REDIRECT_BASE_URL")
            .unwrap_or_else(|_| format!("http://{redirect_host}:{redirect_port}"))
            .trim_end_matches('/')
            .to_string();

        let short_code_strategy = match env_or("SHORT_CODE_STRATEGY", "hash")
            .to_lowercase()
            .as_str()
        {
            "hash" => ShortCodeStrategy::Hash,
            "random" => ShortCodeStrategy::Random,
            other => anyhow::bail!(
                "unknown SHORT_CODE_STRATEGY '{other}'. Supported values: hash, random"
            ),
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            redirect_base_url,
            cache: CacheConfig {
                max_entries: parse_env("CACHE_MAX_ENTRIES", "10000")?,
                ttl_secs: parse_env("CACHE_TTL_SECS", "300")?,
            },
            clicks: ClickConfig {
                buffer_size: parse_env("CLICK_BUFFER_SIZE", "100000")?,
                batch_size: parse_env("CLICK_BATCH_SIZE", "500")?,
                flush_interval_ms: parse_env("CLICK_FLUSH_INTERVAL_MS", "1000")?,
            },
            qr: QrConfig {
                min_size: parse_env("QR_MIN_SIZE", "256")?,
                ec_level: parse_env("QR_EC_LEVEL", "M")?,
                wait_timeout_ms: parse_env("QR_WAIT_TIMEOUT_MS", "2000")?,
            },
            redirect: RedirectConfig {
                safe: parse_env("REDIRECT_STATUS_SAFE", "307")?,
                unsafe_: parse_env("REDIRECT_STATUS_UNSAFE", "307")?,
            },
            short_code: ShortCodeConfig {
                strategy: short_code_strategy,
                length: parse_env("SHORT_CODE_LENGTH", "8")?,
            },
        })
    }
}
