use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata captured when a short link is followed
#[derive(Debug, Clone, Default)]
pub struct ClickProperties {
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClickEvent {
    pub short_code: String,
    /// Unix timestamp (seconds)
    pub clicked_at: i64,
    pub ip: Option<String>,
}

impl ClickEvent {
    pub fn now(short_code: &str, properties: ClickProperties) -> Self {
        Self {
            short_code: short_code.to_string(),
            clicked_at: chrono::Utc::now().timestamp(),
            ip: properties.ip,
        }
    }
}
