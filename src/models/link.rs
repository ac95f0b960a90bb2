use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short link as persisted by a [`ShortLinkStore`](crate::storage::ShortLinkStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LinkRecord {
    pub short_code: String,
    pub target_url: String,
    /// Address of the client that created the link
    pub ip: Option<String>,
    pub sponsor: Option<String>,
    pub safe: bool,
    pub owner: Option<String>,
    pub country: Option<String>,
    /// Whether a QR code was asked for; only ever flips from false to true
    pub qr_requested: bool,
    pub is_active: bool,
    pub created_at: i64,
}

impl LinkRecord {
    pub fn new(short_code: &str, target_url: &str, properties: &ShortLinkProperties) -> Self {
        Self {
            short_code: short_code.to_string(),
            target_url: target_url.to_string(),
            ip: properties.ip.clone(),
            sponsor: properties.sponsor.clone(),
            safe: true,
            owner: None,
            country: None,
            qr_requested: properties.qr,
            is_active: true,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Caller-supplied data attached to a link at creation time.
#[derive(Debug, Clone, Default)]
pub struct ShortLinkProperties {
    pub ip: Option<String>,
    pub sponsor: Option<String>,
    pub qr: bool,
}

/// Form body of `POST /api/link`.
#[derive(Debug, Deserialize)]
pub struct CreateLinkForm {
    pub url: String,
    #[serde(default)]
    pub sponsor: Option<String>,
    #[serde(default)]
    pub qr: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub url: String,
    pub properties: LinkResponseProperties,
}

#[derive(Debug, Serialize)]
pub struct LinkResponseProperties {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}
