use std::sync::Arc;

use crate::config::{RedirectConfig, RedirectMode};
use crate::models::LinkRecord;
use crate::services::{ServiceError, ServiceResult};
use crate::storage::ShortLinkStore;

/// Chooses the redirect status for a resolved link
pub trait RedirectPolicy: Send + Sync {
    fn mode(&self, record: &LinkRecord) -> RedirectMode;
}

/// Picks the status from the link's `safe` flag
#[derive(Debug, Clone)]
pub struct SafetyRedirectPolicy {
    pub safe: RedirectMode,
    pub flagged: RedirectMode,
}

impl SafetyRedirectPolicy {
    pub fn from_config(config: &RedirectConfig) -> Self {
        Self {
            safe: config.safe,
            flagged: config.unsafe_,
        }
    }
}

impl Default for SafetyRedirectPolicy {
    fn default() -> Self {
        Self {
            safe: RedirectMode::Temporary,
            flagged: RedirectMode::Temporary,
        }
    }
}

impl RedirectPolicy for SafetyRedirectPolicy {
    fn mode(&self, record: &LinkRecord) -> RedirectMode {
        if record.safe {
            self.safe
        } else {
            self.flagged
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target_url: String,
    pub mode: RedirectMode,
}

/// Maps short codes to redirect targets. Read-only: recording the click is
/// up to the caller, once it actually sends the redirect.
pub struct LinkResolutionService {
    links: Arc<dyn ShortLinkStore>,
    policy: Arc<dyn RedirectPolicy>,
}

impl LinkResolutionService {
    pub fn new(links: Arc<dyn ShortLinkStore>, policy: Arc<dyn RedirectPolicy>) -> Self {
        Self { links, policy }
    }

    pub async fn resolve(&self, short_code: &str) -> ServiceResult<Resolution> {
        let record = self
            .links
            .find(short_code)
            .await?
            .filter(|record| record.is_active)
            .ok_or_else(|| ServiceError::NotFound(short_code.to_string()))?;

        Ok(Resolution {
            mode: self.policy.mode(&record),
            target_url: record.target_url,
        })
    }
}
