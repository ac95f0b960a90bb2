use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{LinkRecord, ShortLinkProperties};
use crate::services::{QrIssuanceService, ServiceError, ServiceResult, ShortCodeGenerator};
use crate::storage::{ShortLinkStore, StorageError};

const MAX_URL_LENGTH: usize = 2048;
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Creation flow: validate, allocate a code, persist, fire QR generation
pub struct ShortenerService {
    links: Arc<dyn ShortLinkStore>,
    generator: Box<dyn ShortCodeGenerator>,
    qr: Arc<QrIssuanceService>,
}

impl ShortenerService {
    pub fn new(
        links: Arc<dyn ShortLinkStore>,
        generator: Box<dyn ShortCodeGenerator>,
        qr: Arc<QrIssuanceService>,
    ) -> Self {
        Self {
            links,
            generator,
            qr,
        }
    }

    /// Create a short link for `url`.
    ///
    /// Shortening a URL that already has a live link under the generated code
    /// returns that link; asking for a QR code on it turns `qr_requested` on.
    /// A deactivated link stays deactivated and the URL gets a new code.
    pub async fn create(
        &self,
        url: &str,
        properties: ShortLinkProperties,
    ) -> ServiceResult<LinkRecord> {
        validate_url(url)?;

        for attempt in 0..MAX_CODE_ATTEMPTS {
            let short_code = self.generator.generate(url, attempt);
            let candidate = LinkRecord::new(&short_code, url, &properties);

            let record = match self.links.save(&candidate).await {
                Ok(record) => {
                    info!(short_code = %record.short_code, "Created short link");
                    record
                }
                Err(StorageError::Conflict) => {
                    match self.reuse_existing(&short_code, url, &properties).await? {
                        Some(record) => record,
                        None => {
                            debug!(
                                short_code = %short_code,
                                attempt,
                                "Short code taken by another URL or deactivated, retrying"
                            );
                            continue;
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            };

            if record.qr_requested {
                self.qr.trigger(&record);
            }
            return Ok(record);
        }

        Err(ServiceError::CodeExhausted)
    }

    /// The existing link if it is active and points at the same URL, `None` otherwise
    async fn reuse_existing(
        &self,
        short_code: &str,
        url: &str,
        properties: &ShortLinkProperties,
    ) -> ServiceResult<Option<LinkRecord>> {
        let Some(mut existing) = self.links.find(short_code).await? else {
            return Ok(None);
        };
        if existing.target_url != url || !existing.is_active {
            return Ok(None);
        }

        if properties.qr && !existing.qr_requested {
            self.links.mark_qr_requested(short_code).await?;
            existing.qr_requested = true;
        }
        Ok(Some(existing))
    }

    pub async fn find(&self, short_code: &str) -> ServiceResult<LinkRecord> {
        self.links
            .find(short_code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(short_code.to_string()))
    }

    pub async fn set_active(&self, short_code: &str, active: bool) -> ServiceResult<()> {
        if self.links.set_active(short_code, active).await? {
            info!(short_code, active, "Changed short link state");
            Ok(())
        } else {
            Err(ServiceError::NotFound(short_code.to_string()))
        }
    }
}

fn validate_url(raw: &str) -> ServiceResult<()> {
    if raw.is_empty() {
        return Err(ServiceError::InvalidUrl("URL cannot be empty".to_string()));
    }
    if raw.len() > MAX_URL_LENGTH {
        return Err(ServiceError::InvalidUrl(format!(
            "URL longer than {MAX_URL_LENGTH} characters"
        )));
    }

    let parsed = url::Url::parse(raw).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ServiceError::InvalidUrl(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}
