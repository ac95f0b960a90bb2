pub mod codegen;
pub mod error;
pub mod qr;
pub mod resolution;
pub mod shortener;

pub use codegen::{
    generator_from_config, HashCodeGenerator, RandomCodeGenerator, ShortCodeGenerator,
};
pub use error::{ServiceError, ServiceResult};
pub use qr::QrIssuanceService;
pub use resolution::{
    LinkResolutionService, RedirectPolicy, Resolution, SafetyRedirectPolicy,
};
pub use shortener::ShortenerService;

use std::sync::Arc;
use std::time::Duration;

use crate::clicks::BufferedClickRecorder;
use crate::config::Config;
use crate::qr::PngQrEncoder;
use crate::storage::Stores;

/// Every service the HTTP layer and the admin CLI need, wired from one config
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<LinkResolutionService>,
    pub qr: Arc<QrIssuanceService>,
    pub shortener: Arc<ShortenerService>,
    pub clicks: Arc<BufferedClickRecorder>,
}

impl Services {
    pub fn new(config: &Config, stores: &Stores) -> Self {
        let qr = Arc::new(QrIssuanceService::new(
            Arc::clone(&stores.links),
            Arc::clone(&stores.qr_codes),
            Arc::new(PngQrEncoder::from_config(&config.qr)),
            Duration::from_millis(config.qr.wait_timeout_ms),
        ));

        let resolver = Arc::new(LinkResolutionService::new(
            Arc::clone(&stores.links),
            Arc::new(SafetyRedirectPolicy::from_config(&config.redirect)),
        ));

        let shortener = Arc::new(ShortenerService::new(
            Arc::clone(&stores.links),
            generator_from_config(&config.short_code),
            Arc::clone(&qr),
        ));

        let clicks = Arc::new(BufferedClickRecorder::from_config(
            Arc::clone(&stores.clicks),
            &config.clicks,
        ));

        Self {
            resolver,
            qr,
            shortener,
            clicks,
        }
    }
}
