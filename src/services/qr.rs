//! QR code issuance
//!
//! Generation is single-flight per short code: the first caller spawns a
//! generation task and registers a watch receiver in `in_flight`; everyone
//! else arriving while it runs subscribes to the same receiver. The task is
//! detached from the request that started it, so a dropped connection never
//! leaves the artifact half-made.
//!
//! The task re-checks the artifact store before encoding. It only leaves
//! `in_flight` after the image is stored, so a caller that misses both the
//! artifact and the entry will start a task that finds the stored image and
//! skips encoding.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::LinkRecord;
use crate::qr::QrEncoder;
use crate::services::{ServiceError, ServiceResult};
use crate::storage::{QrArtifactStore, ShortLinkStore};

type Outcome = ServiceResult<()>;
type OutcomeReceiver = watch::Receiver<Option<Outcome>>;
type InFlight = DashMap<String, OutcomeReceiver>;

pub struct QrIssuanceService {
    links: Arc<dyn ShortLinkStore>,
    qr_codes: Arc<dyn QrArtifactStore>,
    encoder: Arc<dyn QrEncoder>,
    in_flight: Arc<InFlight>,
    wait_timeout: Duration,
}

impl QrIssuanceService {
    pub fn new(
        links: Arc<dyn ShortLinkStore>,
        qr_codes: Arc<dyn QrArtifactStore>,
        encoder: Arc<dyn QrEncoder>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            links,
            qr_codes,
            encoder,
            in_flight: Arc::new(DashMap::new()),
            wait_timeout,
        }
    }

    /// Encode `url` and store it as the QR code of `short_code`.
    ///
    /// Idempotent: returns at once when the image already exists and joins
    /// the running generation when one is in flight.
    pub async fn generate(&self, url: &str, short_code: &str) -> ServiceResult<()> {
        let record = self.active_link(short_code).await?;
        if record.target_url != url {
            return Err(ServiceError::TargetMismatch(short_code.to_string()));
        }

        if self.qr_codes.get(short_code).await?.is_some() {
            return Ok(());
        }

        let mut outcome = self.start_generation(&record);
        wait_for_outcome(&mut outcome).await
    }

    /// Start generation for a freshly created link without waiting for it
    pub fn trigger(&self, record: &LinkRecord) {
        let _ = self.start_generation(record);
    }

    /// Fetch the PNG for `short_code`.
    ///
    /// Links without a requested QR code are reported as [`ServiceError::NotFound`],
    /// same as unknown ones. When the image is missing, generation is started
    /// (or joined) and awaited for at most the configured timeout before
    /// giving up with [`ServiceError::NotReady`].
    pub async fn get(&self, short_code: &str) -> ServiceResult<Vec<u8>> {
        let record = self.active_link(short_code).await?;
        if !record.qr_requested {
            return Err(ServiceError::NotFound(short_code.to_string()));
        }

        if let Some(image) = self.qr_codes.get(short_code).await? {
            return Ok(image);
        }

        let mut outcome = self.start_generation(&record);
        match tokio::time::timeout(self.wait_timeout, wait_for_outcome(&mut outcome)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(short_code, "QR generation still running after wait timeout");
                return Err(ServiceError::NotReady(short_code.to_string()));
            }
        }

        self.qr_codes
            .get(short_code)
            .await?
            .ok_or_else(|| ServiceError::NotReady(short_code.to_string()))
    }

    /// Number of generations currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    async fn active_link(&self, short_code: &str) -> ServiceResult<LinkRecord> {
        self.links
            .find(short_code)
            .await?
            .filter(|record| record.is_active)
            .ok_or_else(|| ServiceError::NotFound(short_code.to_string()))
    }

    /// Join the generation running for this link, or spawn one
    fn start_generation(&self, record: &LinkRecord) -> OutcomeReceiver {
        match self.in_flight.entry(record.short_code.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());

                let task = GenerationTask {
                    short_code: record.short_code.clone(),
                    url: record.target_url.clone(),
                    qr_codes: Arc::clone(&self.qr_codes),
                    encoder: Arc::clone(&self.encoder),
                };
                let guard = InFlightGuard {
                    short_code: record.short_code.clone(),
                    in_flight: Arc::clone(&self.in_flight),
                };
                tokio::spawn(async move {
                    let outcome = task.run().await;
                    // Publish before the guard drops the entry
                    tx.send_replace(Some(outcome));
                    drop(guard);
                });

                rx
            }
        }
    }
}

async fn wait_for_outcome(outcome: &mut OutcomeReceiver) -> Outcome {
    match outcome.wait_for(Option::is_some).await {
        Ok(published) => published.clone().unwrap_or(Ok(())),
        // Sender dropped without a value: the task panicked
        Err(_) => Err(ServiceError::EncodingFailure(
            "QR generation task aborted".to_string(),
        )),
    }
}

/// Removes the in-flight entry however the generation task ends
struct InFlightGuard {
    short_code: String,
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.short_code);
    }
}

struct GenerationTask {
    short_code: String,
    url: String,
    qr_codes: Arc<dyn QrArtifactStore>,
    encoder: Arc<dyn QrEncoder>,
}

impl GenerationTask {
    async fn run(self) -> Outcome {
        if self.qr_codes.get(&self.short_code).await?.is_some() {
            debug!(short_code = %self.short_code, "QR code already stored, skipping encode");
            return Ok(());
        }

        let encoder = Arc::clone(&self.encoder);
        let url = self.url.clone();
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(&url))
            .await
            .map_err(|e| ServiceError::EncodingFailure(e.to_string()))?;

        let image = match encoded {
            Ok(image) => image,
            Err(err) => {
                warn!(short_code = %self.short_code, error = %err, "QR encoding failed");
                return Err(ServiceError::EncodingFailure(err.to_string()));
            }
        };

        self.qr_codes.put(&self.short_code, &image).await?;
        info!(short_code = %self.short_code, bytes = image.len(), "QR code generated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShortLinkProperties;
    use crate::qr::{EncodeError, PngQrEncoder};
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts encodes and optionally stalls to widen race windows
    struct CountingEncoder {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
        inner: PngQrEncoder,
    }

    impl CountingEncoder {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
                inner: PngQrEncoder::default(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Most encodes ever running at the same time
        fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl QrEncoder for CountingEncoder {
        fn encode(&self, payload: &str) -> Result<Vec<u8>, EncodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.inner.encode(payload)
        }
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        encoder: Arc<CountingEncoder>,
        service: Arc<QrIssuanceService>,
    }

    async fn fixture(encode_delay: Duration, wait_timeout: Duration) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let encoder = CountingEncoder::new(encode_delay);
        let service = Arc::new(QrIssuanceService::new(
            storage.clone(),
            storage.clone(),
            encoder.clone(),
            wait_timeout,
        ));
        Fixture {
            storage,
            encoder,
            service,
        }
    }

    async fn create(storage: &MemoryStorage, code: &str, url: &str, qr: bool) {
        let props = ShortLinkProperties {
            qr,
            ..Default::default()
        };
        storage
            .save(&LinkRecord::new(code, url, &props))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_code_not_found() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;

        assert!(matches!(
            f.service.generate("http://example.com", "nope").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.get("nope").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(f.encoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_then_get() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        f.service
            .generate("http://example.com", "abc123")
            .await
            .unwrap();
        let image = f.service.get("abc123").await.unwrap();

        assert!(!image.is_empty());
        assert_eq!(Some(image), QrArtifactStore::get(f.storage.as_ref(), "abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        f.service
            .generate("http://example.com", "abc123")
            .await
            .unwrap();
        let first = f.service.get("abc123").await.unwrap();

        f.service
            .generate("http://example.com", "abc123")
            .await
            .unwrap();
        let second = f.service.get("abc123").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.encoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_rejects_foreign_url() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        assert!(matches!(
            f.service.generate("http://evil.example", "abc123").await,
            Err(ServiceError::TargetMismatch(_))
        ));
        assert_eq!(f.encoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_without_qr_request_not_found() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "plain", "http://example.com", false).await;

        // Even an explicit generate does not make the image disclosable
        f.service
            .generate("http://example.com", "plain")
            .await
            .unwrap();
        assert!(matches!(
            f.service.get("plain").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_on_deactivated_link_not_found() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;
        f.service
            .generate("http://example.com", "abc123")
            .await
            .unwrap();

        f.storage.set_active("abc123", false).await.unwrap();
        assert!(matches!(
            f.service.get("abc123").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_generate_encodes_once() {
        let f = fixture(Duration::from_millis(50), Duration::from_secs(5)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let service = Arc::clone(&f.service);
            handles.push(tokio::spawn(async move {
                service.generate("http://example.com", "abc123").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(f.encoder.calls(), 1);
        assert_eq!(f.service.in_flight(), 0);

        let images: Vec<Vec<u8>> = fetch_concurrently(&f.service, "abc123", 8).await;
        assert!(images.windows(2).all(|pair| pair[0] == pair[1]));
    }

    async fn fetch_concurrently(
        service: &Arc<QrIssuanceService>,
        code: &str,
        n: usize,
    ) -> Vec<Vec<u8>> {
        let mut handles = Vec::new();
        for _ in 0..n {
            let service = Arc::clone(service);
            let code = code.to_string();
            handles.push(tokio::spawn(async move { service.get(&code).await }));
        }
        let mut images = Vec::new();
        for handle in handles {
            images.push(handle.await.unwrap().unwrap());
        }
        images
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_encodes_once() {
        let f = fixture(Duration::from_millis(50), Duration::from_secs(5)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        let images = fetch_concurrently(&f.service, "abc123", 16).await;

        assert_eq!(images.len(), 16);
        assert!(images.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(f.encoder.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_codes_generate_independently() {
        let f = fixture(Duration::from_millis(300), Duration::from_secs(5)).await;
        create(&f.storage, "one", "http://one.example", true).await;
        create(&f.storage, "two", "http://two.example", true).await;

        let (a, b) = tokio::join!(
            f.service.generate("http://one.example", "one"),
            f.service.generate("http://two.example", "two"),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(f.encoder.calls(), 2);
        // Both encodes were running at once
        assert_eq!(f.encoder.peak_concurrency(), 2);
        assert_ne!(
            f.service.get("one").await.unwrap(),
            f.service.get("two").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_times_out_as_not_ready() {
        let f = fixture(Duration::from_millis(300), Duration::from_millis(20)).await;
        create(&f.storage, "slow", "http://example.com", true).await;

        assert!(matches!(
            f.service.get("slow").await,
            Err(ServiceError::NotReady(_))
        ));

        // The generation keeps running and a later fetch sees its result
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(f.service.get("slow").await.is_ok());
        assert_eq!(f.encoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_cancel_generation() {
        let f = fixture(Duration::from_millis(100), Duration::from_secs(5)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;

        let service = Arc::clone(&f.service);
        let caller = tokio::spawn(async move {
            service.generate("http://example.com", "abc123").await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        let image = f.service.get("abc123").await.unwrap();
        assert!(!image.is_empty());
        assert_eq!(f.encoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_trigger_populates_store() {
        let f = fixture(Duration::ZERO, Duration::from_secs(1)).await;
        create(&f.storage, "abc123", "http://example.com", true).await;
        let record = f.storage.find("abc123").await.unwrap().unwrap();

        f.service.trigger(&record);
        let image = f.service.get("abc123").await.unwrap();

        assert!(!image.is_empty());
        assert_eq!(f.encoder.calls(), 1);
    }

    struct FailingEncoder;

    impl QrEncoder for FailingEncoder {
        fn encode(&self, _payload: &str) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError::Payload(qrcode::types::QrError::DataTooLong))
        }
    }

    #[tokio::test]
    async fn test_encoding_failure_propagates_and_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        create(&storage, "abc123", "http://example.com", true).await;
        let service = QrIssuanceService::new(
            storage.clone(),
            storage.clone(),
            Arc::new(FailingEncoder),
            Duration::from_secs(1),
        );

        assert!(matches!(
            service.generate("http://example.com", "abc123").await,
            Err(ServiceError::EncodingFailure(_))
        ));
        assert!(matches!(
            service.get("abc123").await,
            Err(ServiceError::EncodingFailure(_))
        ));
        assert!(QrArtifactStore::get(storage.as_ref(), "abc123")
            .await
            .unwrap()
            .is_none());
    }
}
