//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::http::Request;
use shortqr::clicks::{BufferedClickRecorder, ClickRecorder};
use shortqr::config::RedirectMode;
use shortqr::qr::{EncodeError, PngQrEncoder, QrEncoder};
use shortqr::services::{
    HashCodeGenerator, LinkResolutionService, QrIssuanceService, SafetyRedirectPolicy,
    ShortenerService,
};
use shortqr::storage::{SqliteStorage, Stores};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;

pub const BASE_URL: &str = "http://sho.rt";

/// Encoder double that counts calls and can stall
pub struct CountingEncoder {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    inner: PngQrEncoder,
}

impl CountingEncoder {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
            inner: PngQrEncoder::default(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most encodes ever running at the same time
    pub fn peak_concurrency(&self) -> usize {
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

pub struct TestApp {
    pub stores: Stores,
    pub encoder: Arc<CountingEncoder>,
    pub resolver: Arc<LinkResolutionService>,
    pub qr: Arc<QrIssuanceService>,
    pub shortener: Arc<ShortenerService>,
    pub clicks: Arc<BufferedClickRecorder>,
}

impl TestApp {
    pub fn api_router(&self) -> axum::Router {
        shortqr::api::create_api_router(Arc::clone(&self.shortener), BASE_URL)
    }

    pub fn redirect_router(&self) -> axum::Router {
        let clicks: Arc<dyn ClickRecorder> = self.clicks.clone();
        shortqr::redirect::create_redirect_router(
            Arc::clone(&self.resolver),
            Arc::clone(&self.qr),
            clicks,
        )
    }
}

/// Helper to create SQLite-backed stores
///
/// A single connection keeps every query on the same in-memory database.
pub async fn sqlite_stores() -> Stores {
    let storage = Arc::new(SqliteStorage::new("sqlite::memory:", 1).await.unwrap());
    storage.init().await.unwrap();
    Stores {
        links: storage.clone(),
        qr_codes: storage.clone(),
        clicks: storage,
    }
}

pub fn build_app(stores: Stores, encode_delay: Duration, wait_timeout: Duration) -> TestApp {
    let encoder = CountingEncoder::new(encode_delay);
    let qr = Arc::new(QrIssuanceService::new(
        Arc::clone(&stores.links),
        Arc::clone(&stores.qr_codes),
        encoder.clone(),
        wait_timeout,
    ));
    let policy = SafetyRedirectPolicy {
        safe: RedirectMode::Temporary,
        flagged: RedirectMode::Found,
    };
    let resolver = Arc::new(LinkResolutionService::new(
        Arc::clone(&stores.links),
        Arc::new(policy),
    ));
    let shortener = Arc::new(ShortenerService::new(
        Arc::clone(&stores.links),
        Box::new(HashCodeGenerator::new(8)),
        Arc::clone(&qr),
    ));
    let clicks = Arc::new(BufferedClickRecorder::new(
        Arc::clone(&stores.clicks),
        1000,
        100,
        60_000,
    ));

    TestApp {
        stores,
        encoder,
        resolver,
        qr,
        shortener,
        clicks,
    }
}

pub async fn create_test_app() -> TestApp {
    build_app(
        sqlite_stores().await,
        Duration::ZERO,
        Duration::from_secs(5),
    )
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
pub struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

/// Decode the payload of a PNG QR code
pub fn decode_qr(png: &[u8]) -> String {
    let image = image::load_from_memory(png).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR code");
    grids[0].decode().unwrap().1
}
