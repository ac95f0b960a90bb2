use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::clicks::ClickRecorder;
use crate::services::{LinkResolutionService, QrIssuanceService};

use super::handlers::{health_check, qr_code, redirect_link, RedirectState};

pub fn create_redirect_router(
    resolver: Arc<LinkResolutionService>,
    qr: Arc<QrIssuanceService>,
    clicks: Arc<dyn ClickRecorder>,
) -> Router {
    let state = Arc::new(RedirectState {
        resolver,
        qr,
        clicks,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_link))
        .route("/{code}/qr", get(qr_code))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
