use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::ShortenerService;

use super::handlers::{create_link, get_link, health_check, ApiState};

pub fn create_api_router(shortener: Arc<ShortenerService>, redirect_base_url: &str) -> Router {
    let state = Arc::new(ApiState {
        shortener,
        redirect_base_url: redirect_base_url.trim_end_matches('/').to_string(),
    });

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/link", post(create_link))
        .route("/api/link/{code}", get(get_link))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
