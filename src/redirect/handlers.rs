use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::clicks::ClickRecorder;
use crate::models::ClickProperties;
use crate::services::{LinkResolutionService, QrIssuanceService};

pub struct RedirectState {
    pub resolver: Arc<LinkResolutionService>,
    pub qr: Arc<QrIssuanceService>,
    pub clicks: Arc<dyn ClickRecorder>,
}

/// Redirect to the target URL
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let resolution = match state.resolver.resolve(&code).await {
        Ok(resolution) => resolution,
        Err(err) => return err.into_response(),
    };

    let status = match StatusCode::from_u16(resolution.mode.status_code()) {
        Ok(status) => status,
        Err(_) => StatusCode::TEMPORARY_REDIRECT,
    };

    let location = match HeaderValue::from_str(&resolution.target_url) {
        Ok(location) => location,
        Err(_) => {
            tracing::error!(short_code = %code, "stored target URL is not a valid header value");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    // Only clicks that end in a redirect are recorded
    state.clicks.record(
        &code,
        ClickProperties {
            ip: Some(addr.ip().to_string()),
        },
    );

    (status, [(header::LOCATION, location)]).into_response()
}

/// Serve the QR code of a short link as PNG
pub async fn qr_code(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
) -> Response {
    match state.qr.get(&code).await {
        Ok(image) => ([(header::CONTENT_TYPE, "image/png")], image).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
