use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::{
    CreateLinkForm, CreateLinkResponse, LinkRecord, LinkResponseProperties, ShortLinkProperties,
};
use crate::services::{ServiceError, ShortenerService};

pub struct ApiState {
    pub shortener: Arc<ShortenerService>,
    /// Base URL short links and QR links are built from, without trailing slash
    pub redirect_base_url: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Create a new short link
pub async fn create_link(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<CreateLinkForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let properties = ShortLinkProperties {
        ip: Some(addr.ip().to_string()),
        sponsor: form.sponsor.filter(|s| !s.is_empty()),
        qr: form.qr,
    };

    let record = state.shortener.create(&form.url, properties).await?;

    let short_url = format!("{}/{}", state.redirect_base_url, record.short_code);
    let qr_url = record
        .qr_requested
        .then(|| format!("{short_url}/qr"));

    let body = CreateLinkResponse {
        url: short_url.clone(),
        properties: LinkResponseProperties {
            safe: record.safe,
            qr: qr_url,
        },
    };

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, short_url)],
        Json(body),
    ))
}

/// Get a short link by code
pub async fn get_link(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
) -> Result<Json<LinkRecord>, ServiceError> {
    state.shortener.find(&code).await.map(Json)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
