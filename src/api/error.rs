use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::ServiceError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Json<Self> {
        Json(Self {
            error: error.into(),
        })
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TargetMismatch(_) | Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::CodeExhausted => StatusCode::CONFLICT,
            Self::EncodingFailure(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Storage(err) => {
                tracing::error!(error = ?err, "Storage failure");
                (status, ErrorResponse::new("Internal server error")).into_response()
            }
            Self::NotReady(_) => (
                status,
                [(header::RETRY_AFTER, "1")],
                ErrorResponse::new(self.to_string()),
            )
                .into_response(),
            _ => (status, ErrorResponse::new(self.to_string())).into_response(),
        }
    }
}
