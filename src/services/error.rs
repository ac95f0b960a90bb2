use crate::storage::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Failures of the link, QR and creation services.
///
/// Cloneable so a single QR generation outcome can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The short code is unknown, deactivated, or has no QR code to disclose
    #[error("short link '{0}' not found")]
    NotFound(String),
    #[error("QR code for '{0}' is not ready yet")]
    NotReady(String),
    #[error("QR encoding failed: {0}")]
    EncodingFailure(String),
    #[error("URL does not match the target of short link '{0}'")]
    TargetMismatch(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("could not allocate a free short code")]
    CodeExhausted,
    /// Opaque backend failure; callers should report it as an internal error
    #[error("storage failure: {0:#}")]
    Storage(Arc<anyhow::Error>),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(Arc::new(err))
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Storage(Arc::new(anyhow::anyhow!(err))),
            StorageError::Other(inner) => Self::Storage(Arc::new(inner)),
        }
    }
}
