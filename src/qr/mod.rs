//! QR code rendering
//!
//! Encoding is CPU-bound and synchronous; callers on the async runtime should
//! move it to the blocking pool.

use crate::config::{QrConfig, QrEcLevel};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload cannot be encoded as a QR code: {0}")]
    Payload(#[from] qrcode::types::QrError),
    #[error("failed to write PNG: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns a payload string into image bytes
pub trait QrEncoder: Send + Sync + 'static {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, EncodeError>;
}

/// Renders black-on-white PNG images
#[derive(Debug, Clone)]
pub struct PngQrEncoder {
    min_size: u32,
    ec_level: EcLevel,
}

impl PngQrEncoder {
    pub fn new(min_size: u32, ec_level: QrEcLevel) -> Self {
        let ec_level = match ec_level {
            QrEcLevel::L => EcLevel::L,
            QrEcLevel::M => EcLevel::M,
            QrEcLevel::Q => EcLevel::Q,
            QrEcLevel::H => EcLevel::H,
        };
        Self { min_size, ec_level }
    }

    pub fn from_config(config: &QrConfig) -> Self {
        Self::new(config.min_size, config.ec_level)
    }
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self::new(256, QrEcLevel::M)
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, EncodeError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), self.ec_level)?;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}
