//! QR code rendering for session pairing.
//!
//! Turns the pairing payload handed out by a protocol client into a PNG
//! image that callers can display or forward.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Luma};
use qrcode::{render::unicode, QrCode};

/// Smallest edge, in pixels, of rendered PNG images.
const MIN_IMAGE_SIZE: u32 = 264;

/// Produce PNG bytes for a QR payload.
///
/// A payload that is already a `data:image/...;base64,` URL is decoded as is;
/// anything else is encoded as a fresh QR code.
pub fn qr_image(payload: &str) -> Result<Vec<u8>, QRError> {
    match strip_data_uri(payload) {
        Some(encoded) => STANDARD
            .decode(encoded)
            .map_err(|e| QRError::InvalidImage(e.to_string())),
        None => render_png(payload),
    }
}

/// Return the base64 body of an image data URL, or `None` if the payload
/// is not one.
pub fn strip_data_uri(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("data:image/")?;
    let (_, body) = rest.split_once(";base64,")?;
    Some(body)
}

/// Render a QR payload as a PNG image.
pub fn render_png(data: &str) -> Result<Vec<u8>, QRError> {
    let code =
        QrCode::new(data.as_bytes()).map_err(|e| QRError::GenerationFailed(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_IMAGE_SIZE, MIN_IMAGE_SIZE)
        .build();

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| QRError::GenerationFailed(e.to_string()))?;
    Ok(bytes)
}

/// Render QR code as ASCII for terminal display.
pub fn render_ascii(data: &str) -> Result<String, QRError> {
    let code =
        QrCode::new(data.as_bytes()).map_err(|e| QRError::GenerationFailed(e.to_string()))?;

    let image = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(image)
}

/// QR code errors.
#[derive(Debug, Clone)]
pub enum QRError {
    GenerationFailed(String),
    InvalidImage(String),
}

impl std::fmt::Display for QRError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QRError::GenerationFailed(e) => write!(f, "QR generation failed: {}", e),
            QRError::InvalidImage(e) => write!(f, "invalid QR image: {}", e),
        }
    }
}

impl std::error::Error for QRError {}
