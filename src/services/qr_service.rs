//! QR code rendering for download links.

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, Rgb};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

/// Pixels per QR module.
pub const MODULE_PIXELS: u32 = 10;

const DARK: Rgb<u8> = Rgb([0x1a, 0x1a, 0x2e]);
const LIGHT: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum QrError {
    #[error("encoding payload: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("writing png: {0}")]
    Png(#[from] image::ImageError),
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Render `payload` as a PNG QR code.
///
/// Uses error-correction level H and the smallest version that fits, with the
/// standard four-module quiet zone.
pub fn render_png(payload: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;
    let img = code
        .render::<Rgb<u8>>()
        .dark_color(DARK)
        .light_color(LIGHT)
        .quiet_zone(true)
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .build();

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Wrap PNG bytes as an inline `data:` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, general_purpose::STANDARD.encode(png))
}

/// Render `payload` straight to a `data:image/png;base64,...` URI.
pub fn render_data_uri(payload: &str) -> Result<String, QrError> {
    render_png(payload).map(|png| png_data_uri(&png))
}

/// Inverse of `png_data_uri`, used by tests to get the image back.
#[cfg(test)]
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let encoded = uri.strip_prefix(DATA_URI_PREFIX)?;
    general_purpose::STANDARD.decode(encoded).ok()
}

/// Scan a PNG and return the payload of the first QR code found.
#[cfg(test)]
pub fn scan_png(png: &[u8]) -> Option<String> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .ok()?
        .to_luma8();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(img.width() as usize, img.height() as usize, |x, y| {
            img.get_pixel(x as u32, y as u32).0[0]
        });
    let grids = prepared.detect_grids();
    let (_, content) = grids.first()?.decode().ok()?;
    Some(content)
}
