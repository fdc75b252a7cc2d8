//! Image encoding: `DynamicImage` → PNG bytes, and → base64 `ImageData`.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! PNG is lossless, which keeps axis labels and legend text legible for the
//! captioner. The same PNG bytes are what figure crops are saved as.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as a base64 PNG ready for a vision model.
///
/// `detail: "high"` keeps small figures from being downsampled into a
/// single low-resolution tile.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let buf = png_bytes(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
