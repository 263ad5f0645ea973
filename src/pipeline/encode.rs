//! Image encoding: `MediaImage` → base64 `ImageData` for the request body.
//!
//! Photos are sent as JPEG: they are already lossy and JPEG keeps the request
//! small. PDF pages are sent as PNG because lossless compression keeps
//! rendered text crisp for the model.

use crate::pipeline::input::{MediaImage, MediaSource};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode one image as base64 with the matching MIME type.
pub fn encode_image(media: &MediaImage) -> Result<ImageData, image::ImageError> {
    let (format, mime) = match media.source {
        MediaSource::Photo { .. } => (ImageFormat::Jpeg, "image/jpeg"),
        MediaSource::PdfPage { .. } => (ImageFormat::Png, "image/png"),
    };

    let mut buf = Vec::new();
    match format {
        // The JPEG encoder rejects alpha channels.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(media.image.to_rgb8())
            .write_to(&mut Cursor::new(&mut buf), format)?,
        _ => media.image.write_to(&mut Cursor::new(&mut buf), format)?,
    }

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {:?} → {} bytes base64", media.source, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

/// Encode every image, preserving order.
pub fn encode_all(images: &[MediaImage]) -> Result<Vec<ImageData>, image::ImageError> {
    images.iter().map(encode_image).collect()
}
