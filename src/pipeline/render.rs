//! PDF rasterisation: render pages of an uploaded PDF to `DynamicImage`.
//!
//! pdfium is bound through `pdfium-auto`, which downloads and caches the
//! library on first use. The pdfium C++ library is not safe to call from
//! async contexts, so all work happens inside `spawn_blocking`.
//!
//! Pages render at the document's native resolution (one pixel per PDF
//! point, scaled by `render_scale`) and are capped at `max_image_pixels` on
//! each edge.

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::pipeline::input::{MediaImage, MediaSource};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rasterise the configured pages of an in-memory PDF.
///
/// Returns images in page order.
pub async fn render_pdf(
    bytes: Vec<u8>,
    name: String,
    config: &ReviewConfig,
) -> Result<Vec<MediaImage>, ReviewError> {
    let pages = config.pdf_pages;
    let scale = config.render_scale;
    let max_px = config.max_image_pixels;

    tokio::task::spawn_blocking(move || render_blocking(&bytes, &name, pages, scale, max_px))
        .await
        .map_err(|e| ReviewError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of page rendering.
fn render_blocking(
    bytes: &[u8],
    name: &str,
    selection: crate::config::PdfPages,
    scale: f32,
    max_px: u32,
) -> Result<Vec<MediaImage>, ReviewError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| ReviewError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ReviewError::CorruptPdf {
            name: name.to_string(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF '{}' loaded: {} pages", name, total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(ReviewError::CorruptPdf {
            name: name.to_string(),
            detail: "document has no pages".to_string(),
        });
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_px as i32)
        .set_maximum_height(max_px as i32);

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ReviewError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ReviewError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(MediaImage {
            source: MediaSource::PdfPage {
                name: name.to_string(),
                page: idx + 1,
            },
            image,
        });
    }

    Ok(results)
}
