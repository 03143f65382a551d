//! PDF rasterisation and picture extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.
//!
//! ## Pictures
//!
//! Besides the page raster (which the vision model reads), every embedded
//! image object is pulled out at its native resolution. These are the bytes
//! that end up in the images directory; the page raster never does.

use crate::error::Office2MdError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One page ready for transcription.
pub struct RenderedPage {
    /// Zero-based page index.
    pub index: usize,
    pub raster: DynamicImage,
    /// Embedded pictures in content-stream order.
    pub pictures: Vec<DynamicImage>,
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` wins when set; otherwise the system library search
/// path is used.
pub fn bind_pdfium() -> Result<Pdfium, Office2MdError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(path) => Pdfium::bind_to_library(PathBuf::from(path)),
        None => Pdfium::bind_to_system_library(),
    };
    bindings.map(Pdfium::new).map_err(|e| Office2MdError::BackendUnavailable {
        backend: "layout".to_string(),
        hint: format!(
            "pdfium library could not be loaded ({:?}).\nSet PDFIUM_LIB_PATH to the libpdfium shared library.",
            e
        ),
    })
}

/// Render every page of a PDF and collect its pictures.
pub async fn render_document(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, Office2MdError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_document_blocking(&path, max_pixels))
        .await
        .map_err(|e| Office2MdError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_document_blocking(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, Office2MdError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Office2MdError::BackendFailed {
            backend: "layout".to_string(),
            detail: format!("cannot open '{}': {:?}", pdf_path.display(), e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for (index, page) in pages.iter().enumerate() {
        let raster = match page.render_with_config(&render_config) {
            Ok(bitmap) => bitmap.as_image(),
            Err(e) => {
                warn!("Page {}: rasterisation failed: {:?}", index + 1, e);
                continue;
            }
        };

        let pictures: Vec<DynamicImage> = page
            .objects()
            .iter()
            .filter_map(|obj| {
                let image_obj = obj.as_image_object()?;
                match image_obj.get_raw_image() {
                    Ok(img) => Some(img),
                    Err(e) => {
                        warn!("Page {}: unreadable picture object: {:?}", index + 1, e);
                        None
                    }
                }
            })
            .collect();

        debug!(
            "Rendered page {} → {}x{} px, {} pictures",
            index + 1,
            raster.width(),
            raster.height(),
            pictures.len()
        );
        results.push(RenderedPage {
            index,
            raster,
            pictures,
        });
    }

    Ok(results)
}
