//! DOCX read directly from the package: always available, no external
//! tools.
//!
//! Pictures are resolved through the main part's relationships at the
//! position their drawing occupies in the body, so the translator receives
//! exactly one reference per picture slot. Images the body never points at
//! are appended after the additional-images marker.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::ooxml::docx::read_docx;
use crate::ooxml::Package;
use crate::pipeline::extract::extract_relationship_images;
use crate::pipeline::reconcile::append_unplaced;
use crate::pipeline::sink::ImageSink;
use crate::pipeline::{postprocess, translate};
use std::path::Path;
use tracing::debug;

use super::BackendOutput;

pub fn convert(
    path: &Path,
    _config: &ConversionConfig,
    sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let mut pkg = Package::open(path)?;
    let content = read_docx(&mut pkg)?;

    let images = extract_relationship_images(&mut pkg, &content.rels, &content.image_rids, sink);
    let translation = translate::translate(&content.document, &images.placed);
    debug!(
        "Translated {} blocks: {} pictures placed, {} unreferenced",
        content.document.blocks.len(),
        translation.placed,
        images.unreferenced.len()
    );

    let unplaced =
        translation.unplaced + images.unreferenced.iter().filter(|r| !r.is_empty()).count();
    let markdown = append_unplaced(&translation.markdown, &images.unreferenced);
    Ok(BackendOutput::new(postprocess::normalize(&markdown), unplaced))
}
