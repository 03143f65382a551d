//! Result types returned by the conversion entry points.

use crate::backends::BackendKind;
use crate::error::ImageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The converted document plus everything a caller needs to report on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final, normalised Markdown. Always ends with a single newline.
    pub markdown: String,

    /// Backend that produced the Markdown.
    pub backend: BackendKind,

    /// Where the Markdown is (or would be) written. Image paths are relative to its directory.
    pub output_path: PathBuf,

    /// Directory images were written to (extract mode only, and only if one was written).
    pub images_dir: Option<PathBuf>,

    /// Per-image failures that were absorbed during conversion.
    pub image_errors: Vec<ImageError>,

    pub stats: ConversionStats,
}

/// Counters collected while converting one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Image blobs discovered in the source.
    pub images_found: usize,
    /// Images that produced a non-empty reference.
    pub images_emitted: usize,
    /// Images dropped because of an [`ImageError`].
    pub images_failed: usize,
    /// References that found no placeholder and were appended at the end.
    pub images_unplaced: usize,
    /// VLM prompt tokens (PDF layout backend only).
    pub input_tokens: u64,
    /// VLM completion tokens (PDF layout backend only).
    pub output_tokens: u64,
    /// Wall-clock conversion time.
    pub duration_ms: u64,
}

/// Outcome of [`crate::batch::convert_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    /// `(input, error message)` for each file that failed.
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when no file failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
