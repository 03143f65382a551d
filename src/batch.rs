//! Directory conversion.
//!
//! Files are converted one after another with a shared [`Converter`]. A file
//! that fails is recorded in the [`BatchSummary`] and the batch moves on;
//! only an unreadable input directory aborts the whole run.

use crate::convert::{output_path_in, Converter};
use crate::error::Office2MdError;
use crate::output::BatchSummary;
use crate::pipeline::extract::natural_cmp;
use crate::pipeline::input::is_supported;
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Convert every supported file in `input_dir`.
///
/// Without `output_dir` each Markdown file is written next to its input.
/// With it, recursive runs mirror the input tree below `output_dir`;
/// flat runs put every file directly in it.
pub async fn convert_batch(
    converter: &Converter,
    input_dir: &Path,
    output_dir: Option<&Path>,
    recursive: bool,
    progress: Option<&dyn BatchProgressCallback>,
) -> Result<BatchSummary, Office2MdError> {
    let noop = NoopProgressCallback;
    let progress: &dyn BatchProgressCallback = match progress {
        Some(p) => p,
        None => &noop,
    };

    let inputs = discover(input_dir, recursive)?;
    info!("Found {} convertible files in {}", inputs.len(), input_dir.display());
    progress.on_batch_start(inputs.len());

    let total = inputs.len();
    let mut summary = BatchSummary::default();
    for (i, input) in inputs.iter().enumerate() {
        let index = i + 1;
        progress.on_file_start(index, total, input);
        let output_path = batch_output_path(input, input_dir, output_dir, recursive);
        match converter.convert_to_file(input, Some(&output_path)).await {
            Ok(output) => {
                progress.on_file_complete(index, total, input, &output.output_path);
                summary.succeeded.push(input.clone());
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", input.display(), e);
                progress.on_file_error(index, total, input, &e.to_string());
                summary.failures.push((input.clone(), e.to_string()));
            }
        }
    }

    progress.on_batch_complete(summary.success_count(), summary.failure_count());
    Ok(summary)
}

/// Supported files under `dir`, in natural path order.
fn discover(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, Office2MdError> {
    if !dir.is_dir() {
        return Err(Office2MdError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            Office2MdError::Internal(format!("walking {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && is_supported(path) && !is_lock_file(path) {
            files.push(entry.into_path());
        }
    }
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

/// Office writes `~$name.docx` owner files next to open documents.
fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with("~$"))
}

fn batch_output_path(
    input: &Path,
    input_dir: &Path,
    output_dir: Option<&Path>,
    recursive: bool,
) -> PathBuf {
    match output_dir {
        Some(out) if recursive => {
            let rel_parent = input
                .parent()
                .and_then(|p| p.strip_prefix(input_dir).ok())
                .unwrap_or_else(|| Path::new(""));
            output_path_in(input, Some(&out.join(rel_parent)))
        }
        _ => output_path_in(input, output_dir),
    }
}
