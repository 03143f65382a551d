//! Single-document conversion entry points.
//!
//! ## Why a `Converter` value?
//!
//! Backend availability (is `pandoc` installed, can pdfium be loaded) is
//! probed once and stored next to the configuration. The free functions
//! [`convert`], [`convert_to_file`] and [`convert_sync`] probe on every
//! call, which is fine for one document; batch runs build one
//! [`Converter`] and reuse it.

use crate::backends::{self, BackendKind, BackendOutput, Capabilities, SyncBackend};
use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::input::{self, DocumentFormat};
use crate::pipeline::postprocess::ensure_final_newline;
use crate::pipeline::sink::ImageSink;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Converts documents with a fixed configuration and capability set.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
    caps: Capabilities,
}

impl Converter {
    pub fn new(config: ConversionConfig, caps: Capabilities) -> Self {
        Self { config, caps }
    }

    /// Probe the environment and build a converter for `config`.
    pub async fn probe(config: ConversionConfig) -> Self {
        let caps = Capabilities::probe(&config).await;
        Self::new(config, caps)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// The backend that would handle a document of `format`.
    pub fn select_backend(&self, format: DocumentFormat) -> Result<BackendKind, Office2MdError> {
        match format {
            DocumentFormat::Docx => self.caps.docx_backend(self.config.docx_backend),
            DocumentFormat::Xlsx => Ok(BackendKind::Spreadsheet),
            DocumentFormat::Pptx => Ok(BackendKind::Slides),
            DocumentFormat::Pdf => self.caps.pdf_backend(),
        }
    }

    /// Convert `input` to Markdown.
    ///
    /// `output_path` decides where extracted images go and what they are
    /// relative to; it defaults to the input with a `.md` extension. Nothing
    /// but images is written: use [`Converter::convert_to_file`] to also
    /// write the Markdown.
    ///
    /// # Errors
    /// Returns `Err(Office2MdError)` only for fatal errors; per-image
    /// failures end up in [`ConversionOutput::image_errors`].
    pub async fn convert(
        &self,
        input: &Path,
        output_path: Option<&Path>,
    ) -> Result<ConversionOutput, Office2MdError> {
        let start = Instant::now();
        let format = input::resolve_input(input)?;
        let backend = self.select_backend(format)?;
        info!("Converting {} ({}) with {}", input.display(), format, backend);

        let output_path = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input::default_output_path(input));
        let mut sink = ImageSink::for_output(&output_path, &self.config);

        let (produced, sink) = match backend {
            BackendKind::Pandoc => {
                let pandoc = self
                    .caps
                    .pandoc
                    .clone()
                    .unwrap_or_else(|| self.config.pandoc_path.clone());
                let produced =
                    backends::pandoc::convert(input, &pandoc, &self.config, &mut sink).await;
                (produced, sink)
            }
            BackendKind::Layout => {
                let produced = backends::layout::convert(input, &self.config, &mut sink).await;
                (produced, sink)
            }
            BackendKind::Markup => self.run_blocking(backends::markup::convert, input, sink).await?,
            BackendKind::Native => self.run_blocking(backends::native::convert, input, sink).await?,
            BackendKind::Spreadsheet => {
                self.run_blocking(backends::spreadsheet::convert, input, sink).await?
            }
            BackendKind::Slides => self.run_blocking(backends::slides::convert, input, sink).await?,
        };
        let produced = produced?;
        let report = sink.into_report();

        let stats = ConversionStats {
            images_found: report.found,
            images_emitted: report.emitted,
            images_failed: report.errors.len(),
            images_unplaced: produced.images_unplaced,
            input_tokens: produced.input_tokens,
            output_tokens: produced.output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Converted {}: {} images ({} failed), {}ms",
            input.display(),
            stats.images_emitted,
            stats.images_failed,
            stats.duration_ms
        );

        Ok(ConversionOutput {
            markdown: ensure_final_newline(&produced.markdown),
            backend,
            output_path,
            images_dir: report.images_dir,
            image_errors: report.errors,
            stats,
        })
    }

    /// Convert `input` and write the Markdown to `output_path` (default:
    /// the input with a `.md` extension).
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn convert_to_file(
        &self,
        input: &Path,
        output_path: Option<&Path>,
    ) -> Result<ConversionOutput, Office2MdError> {
        let output = self.convert(input, output_path).await?;
        write_atomic(&output.output_path, &output.markdown).await?;
        debug!("Wrote {}", output.output_path.display());
        Ok(output)
    }

    /// Run a package-reading backend on the blocking pool.
    ///
    /// The sink moves into the task and back out so it is never shared.
    async fn run_blocking(
        &self,
        backend: SyncBackend,
        input: &Path,
        mut sink: ImageSink,
    ) -> Result<(Result<BackendOutput, Office2MdError>, ImageSink), Office2MdError> {
        let config = self.config.clone();
        let path = input.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let produced = backend(&path, &config, &mut sink);
            (produced, sink)
        })
        .await
        .map_err(|e| Office2MdError::Internal(format!("Conversion task panicked: {}", e)))
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), Office2MdError> {
    let write_err = |e: std::io::Error| Office2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

/// Convert one document, probing backend availability first.
///
/// This is the primary entry point for one-off conversions.
///
/// # Example
/// ```rust,no_run
/// use edgequake_office2md::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = convert("report.docx", &ConversionConfig::default()).await?;
/// println!("{} via {}", output.markdown, output.backend);
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Office2MdError> {
    Converter::probe(config.clone())
        .await
        .convert(input.as_ref(), None)
        .await
}

/// Convert one document and write the Markdown atomically.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Office2MdError> {
    Converter::probe(config.clone())
        .await
        .convert_to_file(input.as_ref(), Some(output_path.as_ref()))
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Office2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Office2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Default Markdown location for `input` inside `out_dir`, if given.
pub(crate) fn output_path_in(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let default = input::default_output_path(input);
    match (out_dir, default.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => default,
    }
}
