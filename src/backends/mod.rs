//! Conversion backends and the capability probe that chooses between them.
//!
//! Every backend turns one input file into Markdown, feeding the images it
//! finds through the document's [`ImageSink`]. They differ only in where the
//! structure comes from:
//!
//! | Backend        | Input | Source of structure                         |
//! |----------------|-------|---------------------------------------------|
//! | [`pandoc`]     | DOCX  | external `pandoc` binary                    |
//! | [`markup`]     | DOCX  | package → HTML → Markdown (`htmd`)          |
//! | [`native`]     | DOCX  | package → document tree → translator        |
//! | [`layout`]     | PDF   | pdfium raster + vision LLM                  |
//! | [`spreadsheet`]| XLSX  | worksheet cells                             |
//! | [`slides`]     | PPTX  | slide shapes                                |
//!
//! ## Why probe once?
//!
//! Whether `pandoc` is on the PATH or pdfium can be loaded does not change
//! during a run. [`Capabilities::probe`] answers both questions once and the
//! result is handed to the [`crate::Converter`], so a batch of hundreds of
//! files does not fork `pandoc --version` hundreds of times, and tests can
//! inject any combination without touching the environment.

pub mod layout;
pub mod markup;
pub mod native;
pub mod pandoc;
pub mod slides;
pub mod spreadsheet;

use crate::config::{ConversionConfig, DocxBackend};
use crate::error::Office2MdError;
use crate::pipeline::sink::ImageSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Budget for `pandoc --version`.
const PROBE_TIMEOUT_SECS: u64 = 10;

/// The backend that produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Pandoc,
    Markup,
    Native,
    Layout,
    Spreadsheet,
    Slides,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pandoc => "pandoc",
            Self::Markup => "markup",
            Self::Native => "native",
            Self::Layout => "layout",
            Self::Spreadsheet => "spreadsheet",
            Self::Slides => "slides",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend hands back besides the images already in the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOutput {
    /// Normalised Markdown.
    pub markdown: String,
    /// References appended after the additional-images marker.
    pub images_unplaced: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl BackendOutput {
    pub fn new(markdown: String, images_unplaced: usize) -> Self {
        Self {
            markdown,
            images_unplaced,
            ..Default::default()
        }
    }
}

/// Signature shared by the synchronous, package-reading backends.
pub(crate) type SyncBackend =
    fn(&std::path::Path, &ConversionConfig, &mut ImageSink) -> Result<BackendOutput, Office2MdError>;

/// Optional collaborators found on this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Resolved `pandoc` executable, when it answered `--version`.
    pub pandoc: Option<PathBuf>,
    /// pdfium could be bound.
    pub pdfium: bool,
}

impl Capabilities {
    /// Probe the environment for `pandoc` and pdfium.
    pub async fn probe(config: &ConversionConfig) -> Self {
        let pandoc = probe_pandoc(&config.pandoc_path).await;
        let pdfium = tokio::task::spawn_blocking(|| crate::pipeline::render::bind_pdfium().is_ok())
            .await
            .unwrap_or(false);
        debug!("Capabilities: pandoc={:?} pdfium={}", pandoc, pdfium);
        Self { pandoc, pdfium }
    }

    /// Nothing optional available: DOCX via markup or native, no PDF.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_pandoc(mut self, path: impl Into<PathBuf>) -> Self {
        self.pandoc = Some(path.into());
        self
    }

    pub fn with_pdfium(mut self, available: bool) -> Self {
        self.pdfium = available;
        self
    }

    /// Pick the DOCX backend for `requested`.
    ///
    /// `Auto` walks the ranked list pandoc > markup > native and takes the
    /// first available; markup is always compiled in, so native is only
    /// reached when asked for. Forcing pandoc without it installed is an
    /// error rather than a silent fallback.
    pub fn docx_backend(&self, requested: DocxBackend) -> Result<BackendKind, Office2MdError> {
        match requested {
            DocxBackend::Native => Ok(BackendKind::Native),
            DocxBackend::Markup => Ok(BackendKind::Markup),
            DocxBackend::Pandoc => match self.pandoc {
                Some(_) => Ok(BackendKind::Pandoc),
                None => Err(pandoc_unavailable()),
            },
            DocxBackend::Auto => Ok(if self.pandoc.is_some() {
                BackendKind::Pandoc
            } else {
                BackendKind::Markup
            }),
        }
    }

    /// The PDF backend, if pdfium is loadable.
    pub fn pdf_backend(&self) -> Result<BackendKind, Office2MdError> {
        if self.pdfium {
            Ok(BackendKind::Layout)
        } else {
            Err(Office2MdError::BackendUnavailable {
                backend: "layout".to_string(),
                hint: "PDF conversion needs the pdfium shared library.\n\
                       Install it system-wide or set PDFIUM_LIB_PATH to libpdfium."
                    .to_string(),
            })
        }
    }
}

fn pandoc_unavailable() -> Office2MdError {
    Office2MdError::BackendUnavailable {
        backend: "pandoc".to_string(),
        hint: "pandoc was requested but is not installed or did not respond.\n\
               Install it from https://pandoc.org/installing.html, pass --pandoc-path,\n\
               or choose another DOCX backend (--mammoth, --native)."
            .to_string(),
    }
}

async fn probe_pandoc(path: &std::path::Path) -> Option<PathBuf> {
    let mut cmd = tokio::process::Command::new(path);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let status = match timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), cmd.status()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            debug!("pandoc probe failed: {}", e);
            return None;
        }
        Err(_) => {
            debug!("pandoc probe timed out");
            return None;
        }
    };
    status.success().then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_pandoc_then_markup() {
        let caps = Capabilities::none();
        assert_eq!(caps.docx_backend(DocxBackend::Auto).unwrap(), BackendKind::Markup);
        let caps = caps.with_pandoc("pandoc");
        assert_eq!(caps.docx_backend(DocxBackend::Auto).unwrap(), BackendKind::Pandoc);
    }

    #[test]
    fn forced_backends() {
        let caps = Capabilities::none().with_pandoc("/usr/bin/pandoc");
        assert_eq!(caps.docx_backend(DocxBackend::Native).unwrap(), BackendKind::Native);
        assert_eq!(caps.docx_backend(DocxBackend::Markup).unwrap(), BackendKind::Markup);
        assert_eq!(caps.docx_backend(DocxBackend::Pandoc).unwrap(), BackendKind::Pandoc);
    }

    #[test]
    fn forced_pandoc_without_binary_is_unavailable() {
        let err = Capabilities::none()
            .docx_backend(DocxBackend::Pandoc)
            .unwrap_err();
        assert!(matches!(err, Office2MdError::BackendUnavailable { ref backend, .. } if backend == "pandoc"));
    }

    #[test]
    fn pdf_needs_pdfium() {
        assert!(Capabilities::none().pdf_backend().is_err());
        assert_eq!(
            Capabilities::none().with_pdfium(true).pdf_backend().unwrap(),
            BackendKind::Layout
        );
    }

    #[test]
    fn backend_kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&BackendKind::Spreadsheet).unwrap(), "\"spreadsheet\"");
        assert_eq!(BackendKind::Markup.to_string(), "markup");
    }

    #[tokio::test]
    async fn missing_pandoc_probes_as_absent() {
        let config = ConversionConfig::builder()
            .pandoc_path("/nonexistent/definitely-not-pandoc")
            .build()
            .unwrap();
        assert_eq!(probe_pandoc(&config.pandoc_path).await, None);
    }
}
