//! Error types for the edgequake-office2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Office2MdError`] — **Fatal**: the document cannot be converted at all
//!   (missing file, corrupt package, backend binary missing or hung).
//!   Returned as `Err(Office2MdError)` from the top-level `convert*`
//!   functions. In batch mode it fails that one file and nothing else.
//!
//! * [`ImageError`] — **Non-fatal**: a single image could not be decoded or
//!   written. The surrounding text is still converted; the error is stored in
//!   [`crate::output::ConversionOutput::image_errors`] so callers can report
//!   it without losing the document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-office2md library.
///
/// Image-level failures use [`ImageError`] and are collected in
/// [`crate::output::ConversionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Office2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not one of the supported formats.
    #[error("Unsupported format '{extension}' for '{path}'\nSupported: .docx, .xlsx, .pptx, .pdf")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file does not start with the magic bytes its extension promises.
    #[error("File '{path}' is not a valid {expected} file\nFirst bytes: {magic:?}")]
    BadMagic {
        path: PathBuf,
        expected: &'static str,
        magic: [u8; 4],
    },

    // ── Package errors ────────────────────────────────────────────────────
    /// The OOXML zip container could not be opened or read.
    #[error("Invalid Office package '{path}': {detail}")]
    InvalidPackage { path: PathBuf, detail: String },

    /// A part required for conversion is absent from the package.
    #[error("Package part '{part}' is missing")]
    MissingPart { part: String },

    /// An XML part is malformed.
    #[error("Malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The requested (or every candidate) backend is not usable on this host.
    #[error("Backend '{backend}' is not available.\n{hint}")]
    BackendUnavailable { backend: String, hint: String },

    /// The backend ran but reported failure (e.g. non-zero exit status).
    #[error("Backend '{backend}' failed: {detail}")]
    BackendFailed { backend: String, detail: String },

    /// The backend did not finish within its time budget and was killed.
    #[error("Backend '{backend}' timed out after {secs}s\nIncrease --pandoc-timeout or pick another backend.")]
    BackendTimeout { backend: String, secs: u64 },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Office2MdError {
    /// Shorthand for an [`Office2MdError::Xml`] tied to a package part.
    pub(crate) fn xml(part: &str, detail: impl std::fmt::Display) -> Self {
        Office2MdError::Xml {
            part: part.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal error for a single image.
///
/// The image is dropped from the output (its reference is empty) and the
/// conversion carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image buffer was empty.
    #[error("Image {index}: empty image data")]
    Empty { index: usize },

    /// Inline base64 payload could not be decoded.
    #[error("Image {index}: base64 decode failed: {detail}")]
    DecodeFailed { index: usize, detail: String },

    /// The image is linked rather than embedded, so there are no bytes to copy.
    #[error("Image {index}: no byte source for '{target}'")]
    NoByteSource { index: usize, target: String },

    /// Writing the image file failed.
    #[error("Image {index}: failed to write '{path}': {detail}")]
    WriteFailed {
        index: usize,
        path: String,
        detail: String,
    },
}
