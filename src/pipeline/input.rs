//! Input resolution: classify a user-supplied path and validate it.
//!
//! ## Why check magic bytes?
//!
//! A `.docx` that is really an HTML error page, or a truncated download,
//! otherwise fails deep inside the zip reader or pdfium with an opaque
//! message. Reading the first four bytes up front lets us say "this is not a
//! valid DOCX file" before any backend runs.

use crate::error::Office2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const PDF_MAGIC: [u8; 4] = *b"%PDF";

/// Document formats the converter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Docx,
    Xlsx,
    Pptx,
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pptx" => Some(Self::Pptx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    fn magic(self) -> [u8; 4] {
        match self {
            Self::Pdf => PDF_MAGIC,
            _ => ZIP_MAGIC,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Docx => "DOCX",
            Self::Xlsx => "XLSX",
            Self::Pptx => "PPTX",
            Self::Pdf => "PDF",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// True when `path` has one of the supported extensions.
pub fn is_supported(path: &Path) -> bool {
    DocumentFormat::from_path(path).is_some()
}

/// Validate a local input file and detect its format.
///
/// Checks, in order: supported extension, existence, read permission and
/// magic bytes.
pub fn resolve_input(path: &Path) -> Result<DocumentFormat, Office2MdError> {
    let format =
        DocumentFormat::from_path(path).ok_or_else(|| Office2MdError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;

    if !path.exists() {
        return Err(Office2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Office2MdError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Office2MdError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    let read_ok = file.read_exact(&mut magic).is_ok();
    if !read_ok || magic != format.magic() {
        return Err(Office2MdError::BadMagic {
            path: path.to_path_buf(),
            expected: format.label(),
            magic,
        });
    }

    debug!("Resolved {} input: {}", format, path.display());
    Ok(format)
}

/// Default Markdown path for an input: same location, `.md` extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}
