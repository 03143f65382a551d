//! # edgequake-office2md
//!
//! Convert Office documents (DOCX, XLSX, PPTX) and PDFs to one consistent
//! Markdown dialect.
//!
//! ## Why this crate?
//!
//! Every DOCX converter gets something wrong: one emits images as inline
//! base64, another as loose files in a temp directory, a third as
//! `<!-- image -->` placeholders; tables come out as HTML, bold runs as
//! `****`. This crate picks the best backend available on the machine and
//! then normalises whatever it produced, so callers get the same Markdown
//! (ATX headings, pipe tables, `- ` lists, `![](path)` images) whichever
//! route a document took, with every picture in document order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Input     detect format, check magic bytes
//!  ├─ 2. Backend   pandoc | markup | native (DOCX), spreadsheet, slides, layout (PDF)
//!  ├─ 3. Extract   images → sink (extract to files | embed | skip), in document order
//!  ├─ 4. Reconcile references into placeholders, leftovers appended
//!  ├─ 5. Normalise idempotent cleanup (bold markers, attribute blocks, escapes)
//!  └─ 6. Output    Markdown + stats, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_office2md::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().extract_images(true).build()?;
//!     let output = convert_to_file("report.docx", "report.md", &config).await?;
//!     eprintln!("{} images via {}", output.stats.images_emitted, output.backend);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-office2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Input | Backend | Needs |
//! |-------|---------|-------|
//! | DOCX  | `pandoc` (preferred) | `pandoc` on the PATH |
//! | DOCX  | `markup` (fallback)  | nothing |
//! | DOCX  | `native` (on request) | nothing |
//! | XLSX  | `spreadsheet` | nothing |
//! | PPTX  | `slides` | nothing |
//! | PDF   | `layout` | pdfium + a vision LLM API key |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backends;
pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod ooxml;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backends::{BackendKind, Capabilities};
pub use batch::convert_batch;
pub use config::{ConversionConfig, ConversionConfigBuilder, DocxBackend, ImageMode};
pub use convert::{convert, convert_sync, convert_to_file, Converter};
pub use error::{ImageError, Office2MdError};
pub use output::{BatchSummary, ConversionOutput, ConversionStats};
pub use pipeline::input::DocumentFormat;
pub use progress::{BatchProgressCallback, NoopProgressCallback};
