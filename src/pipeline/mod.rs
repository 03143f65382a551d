//! Pipeline stages shared by the conversion backends.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! is testable on its own and a backend is just a particular route through
//! them.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──────────── translate ◀── ooxml reader (native)
//!            │
//! input ──▶ backend ──▶ extract ──▶ sink ──▶ reconcile ──▶ postprocess
//!            │            (3 strategies)     (placeholders)  (normalize)
//!            └── render ──▶ encode ──▶ llm (layout, PDF only)
//! ```
//!
//! 1. [`input`]     — detect the format and validate the file
//! 2. [`extract`]   — locate image bytes (base64 inline, package
//!    relationships, or an external media directory)
//! 3. [`sink`]      — number, write or embed each image
//! 4. [`reconcile`] — substitute image references into placeholders in order
//! 5. [`translate`] — document tree to Markdown for the native reader
//! 6. [`tables`] / [`emphasis`] — shared table rendering and bold-heading repair
//! 7. [`postprocess`] — idempotent cleanup applied to every backend's output
//! 8. [`render`] / [`encode`] / [`llm`] — PDF rasterisation and VLM transcription

pub mod emphasis;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod reconcile;
pub mod render;
pub mod sink;
pub mod tables;
pub mod translate;
