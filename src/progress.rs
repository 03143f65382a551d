//! Progress-callback trait for batch conversion events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to [`crate::batch::convert_batch`]
//! to receive an event as each file starts, succeeds or fails.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: the CLI drives an
//! `indicatif` bar from it, a service can forward events to a queue, and the
//! library knows nothing about either. All methods default to no-ops so
//! callers only override what they care about.
//!
//! # Example
//!
//! ```rust
//! use edgequake_office2md::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Failures(AtomicUsize);
//!
//! impl BatchProgressCallback for Failures {
//!     fn on_file_error(&self, _index: usize, _total: usize, input: &Path, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}: {}", input.display(), error);
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch orchestrator as it walks the input files.
///
/// `index` is 1-based; `total` is the number of supported files found.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after discovery and before the first file.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    fn on_file_start(&self, index: usize, total: usize, input: &Path) {
        let _ = (index, total, input);
    }

    /// Called when a file was converted and written to `output`.
    fn on_file_complete(&self, index: usize, total: usize, input: &Path, output: &Path) {
        let _ = (index, total, input, output);
    }

    /// Called when a file failed. The batch carries on with the next file.
    fn on_file_error(&self, index: usize, total: usize, input: &Path, error: &str) {
        let _ = (index, total, input, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
