//! Image sink: turn raw image bytes into a Markdown image reference.
//!
//! Every backend funnels the images it discovers through one [`ImageSink`]
//! per document. The sink owns the only image counter, so file names
//! (`image_1.png`, `image_2.jpg`, …) follow discovery order no matter which
//! extraction strategy found the bytes.
//!
//! ## Modes
//!
//! | Mode      | Reference                          | Filesystem |
//! |-----------|------------------------------------|------------|
//! | `Skip`    | `""`                               | untouched  |
//! | `Embed`   | `![](data:image/{mime};base64,…)`  | untouched  |
//! | `Extract` | `![](./{dir}/image_{n}.{ext})`     | one file per image, directory created lazily |
//!
//! Failures never abort the document: the image is dropped (empty
//! reference), a warning is logged and an [`ImageError`] is recorded.

use crate::config::{ConversionConfig, ImageMode};
use crate::error::ImageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Per-document image sink. Not shared across documents.
#[derive(Debug)]
pub struct ImageSink {
    mode: ImageMode,
    images_dir: PathBuf,
    markdown_dir: PathBuf,
    /// Index the next successfully stored image will get. Starts at 1.
    next_index: usize,
    dir_ready: bool,
    found: usize,
    emitted: usize,
    errors: Vec<ImageError>,
}

/// What the sink did over one document, handed back to the caller at the end.
#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    pub images_dir: Option<PathBuf>,
    pub found: usize,
    pub emitted: usize,
    pub errors: Vec<ImageError>,
}

impl ImageSink {
    pub fn new(mode: ImageMode, images_dir: PathBuf, markdown_dir: PathBuf) -> Self {
        Self {
            mode,
            images_dir,
            markdown_dir,
            next_index: 1,
            dir_ready: false,
            found: 0,
            emitted: 0,
            errors: Vec::new(),
        }
    }

    /// Build the sink for a document whose Markdown goes to `output_path`.
    ///
    /// Images land in `config.images_dir`, or `{stem}_images/` beside the
    /// Markdown file when no directory is configured.
    pub fn for_output(output_path: &Path, config: &ConversionConfig) -> Self {
        let markdown_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let images_dir = match config.images_dir {
            Some(ref dir) => dir.clone(),
            None => {
                let stem = output_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                markdown_dir.join(format!("{stem}_images"))
            }
        };
        Self::new(config.image_mode, images_dir, markdown_dir)
    }

    pub fn mode(&self) -> ImageMode {
        self.mode
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Index the next stored image will receive.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Store one image and return its Markdown reference (`""` when dropped).
    pub fn process_image(&mut self, bytes: &[u8], format_hint: &str) -> String {
        self.store(bytes, format_hint)
            .map(|target| format!("![]({target})"))
            .unwrap_or_default()
    }

    /// Store one image and return the bare link target (path or data URI).
    ///
    /// Used by strategies that keep the original alt text.
    pub fn store(&mut self, bytes: &[u8], format_hint: &str) -> Option<String> {
        self.found += 1;
        let index = self.next_index;

        if self.mode.is_skip() {
            self.next_index += 1;
            return None;
        }

        if bytes.is_empty() {
            warn!("Image {}: empty buffer, dropped", index);
            self.errors.push(ImageError::Empty { index });
            return None;
        }

        let ext = normalize_format(format_hint);
        let target = match self.mode {
            ImageMode::Embed => {
                let payload = STANDARD.encode(bytes);
                format!("data:image/{};base64,{}", mime_subtype(&ext), payload)
            }
            ImageMode::Extract => self.write_file(index, bytes, &ext)?,
            ImageMode::Skip => return None,
        };

        self.next_index += 1;
        self.emitted += 1;
        Some(target)
    }

    /// Record a failure for an image the caller could not even hand over
    /// (undecodable base64, linked image without bytes).
    pub fn record_error(&mut self, error: ImageError) {
        warn!("{}", error);
        self.found += 1;
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ImageError] {
        &self.errors
    }

    pub fn into_report(self) -> SinkReport {
        let images_dir = (self.dir_ready && self.mode == ImageMode::Extract)
            .then(|| self.images_dir.clone());
        SinkReport {
            images_dir,
            found: self.found,
            emitted: self.emitted,
            errors: self.errors,
        }
    }

    fn write_file(&mut self, index: usize, bytes: &[u8], ext: &str) -> Option<String> {
        let file_name = format!("image_{index}.{ext}");
        let path = self.images_dir.join(&file_name);

        if !self.dir_ready {
            if let Err(e) = std::fs::create_dir_all(&self.images_dir) {
                self.write_failed(index, &path, e);
                return None;
            }
            self.dir_ready = true;
        }

        if let Err(e) = std::fs::write(&path, bytes) {
            self.write_failed(index, &path, e);
            return None;
        }
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());

        Some(self.link_for(&file_name))
    }

    fn write_failed(&mut self, index: usize, path: &Path, e: std::io::Error) {
        warn!("Image {}: failed to write {}: {}", index, path.display(), e);
        self.errors.push(ImageError::WriteFailed {
            index,
            path: path.display().to_string(),
            detail: e.to_string(),
        });
    }

    /// Link target for a file inside the images directory, relative to the
    /// Markdown file's directory when possible.
    fn link_for(&self, file_name: &str) -> String {
        match relative_to(&self.images_dir, &self.markdown_dir) {
            Some(rel) if rel.is_empty() => format!("./{file_name}"),
            Some(rel) => format!("./{rel}/{file_name}"),
            None => {
                let abs = self.images_dir.join(file_name);
                abs.to_string_lossy().replace('\\', "/")
            }
        }
    }
}

/// `path` expressed relative to `base` with forward slashes, if `path` lies below `base`.
fn relative_to(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Canonical file extension for a format hint.
///
/// Accepts bare extensions (`"JPEG"`), MIME types (`"image/svg+xml"`) and
/// vendor types (`"image/x-emf"`).
pub fn normalize_format(hint: &str) -> String {
    let h = hint.trim().to_ascii_lowercase();
    let h = h.strip_prefix("image/").unwrap_or(&h);
    let h = h.strip_prefix("x-").unwrap_or(h);
    let h = h.trim_start_matches('.');
    match h {
        "" => "png".to_string(),
        "jpeg" | "jpe" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        "tif" => "tiff".to_string(),
        other => other.to_string(),
    }
}

fn mime_subtype(ext: &str) -> &str {
    match ext {
        "jpg" => "jpeg",
        "svg" => "svg+xml",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_in(dir: &Path, mode: ImageMode) -> ImageSink {
        ImageSink::new(mode, dir.join("doc_images"), dir.to_path_buf())
    }

    #[test]
    fn format_hints_normalised() {
        assert_eq!(normalize_format("JPEG"), "jpg");
        assert_eq!(normalize_format("image/jpeg"), "jpg");
        assert_eq!(normalize_format("image/svg+xml"), "svg");
        assert_eq!(normalize_format("image/x-emf"), "emf");
        assert_eq!(normalize_format(".PNG"), "png");
        assert_eq!(normalize_format(""), "png");
    }

    #[test]
    fn extract_writes_numbered_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), ImageMode::Extract);

        assert!(!tmp.path().join("doc_images").exists(), "dir created lazily");
        let r1 = sink.process_image(b"first", "png");
        let r2 = sink.process_image(b"second", "jpeg");

        assert_eq!(r1, "![](./doc_images/image_1.png)");
        assert_eq!(r2, "![](./doc_images/image_2.jpg)");
        assert_eq!(
            std::fs::read(tmp.path().join("doc_images/image_2.jpg")).unwrap(),
            b"second"
        );
        let report = sink.into_report();
        assert_eq!(report.emitted, 2);
        assert_eq!(report.images_dir, Some(tmp.path().join("doc_images")));
    }

    #[test]
    fn embed_never_touches_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), ImageMode::Embed);
        let r = sink.process_image(b"abc", "jpg");
        assert_eq!(r, "![](data:image/jpeg;base64,YWJj)");
        assert!(!tmp.path().join("doc_images").exists());
        assert_eq!(sink.next_index(), 2);
    }

    #[test]
    fn skip_returns_empty_but_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), ImageMode::Skip);
        assert_eq!(sink.process_image(b"abc", "png"), "");
        assert_eq!(sink.next_index(), 2);
        assert!(!tmp.path().join("doc_images").exists());
    }

    #[test]
    fn empty_buffer_is_an_error_and_keeps_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), ImageMode::Extract);
        assert_eq!(sink.process_image(b"", "png"), "");
        assert_eq!(sink.next_index(), 1);
        assert_eq!(sink.errors(), &[ImageError::Empty { index: 1 }]);
        assert_eq!(sink.process_image(b"x", "png"), "![](./doc_images/image_1.png)");
    }

    #[test]
    fn write_failure_is_absorbed() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the image directory should go.
        let blocker = tmp.path().join("doc_images");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let mut sink = sink_in(tmp.path(), ImageMode::Extract);

        assert_eq!(sink.process_image(b"data", "png"), "");
        assert!(matches!(sink.errors()[0], ImageError::WriteFailed { index: 1, .. }));
    }

    #[test]
    fn images_dir_outside_markdown_dir_uses_full_path() {
        let tmp = tempfile::tempdir().unwrap();
        let md_dir = tmp.path().join("out");
        let img_dir = tmp.path().join("assets");
        let mut sink = ImageSink::new(ImageMode::Extract, img_dir.clone(), md_dir);
        let r = sink.process_image(b"x", "gif");
        let expected = img_dir.join("image_1.gif").to_string_lossy().replace('\\', "/");
        assert_eq!(r, format!("![]({expected})"));
    }

    #[test]
    fn default_dir_follows_output_stem() {
        let config = ConversionConfig::default();
        let sink = ImageSink::for_output(Path::new("out/report.md"), &config);
        assert_eq!(sink.images_dir(), Path::new("out/report_images"));
    }
}
