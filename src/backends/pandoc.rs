//! DOCX via the external `pandoc` binary.
//!
//! pandoc is the most faithful DOCX reader available, but its Markdown
//! needs repair before it matches our dialect:
//!
//! - images are extracted to a media directory and referenced by paths that
//!   point into that (temporary) directory;
//! - tables pandoc cannot express as pipe tables come out as raw HTML, and
//!   sometimes as bare `<colgroup>`/`<thead>`/`<tbody>` fragments;
//! - attribute blocks (`{width="…"}`, `{#id .class}`) and escapes trail
//!   behind images and punctuation.
//!
//! The run is split in two: [`run_pandoc`] owns the child process and its
//! time budget, [`finish`] is a pure function of pandoc's stdout and media
//! directory, so the repair chain is testable without pandoc installed.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::pipeline::extract::{collect_media_dir, rewrite_media_paths, MediaMap};
use crate::pipeline::reconcile::{append_unplaced, strip_images};
use crate::pipeline::sink::ImageSink;
use crate::pipeline::{postprocess, tables};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::BackendOutput;

const OUTPUT_FORMAT: &str = "markdown+pipe_tables-simple_tables-multiline_tables-grid_tables";

static RE_HTML_IMG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc="([^"]*)"[^>]*?/?\s*>"#).unwrap()
});

static RE_EMPTY_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p>\s*</p>").unwrap());

/// Raw pandoc result: stdout plus the media directory it extracted into.
#[derive(Debug)]
pub struct PandocRun {
    pub markdown: String,
    /// `None` in skip mode, where no media is requested.
    pub media: Option<TempDir>,
}

/// Convert `path` with the pandoc executable at `pandoc`.
pub async fn convert(
    path: &Path,
    pandoc: &Path,
    config: &ConversionConfig,
    sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let run = run_pandoc(path, pandoc, config).await?;
    let media_root = run.media.as_ref().map(TempDir::path);
    let (markdown, unplaced) = finish(&run.markdown, media_root, sink);
    Ok(BackendOutput::new(markdown, unplaced))
}

/// Run pandoc under the configured time budget.
///
/// The child is killed if the budget runs out. A non-zero exit is a hard
/// failure carrying pandoc's stderr.
pub async fn run_pandoc(
    path: &Path,
    pandoc: &Path,
    config: &ConversionConfig,
) -> Result<PandocRun, Office2MdError> {
    let media = if config.image_mode.is_skip() {
        None
    } else {
        Some(TempDir::new().map_err(|e| {
            Office2MdError::Internal(format!("Failed to create media directory: {}", e))
        })?)
    };

    let mut cmd = tokio::process::Command::new(pandoc);
    cmd.arg(path)
        .args(["-f", "docx", "-t", OUTPUT_FORMAT])
        .arg("--wrap=none")
        .arg("--markdown-headings=atx");
    if let Some(ref dir) = media {
        cmd.arg(format!("--extract-media={}", dir.path().display()));
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!("Running pandoc on {}", path.display());
    let secs = config.pandoc_timeout_secs;
    let output = match timeout(Duration::from_secs(secs), cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(Office2MdError::BackendFailed {
                backend: "pandoc".to_string(),
                detail: format!("could not start '{}': {}", pandoc.display(), e),
            })
        }
        Err(_) => {
            return Err(Office2MdError::BackendTimeout {
                backend: "pandoc".to_string(),
                secs,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Office2MdError::BackendFailed {
            backend: "pandoc".to_string(),
            detail: format!("{} {}", output.status, stderr.trim()),
        });
    }

    let markdown = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("pandoc produced {} bytes", markdown.len());
    Ok(PandocRun { markdown, media })
}

/// Turn pandoc's stdout into normalised Markdown.
///
/// Images in `media_root` go through the sink in natural file order; every
/// link into that directory is rewritten to the sink's reference. Paths are
/// rewritten twice because HTML table conversion can surface image links
/// that were hidden inside table markup. Media files pandoc extracted but
/// never linked are appended after the additional-images marker.
///
/// Returns the Markdown and the number of appended references.
pub fn finish(markdown: &str, media_root: Option<&Path>, sink: &mut ImageSink) -> (String, usize) {
    let mut map = match media_root {
        Some(root) if !sink.mode().is_skip() => Some(collect_media_dir(root, sink)),
        _ => None,
    };

    let mut md = match map.as_mut() {
        Some(map) => rewrite_all(markdown, map),
        None => strip_images(markdown),
    };
    md = tables::html_tables_to_pipe(&md);
    md = cleanup_artifacts(&md, map.as_ref());
    let unplaced = match map.as_mut() {
        Some(map) => {
            md = rewrite_all(&md, map);
            let unlinked = map.unlinked();
            md = append_unplaced(&md, &unlinked);
            unlinked.len()
        }
        None => {
            md = strip_images(&md);
            0
        }
    };
    (postprocess::normalize(&md), unplaced)
}

fn rewrite_all(markdown: &str, map: &mut MediaMap) -> String {
    let md = rewrite_media_paths(markdown, map);
    rewrite_html_images(&md, map)
}

/// `<img src="…">` tags pandoc emits for images with attributes it cannot
/// express. Known media becomes Markdown image syntax; anything else
/// pointing into the media directory is dropped.
fn rewrite_html_images(markdown: &str, map: &mut MediaMap) -> String {
    RE_HTML_IMG
        .replace_all(markdown, |caps: &Captures<'_>| {
            let src = &caps[1];
            match map.claim(src) {
                Some(Some(target)) => format!("![]({target})"),
                Some(None) => String::new(),
                None if map.is_under_root(src) => String::new(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Remove leftovers the normaliser does not know about: `<img>` tags into
/// the media directory (skip mode) and empty `<p></p>` pairs.
fn cleanup_artifacts(markdown: &str, map: Option<&MediaMap>) -> String {
    let md = match map {
        Some(_) => markdown.to_string(),
        None => RE_HTML_IMG.replace_all(markdown, "").into_owned(),
    };
    RE_EMPTY_PARAGRAPH.replace_all(&md, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageMode;
    use tempfile::tempdir;

    fn sink(mode: ImageMode, out: &Path) -> ImageSink {
        ImageSink::new(mode, out.join("doc_images"), out.to_path_buf())
    }

    #[test]
    fn media_links_rewritten_in_file_order() {
        let media = tempdir().unwrap();
        let media_dir = media.path().join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        std::fs::write(media_dir.join("image10.png"), b"ten").unwrap();
        std::fs::write(media_dir.join("image2.jpeg"), b"two").unwrap();

        let out = tempdir().unwrap();
        let mut sink = sink(ImageMode::Extract, out.path());
        let raw = format!(
            "# Title\n\n![]({root}/media/image2.jpeg){{width=\"2in\" height=\"1in\"}}\n\ntext\n\n![chart](media/image10.png)\n",
            root = media.path().display()
        );
        let (md, _) = finish(&raw, Some(media.path()), &mut sink);
        assert_eq!(
            md,
            "# Title\n\n![](./doc_images/image_1.jpg)\n\ntext\n\n![chart](./doc_images/image_2.png)"
        );
    }

    #[test]
    fn html_tables_become_pipe_tables() {
        let mut sink = sink(ImageMode::Skip, Path::new("/tmp/unused"));
        let raw = "Before\n\n<table>\n<thead>\n<tr><th>Name</th><th>Qty</th></tr>\n</thead>\n<tbody>\n<tr><td>Apples</td><td>3</td></tr>\n</tbody>\n</table>\n\nAfter\n";
        let (md, _) = finish(raw, None, &mut sink);
        assert_eq!(
            md,
            "Before\n\n| Name | Qty |\n| --- | --- |\n| Apples | 3 |\n\nAfter"
        );
    }

    #[test]
    fn skip_mode_strips_images_and_img_tags() {
        let mut sink = sink(ImageMode::Skip, Path::new("/tmp/unused"));
        let raw = "A ![x](media/image1.png) B\n\n<img src=\"/tmp/xyz/media/image2.png\" style=\"width:1in\" />\n\n<p> </p>\nC\\.\n";
        let (md, _) = finish(raw, None, &mut sink);
        assert!(!md.contains("!["));
        assert!(!md.contains("<img"));
        assert!(!md.contains("<p>"));
        assert!(md.contains("C."));
    }

    #[test]
    fn html_img_into_media_dir_is_rewritten() {
        let media = tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("media")).unwrap();
        std::fs::write(media.path().join("media/image1.png"), b"png").unwrap();
        let mut sink = sink(ImageMode::Embed, Path::new("/tmp/unused"));
        let raw = format!(
            "<img src=\"{}/media/image1.png\" style=\"width:2in\" />\n",
            media.path().display()
        );
        let (md, _) = finish(&raw, Some(media.path()), &mut sink);
        assert!(md.starts_with("![](data:image/png;base64,"));
    }

    #[test]
    fn attribute_blocks_removed() {
        let mut sink = sink(ImageMode::Skip, Path::new("/tmp/unused"));
        let raw = "Heading text{#intro .unnumbered}\n\nSpan{style=\"color:red\"}\n";
        assert_eq!(finish(raw, None, &mut sink).0, "Heading text\n\nSpan");
    }

    #[test]
    fn unlinked_media_appended_after_marker() {
        let media = tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("media")).unwrap();
        std::fs::write(media.path().join("media/image1.png"), b"one").unwrap();
        std::fs::write(media.path().join("media/image2.png"), b"two").unwrap();

        let out = tempdir().unwrap();
        let mut sink = ImageSink::new(ImageMode::Extract, out.path().join("d_images"), out.path().to_path_buf());
        let (md, unplaced) = finish("Text ![](media/image1.png)\n", Some(media.path()), &mut sink);
        assert_eq!(
            md,
            "Text ![](./d_images/image_1.png)\n\n<!-- Additional extracted images -->\n\n![](./d_images/image_2.png)"
        );
        assert_eq!(unplaced, 1);
        assert!(out.path().join("d_images/image_2.png").exists());
    }

    #[test]
    fn every_media_file_is_linked_once() {
        let media = tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("media")).unwrap();
        for name in ["image1.png", "image2.png", "image3.png"] {
            std::fs::write(media.path().join("media").join(name), name).unwrap();
        }
        let out = tempdir().unwrap();
        let mut sink = sink(ImageMode::Extract, out.path());
        let raw = "<img src=\"media/image3.png\" style=\"width:1in\" />\n\n![](media/image1.png)\n";
        let (md, unplaced) = finish(raw, Some(media.path()), &mut sink);

        let report = sink.into_report();
        assert_eq!(md.matches("![](").count(), report.emitted);
        assert_eq!(report.emitted, 3);
        assert_eq!(unplaced, 1);
        assert!(md.ends_with("![](./doc_images/image_2.png)"), "got: {md}");
    }

    #[test]
    fn skip_mode_strips_images_with_bracketed_alt() {
        let mut sink = sink(ImageMode::Skip, Path::new("/tmp/unused"));
        let (md, unplaced) = finish("A ![Figure \\[1\\]](media/image1.png) B\n", None, &mut sink);
        assert!(!md.contains("!["), "got: {md}");
        assert!(md.starts_with('A') && md.ends_with('B'));
        assert_eq!(unplaced, 0);
    }
}
