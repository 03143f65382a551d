//! PDF via page rasters and a vision LLM.
//!
//! ## Pipeline
//!
//! ```text
//! PDF ──pdfium──▶ page rasters ──encode──▶ VLM ──▶ page Markdown with <!-- image -->
//!       └──────▶ embedded pictures ──png──▶ sink ──▶ ordered references ─┐
//!                                                                        ▼
//!                                                     reconcile(placeholders, refs)
//! ```
//!
//! The model is asked to mark every picture with `<!-- image -->`. Pictures
//! are fed to the sink in page order and, within a page, in content-stream
//! order, which is the order a reader meets them. Each page is reconciled
//! against its own pictures only, so a page the model skipped or could not
//! transcribe never shifts pictures onto the next one. Pictures that found
//! no placeholder, including every picture of a failed page, are appended
//! after the additional-images marker instead of being lost.
//!
//! Page calls run concurrently but are re-assembled in page order
//! (`buffered`, not `buffer_unordered`), so concurrency never changes the
//! output.

use crate::config::ConversionConfig;
use crate::error::{ImageError, Office2MdError};
use crate::pipeline::encode::{encode_page, png_bytes};
use crate::pipeline::llm::{self, PageTranscript};
use crate::pipeline::reconcile::{append_unplaced, fill_placeholders, strip_images};
use crate::pipeline::render::{self, RenderedPage};
use crate::pipeline::sink::ImageSink;
use crate::pipeline::postprocess;
use edgequake_llm::{ImageData, LLMProvider};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::BackendOutput;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

// Placeholders left once every picture has been placed.
static RE_LEFTOVER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*(?i:image)\s*-->|!\[\]\(\s*\)").unwrap());

pub async fn convert(
    path: &Path,
    config: &ConversionConfig,
    sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let provider = llm::resolve_provider(config).await?;
    let pages = render::render_document(path, config.max_rendered_pixels).await?;
    if pages.is_empty() {
        return Err(Office2MdError::BackendFailed {
            backend: "layout".to_string(),
            detail: "no page could be rendered".to_string(),
        });
    }
    info!("Rendered {} pages", pages.len());

    let encoded: Vec<(usize, ImageData)> = pages
        .iter()
        .filter_map(|page| match encode_page(&page.raster) {
            Ok(data) => Some((page.index + 1, data)),
            Err(e) => {
                warn!("Failed to encode page {}: {}", page.index + 1, e);
                None
            }
        })
        .collect();

    let transcripts = transcribe_all(&provider, encoded, config).await;
    let done: Vec<&PageTranscript> = transcripts.iter().filter(|t| t.error.is_none()).collect();
    if done.is_empty() {
        let first_error = transcripts
            .iter()
            .find_map(|t| t.error.clone())
            .unwrap_or_else(|| "no page transcribed".to_string());
        return Err(Office2MdError::BackendFailed {
            backend: "layout".to_string(),
            detail: format!(
                "all {} pages failed after {} retries: {}",
                transcripts.len(),
                config.max_retries,
                first_error
            ),
        });
    }

    let pictures = sink_pictures(&pages, sink);
    let contents: Vec<PageContent> = pages
        .iter()
        .zip(pictures)
        .map(|(page, pictures)| PageContent {
            markdown: done
                .iter()
                .find(|t| t.page_num == page.index + 1)
                .map(|t| t.markdown.clone()),
            pictures,
        })
        .collect();
    let (markdown, unplaced) = assemble(&contents, sink.mode().is_skip());

    Ok(BackendOutput {
        markdown,
        images_unplaced: unplaced,
        input_tokens: done.iter().map(|t| t.input_tokens as u64).sum(),
        output_tokens: done.iter().map(|t| t.output_tokens as u64).sum(),
    })
}

/// One page ready for assembly.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Transcribed Markdown; `None` when the page could not be encoded or transcribed.
    pub markdown: Option<String>,
    /// Sink references of the page's pictures, in content-stream order.
    pub pictures: Vec<String>,
}

/// Transcribe pages concurrently, returning results in page order.
async fn transcribe_all(
    provider: &Arc<dyn LLMProvider>,
    pages: Vec<(usize, ImageData)>,
    config: &ConversionConfig,
) -> Vec<PageTranscript> {
    stream::iter(pages.into_iter().map(|(page_num, img)| {
        let provider = Arc::clone(provider);
        let config = config.clone();
        async move {
            let result = llm::transcribe_page(&provider, page_num, img, &config).await;
            if let Some(ref e) = result.error {
                warn!("Page {} failed: {}", page_num, e);
            }
            result
        }
    }))
    .buffered(config.concurrency)
    .collect()
    .await
}

/// Feed every embedded picture to the sink, pages first, then stream order.
///
/// Returns one reference list per page, empty in skip mode.
fn sink_pictures(pages: &[RenderedPage], sink: &mut ImageSink) -> Vec<Vec<String>> {
    if sink.mode().is_skip() {
        return vec![Vec::new(); pages.len()];
    }
    let mut refs = Vec::with_capacity(pages.len());
    for page in pages {
        let mut page_refs = Vec::with_capacity(page.pictures.len());
        for picture in &page.pictures {
            let reference = match png_bytes(picture) {
                Ok(bytes) => sink.process_image(&bytes, "png"),
                Err(e) => {
                    sink.record_error(ImageError::DecodeFailed {
                        index: sink.next_index(),
                        detail: format!("page {}: {}", page.index + 1, e),
                    });
                    String::new()
                }
            };
            page_refs.push(reference);
        }
        refs.push(page_refs);
    }
    refs
}

/// Join page transcripts, putting each page's picture references into that
/// page's placeholders.
///
/// Returns the normalised Markdown and the number of appended references.
pub fn assemble(pages: &[PageContent], skip: bool) -> (String, usize) {
    let mut bodies = Vec::with_capacity(pages.len());
    let mut leftovers: Vec<String> = Vec::new();

    for page in pages {
        let Some(ref markdown) = page.markdown else {
            leftovers.extend(page.pictures.iter().cloned());
            continue;
        };
        let text = strip_markdown_fences(markdown);
        if skip {
            bodies.push(text);
            continue;
        }
        let (filled, rest) = fill_placeholders(&text, &page.pictures);
        bodies.push(RE_LEFTOVER_PLACEHOLDER.replace_all(&filled, "").into_owned());
        leftovers.extend(rest.iter().cloned());
    }

    let body = bodies.join("\n\n");
    if skip {
        return (postprocess::normalize(&strip_images(&body)), 0);
    }
    let unplaced = leftovers.iter().filter(|r| !r.is_empty()).count();
    (postprocess::normalize(&append_unplaced(&body, &leftovers)), unplaced)
}

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}
