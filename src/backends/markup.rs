//! DOCX via HTML: the package is rendered to semantic HTML and converted to
//! Markdown with `htmd`.
//!
//! ## Why go through HTML?
//!
//! The HTML route maps Word styles to the small set of elements an HTML to
//! Markdown converter understands (`h1`–`h6`, `ul`/`ol`, `strong`, `em`,
//! `img`) and lets the converter own escaping and list indentation. Two
//! things do not survive the trip well and are handled around it:
//!
//! - **Tables.** Cell content is rendered straight to a pipe table and a
//!   token paragraph stands in for it during conversion.
//! - **Images.** Pictures are inlined as `data:` URIs, exactly like the
//!   markup exporters this backend stands in for. The Markdown is then run
//!   through base64-inline extraction, which gives every picture its sink
//!   reference in document order.
//!
//! Underline has no HTML element here and is dropped.

use crate::config::ConversionConfig;
use crate::error::{ImageError, Office2MdError};
use crate::model::{Block, Inline, Paragraph, Table};
use crate::ooxml::docx::read_docx;
use crate::ooxml::{Package, PartSource, Relationships};
use crate::pipeline::emphasis::promote_bold_headings;
use crate::pipeline::extract::{extract_base64_inline, extract_relationship_images};
use crate::pipeline::reconcile::{append_unplaced, strip_images};
use crate::pipeline::sink::{normalize_format, ImageSink};
use crate::pipeline::tables::render_pipe_table;
use crate::pipeline::translate::{heading_level, is_list_item, list_level};
use crate::pipeline::postprocess;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::BackendOutput;

const TABLE_TOKEN: &str = "office2mdtable";

static RE_TABLE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?m)^{TABLE_TOKEN}(\d+)$")).unwrap());

// `_text_` emphasis from the converter; our dialect reserves `_` for underline.
static RE_UNDERSCORE_EM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w\\*])_([^_\s](?:[^_\n]*[^_\s\\])?)_([^\w]|$)").unwrap()
});

pub fn convert(
    path: &Path,
    _config: &ConversionConfig,
    sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let mut pkg = Package::open(path)?;
    let content = read_docx(&mut pkg)?;

    let (html, tables) = {
        let images = InlineImages {
            source: &mut pkg,
            rels: &content.rels,
            rids: content.image_rids.iter(),
            sink: &mut *sink,
        };
        let mut writer = HtmlWriter::new(images);
        writer.document(&content.document.blocks);
        writer.finish()
    };
    debug!("Rendered {} bytes of HTML, {} tables", html.len(), tables.len());

    let converted = html_to_markdown(&html)?;
    let md = restore_tables(&converted, &tables);

    let (md, unplaced) = if sink.mode().is_skip() {
        (strip_images(&md), 0)
    } else {
        let md = extract_base64_inline(&md, sink);
        let referenced: HashSet<&str> = content.image_rids.iter().map(String::as_str).collect();
        let loose = Relationships::from_vec(
            content
                .rels
                .images()
                .filter(|r| !referenced.contains(r.id.as_str()))
                .cloned()
                .collect(),
        );
        let extra = extract_relationship_images(&mut pkg, &loose, &[], sink).unreferenced;
        let unplaced = extra.iter().filter(|r| !r.is_empty()).count();
        (append_unplaced(&md, &extra), unplaced)
    };

    let md = italic_with_asterisks(&md);
    let md = promote_bold_headings(&md);
    Ok(BackendOutput::new(postprocess::normalize(&md), unplaced))
}

fn html_to_markdown(html: &str) -> Result<String, Office2MdError> {
    let converter = HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build();
    converter.convert(html).map_err(|e| Office2MdError::BackendFailed {
        backend: "markup".to_string(),
        detail: format!("HTML to Markdown conversion failed: {}", e),
    })
}

fn restore_tables(markdown: &str, tables: &[String]) -> String {
    RE_TABLE_TOKEN
        .replace_all(markdown, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| tables.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn italic_with_asterisks(markdown: &str) -> String {
    let mut current = markdown.to_string();
    loop {
        let next = RE_UNDERSCORE_EM.replace_all(&current, "$1*$2*$3").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

// ── Inline images ────────────────────────────────────────────────────────────

/// Hands out `data:` URIs for the body pictures, in body order.
struct InlineImages<'a, S: PartSource + ?Sized> {
    source: &'a mut S,
    rels: &'a Relationships,
    rids: std::slice::Iter<'a, String>,
    sink: &'a mut ImageSink,
}

impl<S: PartSource + ?Sized> InlineImages<'_, S> {
    fn next_uri(&mut self) -> Option<String> {
        let rid = self.rids.next()?;
        if self.sink.mode().is_skip() {
            return None;
        }
        let target = match self.rels.get(rid) {
            Some(rel) if !rel.external => rel.target.clone(),
            Some(rel) => return self.no_bytes(&rel.target.clone()),
            None => return self.no_bytes(&rid.clone()),
        };
        match self.source.read_part(&target) {
            Ok(bytes) => {
                let ext = Path::new(&target)
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(format!(
                    "data:image/{};base64,{}",
                    mime_subtype(&normalize_format(&ext)),
                    STANDARD.encode(bytes)
                ))
            }
            Err(e) => {
                debug!("Image part {} unreadable: {}", target, e);
                self.no_bytes(&target)
            }
        }
    }

    fn no_bytes(&mut self, target: &str) -> Option<String> {
        self.sink.record_error(ImageError::NoByteSource {
            index: self.sink.next_index(),
            target: target.to_string(),
        });
        None
    }
}

fn mime_subtype(ext: &str) -> &str {
    match ext {
        "jpg" => "jpeg",
        "svg" => "svg+xml",
        other => other,
    }
}

// ── HTML rendering ───────────────────────────────────────────────────────────

struct HtmlWriter<'a, S: PartSource + ?Sized> {
    html: String,
    tables: Vec<String>,
    /// Open list elements, outermost first. Each has an open `<li>`.
    lists: Vec<&'static str>,
    images: InlineImages<'a, S>,
}

impl<'a, S: PartSource + ?Sized> HtmlWriter<'a, S> {
    fn new(images: InlineImages<'a, S>) -> Self {
        Self {
            html: String::new(),
            tables: Vec::new(),
            lists: Vec::new(),
            images,
        }
    }

    fn finish(mut self) -> (String, Vec<String>) {
        self.close_lists(0);
        (self.html, self.tables)
    }

    fn document(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) => self.paragraph(p),
                Block::Table(t) => self.table(t),
            }
        }
    }

    fn paragraph(&mut self, p: &Paragraph) {
        let style = p.style.as_deref().unwrap_or("");

        if let Some(level) = heading_level(style) {
            self.close_lists(0);
            let text = p.plain_text();
            let images: Vec<String> = (0..p.image_count())
                .filter_map(|_| self.images.next_uri())
                .collect();
            if !text.trim().is_empty() {
                self.html
                    .push_str(&format!("<h{level}>{}</h{level}>\n", escape(text.trim())));
            }
            if !images.is_empty() {
                self.html.push_str("<p>");
                for uri in images {
                    self.html.push_str(&img_tag(&uri));
                }
                self.html.push_str("</p>\n");
            }
            return;
        }

        let body = self.inlines(&p.inlines);
        if body.trim().is_empty() {
            return;
        }

        if is_list_item(style, p) {
            let tag = match p.numbering {
                Some(n) if n.ordered => "ol",
                _ => "ul",
            };
            self.list_item(list_level(p) + 1, tag, &body);
            return;
        }

        self.close_lists(0);
        self.html.push_str(&format!("<p>{body}</p>\n"));
    }

    fn list_item(&mut self, depth: usize, tag: &'static str, body: &str) {
        self.close_lists(depth);
        if self.lists.len() == depth {
            if self.lists.last() == Some(&tag) {
                self.html.push_str("</li>\n");
            } else {
                self.close_lists(depth - 1);
            }
        }
        while self.lists.len() < depth {
            self.html.push_str(&format!("<{tag}>\n"));
            self.lists.push(tag);
            if self.lists.len() < depth {
                self.html.push_str("<li>");
            }
        }
        self.html.push_str(&format!("<li>{body}"));
    }

    /// Close lists until at most `depth` remain open.
    fn close_lists(&mut self, depth: usize) {
        while self.lists.len() > depth {
            if let Some(tag) = self.lists.pop() {
                self.html.push_str(&format!("</li>\n</{tag}>\n"));
            }
        }
    }

    fn inlines(&mut self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Run(run) => {
                    let mut text = escape(&run.text);
                    if run.italic && !run.text.trim().is_empty() {
                        text = format!("<em>{text}</em>");
                    }
                    if run.bold && !run.text.trim().is_empty() {
                        text = format!("<strong>{text}</strong>");
                    }
                    out.push_str(&text);
                }
                Inline::Image => {
                    if let Some(uri) = self.images.next_uri() {
                        out.push_str(&img_tag(&uri));
                    }
                }
            }
        }
        out
    }

    fn table(&mut self, table: &Table) {
        self.close_lists(0);
        let mut rows = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                let mut parts: Vec<String> = (0..cell.image_count)
                    .filter_map(|_| self.images.next_uri())
                    .map(|uri| format!("![]({uri})"))
                    .collect();
                if !cell.text.trim().is_empty() {
                    parts.push(cell.text.trim().to_string());
                }
                cells.push(parts.join(" "));
            }
            rows.push(cells);
        }
        let rendered = render_pipe_table(&rows);
        if rendered.is_empty() {
            return;
        }
        self.html
            .push_str(&format!("<p>{TABLE_TOKEN}{}</p>\n", self.tables.len()));
        self.tables.push(rendered);
    }
}

fn img_tag(uri: &str) -> String {
    format!("<img src=\"{uri}\" />")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
