//! Structural translation: document tree → Markdown.
//!
//! Walks [`Document`] blocks in order, keeping just enough state to emit
//! contiguous lists and to hand out image references in the order the
//! pictures occur. Output is raw; the normaliser runs afterwards.
//!
//! ## Inline formatting
//!
//! Word splits text into runs wherever *anything* changes (spell-check
//! state, revision ids, fonts), so adjacent runs very often share the same
//! bold/italic/underline flags. Emitting markers per run would give
//! `**a****b**`. Instead markers are only closed or opened when the effective
//! formatting changes between runs, so `[bold "a", bold "b", plain "c"]`
//! becomes `**ab**c`. Leading and trailing whitespace is kept outside the
//! markers, because `** bold**` does not render as emphasis.

use crate::model::{Block, Cell, Document, Inline, Paragraph, Run, Table};
use crate::pipeline::reconcile::{append_unplaced, ReferenceCursor};
use crate::pipeline::tables::render_pipe_table;

/// Twips per indentation step in Word's default list definitions.
const TWIPS_PER_LEVEL: i64 = 720;
const MAX_HEADING_LEVEL: usize = 6;

/// Translated Markdown plus image placement counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub markdown: String,
    pub placed: usize,
    pub unplaced: usize,
}

/// Translate `doc`, consuming `refs` in document order.
///
/// References beyond the document's image slots are appended after the
/// additional-images marker.
pub fn translate(doc: &Document, refs: &[String]) -> Translation {
    let mut t = Translator {
        cursor: ReferenceCursor::new(refs),
        out: String::new(),
        in_list: false,
    };
    for block in &doc.blocks {
        match block {
            Block::Paragraph(p) => t.paragraph(p),
            Block::Table(table) => t.table(table),
        }
    }
    t.end_list();

    let placed = t.cursor.consumed();
    let remaining = t.cursor.remaining();
    Translation {
        markdown: append_unplaced(&t.out, remaining),
        placed,
        unplaced: remaining.iter().filter(|r| !r.is_empty()).count(),
    }
}

struct Translator<'r> {
    cursor: ReferenceCursor<'r>,
    out: String,
    in_list: bool,
}

impl Translator<'_> {
    fn paragraph(&mut self, p: &Paragraph) {
        let style = p.style.as_deref().unwrap_or("");

        if let Some(level) = heading_level(style) {
            self.end_list();
            let text = p.plain_text();
            let text = text.trim();
            let images = self.take_refs(p.image_count());
            if !text.is_empty() {
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.out.push_str(text);
                self.out.push_str("\n\n");
            }
            if !images.is_empty() {
                self.out.push_str(&images.join(" "));
                self.out.push_str("\n\n");
            }
            return;
        }

        let body = render_inlines(&p.inlines, &mut self.cursor);
        let body = body.trim();

        if is_list_item(style, p) {
            if body.is_empty() {
                return;
            }
            let level = list_level(p);
            let marker = match p.numbering {
                Some(n) if n.ordered => "1. ",
                _ => "- ",
            };
            self.in_list = true;
            self.out.push_str(&"  ".repeat(level));
            self.out.push_str(marker);
            self.out.push_str(body);
            self.out.push('\n');
            return;
        }

        self.end_list();
        if body.is_empty() {
            return;
        }
        self.out.push_str(body);
        self.out.push_str("\n\n");
    }

    fn table(&mut self, table: &Table) {
        self.end_list();
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let cells = row.iter().map(|cell| self.cell(cell)).collect();
            rows.push(cells);
        }
        let rendered = render_pipe_table(&rows);
        if rendered.is_empty() {
            return;
        }
        self.out.push_str(&rendered);
        self.out.push_str("\n\n");
    }

    fn cell(&mut self, cell: &Cell) -> String {
        let mut parts = self.take_refs(cell.image_count);
        let text = cell.text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        parts.join(" ")
    }

    /// Next `n` references, dropping empty ones (failed images).
    fn take_refs(&mut self, n: usize) -> Vec<String> {
        (0..n)
            .filter_map(|_| self.cursor.next_ref())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn end_list(&mut self) {
        if self.in_list {
            self.out.push('\n');
            self.in_list = false;
        }
    }
}

/// Heading level for a paragraph style name, if it is a heading style.
///
/// Recognises `Heading N`, `Título N`, `Title`/`Título` (level 1) and
/// `Subtitle`/`Subtítulo` (level 2), case-insensitively. An unreadable
/// level suffix means level 1; levels are capped at 6.
pub fn heading_level(style: &str) -> Option<usize> {
    let s = style.trim().to_lowercase();
    match s.as_str() {
        "title" | "título" | "titulo" => return Some(1),
        "subtitle" | "subtítulo" | "subtitulo" => return Some(2),
        _ => {}
    }
    let rest = ["heading", "título", "titulo"]
        .iter()
        .find_map(|prefix| s.strip_prefix(prefix))?;
    let digits: String = rest.trim().chars().take_while(char::is_ascii_digit).collect();
    let level = digits.parse::<usize>().unwrap_or(1);
    Some(level.clamp(1, MAX_HEADING_LEVEL))
}

/// A paragraph is a list item when it has numbering or a list style.
pub(crate) fn is_list_item(style: &str, p: &Paragraph) -> bool {
    p.numbering.is_some() || style.to_lowercase().contains("list")
}

/// Nesting depth: from the left indent when known, else the numbering level.
pub(crate) fn list_level(p: &Paragraph) -> usize {
    match p.left_indent {
        Some(twips) => (twips.max(0) / TWIPS_PER_LEVEL).saturating_sub(1) as usize,
        None => p.numbering.map_or(0, |n| n.level as usize),
    }
}

// ── Inline runs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Bold,
    Italic,
    Underline,
}

impl Marker {
    fn token(self) -> &'static str {
        match self {
            Marker::Bold => "**",
            Marker::Italic => "*",
            Marker::Underline => "_",
        }
    }

    fn wanted_by(self, run: &Run) -> bool {
        match self {
            Marker::Bold => run.bold,
            Marker::Italic => run.italic,
            Marker::Underline => run.underline,
        }
    }
}

const MARKER_ORDER: [Marker; 3] = [Marker::Bold, Marker::Italic, Marker::Underline];

/// Render runs and inline images with transition-based emphasis markers.
pub fn render_inlines(inlines: &[Inline], cursor: &mut ReferenceCursor<'_>) -> String {
    let mut out = String::new();
    let mut open: Vec<Marker> = Vec::new();
    let mut pending_ws = String::new();
    let plain = Run::default();

    for inline in inlines {
        match inline {
            Inline::Run(run) => {
                let core = run.text.trim();
                if core.is_empty() {
                    pending_ws.push_str(&run.text);
                    continue;
                }
                let lead = run.text.len() - run.text.trim_start().len();
                pending_ws.push_str(&run.text[..lead]);
                transition(&mut out, &mut open, &mut pending_ws, run);
                out.push_str(core);
                pending_ws.push_str(&run.text[lead + core.len()..]);
            }
            Inline::Image => {
                if let Some(r) = cursor.next_ref().filter(|r| !r.is_empty()) {
                    transition(&mut out, &mut open, &mut pending_ws, &plain);
                    out.push_str(r);
                }
            }
        }
    }

    while let Some(m) = open.pop() {
        out.push_str(m.token());
    }
    out
}

/// Close markers the next run no longer wants, flush whitespace outside
/// them, then open the markers it newly wants.
fn transition(out: &mut String, open: &mut Vec<Marker>, pending_ws: &mut String, run: &Run) {
    // Closing a marker closes everything opened after it as well.
    if let Some(first_unwanted) = open.iter().position(|m| !m.wanted_by(run)) {
        while open.len() > first_unwanted {
            if let Some(m) = open.pop() {
                out.push_str(m.token());
            }
        }
    }
    out.push_str(pending_ws);
    pending_ws.clear();
    for m in MARKER_ORDER {
        if m.wanted_by(run) && !open.contains(&m) {
            out.push_str(m.token());
            open.push(m);
        }
    }
}
