//! Pipe-table rendering and HTML-table rescue.
//!
//! Every backend ends up describing a table as rows of cell strings; this
//! module is the single place that turns those into GFM pipe tables, so
//! column padding and escaping behave the same for DOCX, XLSX and PPTX.
//!
//! pandoc falls back to raw HTML `<table>` markup when a table has merged or
//! multi-paragraph cells. [`html_tables_to_pipe`] converts those blocks back
//! to pipe tables, keeping cell images as Markdown image references.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Render rows as a pipe table. Row 0 is always treated as the header.
///
/// Rows are padded to the widest row; cell text has `|` escaped and all
/// whitespace runs (including newlines) collapsed to one space.
pub fn render_pipe_table(rows: &[Vec<String>]) -> String {
    let max_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    if max_cols == 0 {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..max_cols)
            .map(|c| row.get(c).map(|s| clean_cell(s)).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("| {} |", vec!["---"; max_cols].join(" | ")));
        }
    }
    lines.join("\n")
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn clean_cell(text: &str) -> String {
    let collapsed = RE_WHITESPACE.replace_all(text.trim(), " ");
    collapsed.replace('|', "\\|")
}

// ── HTML tables ──────────────────────────────────────────────────────────────

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t([hd])\b([^>]*)>(.*?)</t[hd]\s*>").unwrap());
static RE_COLSPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)colspan\s*=\s*"?(\d+)"?"#).unwrap());
static RE_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*"([^"]*)"[^>]*>"#).unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Replace every HTML `<table>` block in `markdown` with a pipe table.
///
/// Runs of lines holding table fragments without a `<table>` wrapper
/// (`<thead>`, `<tr>`, `<td>` …) are converted as one table as well.
pub fn html_tables_to_pipe(markdown: &str) -> String {
    let converted = RE_TABLE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let rows = parse_rows(&caps[1]);
            if rows.is_empty() {
                return String::new();
            }
            format!("\n\n{}\n\n", render_pipe_table(&rows))
        })
        .into_owned();
    if RE_TABLE_FRAGMENT.is_match(&converted) {
        orphaned_fragments_to_pipe(&converted)
    } else {
        converted
    }
}

static RE_TABLE_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:colgroup|thead|tbody|tr|td|th)\b").unwrap());

fn orphaned_fragments_to_pipe(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut fragment = String::new();

    let flush = |fragment: &mut String, out: &mut Vec<String>| {
        if fragment.is_empty() {
            return;
        }
        let rows = parse_rows(fragment);
        if !rows.is_empty() {
            out.push(String::new());
            out.push(render_pipe_table(&rows));
            out.push(String::new());
        }
        fragment.clear();
    };

    for line in markdown.lines() {
        if RE_TABLE_FRAGMENT.is_match(line) {
            fragment.push_str(line);
            fragment.push('\n');
        } else {
            flush(&mut fragment, &mut out);
            out.push(line.to_string());
        }
    }
    flush(&mut fragment, &mut out);
    out.join("\n")
}

fn parse_rows(table_html: &str) -> Vec<Vec<String>> {
    RE_ROW
        .captures_iter(table_html)
        .map(|row| {
            let mut cells = Vec::new();
            for cell in RE_CELL.captures_iter(&row[1]) {
                cells.push(cell_text(&cell[3]));
                let span = RE_COLSPAN
                    .captures(&cell[2])
                    .and_then(|c| c[1].parse::<usize>().ok())
                    .unwrap_or(1);
                for _ in 1..span {
                    cells.push(String::new());
                }
            }
            cells
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

fn cell_text(html: &str) -> String {
    let s = RE_IMG.replace_all(html, "![image]($1)");
    let s = RE_BR.replace_all(&s, " ");
    let s = RE_TAG.replace_all(&s, " ");
    let s = decode_entities(&s);
    RE_WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
