//! Placeholder reconciliation: put ordered image references where the
//! upstream converter left an image placeholder.
//!
//! Converters mark "an image was here" in several dialects:
//!
//! | Placeholder      | Typical source            |
//! |------------------|---------------------------|
//! | `<!-- image -->` | layout parsers, VLM output |
//! | `[image]`, `[image3]` | plain-text exporters |
//! | `{image}`, `{image3}` | template exporters   |
//! | `![]()`          | converters that lost the target |
//!
//! All dialects are matched by one combined pattern in a single
//! left-to-right scan, so references are consumed in document order even
//! when a document mixes dialects. References left over once the text is
//! exhausted are appended under [`ADDITIONAL_IMAGES_MARKER`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Heading comment that introduces images no placeholder claimed.
pub const ADDITIONAL_IMAGES_MARKER: &str = "<!-- Additional extracted images -->";

// The bracket alternative also swallows a leading `!` and a trailing
// `(…)` so that real image/link syntax can be recognised and left alone.
static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<!--\s*(?i:image)\s*-->|(!?)\[image\d*\](\([^)]*\))?|\{image\d*\}|!\[\]\(\s*\)",
    )
    .unwrap()
});

// Alt text may hold escaped brackets (`\[1\]`) and one level of nesting.
static RE_IMAGE_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[(?:\\.|\[[^\]\\]*\]|[^\]\\])*\]\([^)]*\)").unwrap()
});

/// Hands out references in order, one per placeholder.
#[derive(Debug)]
pub struct ReferenceCursor<'r> {
    refs: &'r [String],
    pos: usize,
}

impl<'r> ReferenceCursor<'r> {
    pub fn new(refs: &'r [String]) -> Self {
        Self { refs, pos: 0 }
    }

    /// Next reference, or `None` once all are consumed.
    pub fn next_ref(&mut self) -> Option<&'r str> {
        let r = self.refs.get(self.pos)?;
        self.pos += 1;
        Some(r.as_str())
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// References nobody asked for.
    pub fn remaining(&self) -> &'r [String] {
        &self.refs[self.pos..]
    }
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub text: String,
    /// References substituted into placeholders.
    pub placed: usize,
    /// Non-empty references appended after the marker.
    pub unplaced: usize,
}

/// Replace each placeholder in `text` with the next reference.
///
/// Once references run out, remaining placeholders are left verbatim.
/// An empty reference (a dropped image) still consumes its placeholder,
/// which is then removed.
pub fn reconcile(text: &str, refs: &[String]) -> Reconciled {
    let (replaced, remaining) = fill_placeholders(text, refs);
    let unplaced = remaining.iter().filter(|r| !r.is_empty()).count();
    Reconciled {
        text: append_unplaced(&replaced, remaining),
        placed: refs.len() - remaining.len(),
        unplaced,
    }
}

/// Substitute references into placeholders without appending leftovers.
///
/// Returns the text and the references no placeholder claimed, so callers
/// that reconcile a document piecewise can append them once at the end.
pub fn fill_placeholders<'r>(text: &str, refs: &'r [String]) -> (String, &'r [String]) {
    let mut cursor = ReferenceCursor::new(refs);
    let replaced = RE_PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            if is_real_image_or_link(caps) {
                return whole.to_string();
            }
            match cursor.next_ref() {
                Some(r) => r.to_string(),
                None => whole.to_string(),
            }
        })
        .into_owned();
    (replaced, cursor.remaining())
}

/// `[image](x)` and `![image]` are ordinary Markdown, not placeholders.
fn is_real_image_or_link(caps: &Captures<'_>) -> bool {
    let bang = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
    let target = caps.get(2).is_some();
    bang || target
}

/// Append leftover references after [`ADDITIONAL_IMAGES_MARKER`].
///
/// Empty references are skipped; nothing is appended when all are empty.
pub fn append_unplaced(text: &str, refs: &[String]) -> String {
    let live: Vec<&str> = refs
        .iter()
        .map(String::as_str)
        .filter(|r| !r.is_empty())
        .collect();
    if live.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 64 + live.iter().map(|r| r.len() + 2).sum::<usize>());
    out.push_str(text.trim_end());
    out.push_str("\n\n");
    out.push_str(ADDITIONAL_IMAGES_MARKER);
    out.push('\n');
    for r in live {
        out.push('\n');
        out.push_str(r);
        out.push('\n');
    }
    out
}

/// Remove every image reference and placeholder (skip mode).
pub fn strip_images(text: &str) -> String {
    let without_refs = RE_IMAGE_SYNTAX.replace_all(text, "");
    RE_PLACEHOLDER
        .replace_all(&without_refs, |caps: &Captures<'_>| {
            // Bracket text followed by a target is a link; keep it.
            if caps.get(2).is_some() {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
