//! Output normalisation: deterministic cleanup of converter-generated Markdown.
//!
//! ## Why is normalisation necessary?
//!
//! Every backend leaks its own artefacts into the Markdown it produces:
//!
//! - pandoc attaches attribute blocks such as `{width="3in" height="2in"}`
//!   and `{#anchor .class}` to images and headings
//! - HTML tables converted to pipe tables leave `<colgroup>`, `<col>`,
//!   `<thead>` and `<tbody>` fragments behind
//! - adjacent bold runs produce `****` where one run closes and the next opens
//! - punctuation is backslash-escaped (`\.`, `\(`) far more often than needed
//!
//! This module applies six cheap regex passes that remove those artefacts
//! without touching content. Each pass only ever deletes text, so the
//! sequence is re-run until nothing changes and the result is idempotent:
//! `normalize(normalize(x)) == normalize(x)`.
//!
//! ## Pass Order
//!
//! Repair bold markers before anything else looks at `*`; strip attribute
//! blocks and table tags before collapsing blank lines, since removing them
//! often leaves lines empty; trim trailing whitespace last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation passes until a fixpoint is reached.
///
/// Passes (applied in order):
/// 1. Repair runs of four or more `*` into `**`
/// 2. Strip `{width=…}`, `{height=…}`, `{style=…}` and `{#id .class}` attribute blocks
/// 3. Remove `<colgroup>`, `<col>`, `<thead>`, `<tbody>` tags and their closers
/// 4. Un-escape over-escaped punctuation (`\.` `\(` `\)` `\,` `\:` `\;` `\!` `\?`)
/// 5. Collapse three or more consecutive newlines (blank = whitespace-only) to two
/// 6. Strip trailing whitespace from every line and from the document end
pub fn normalize(input: &str) -> String {
    let mut current = normalise_line_endings(input);
    loop {
        let next = run_passes(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn run_passes(input: &str) -> String {
    let s = repair_bold_markers(input);
    let s = strip_attribute_blocks(&s);
    let s = strip_table_tags(&s);
    let s = unescape_punctuation(&s);
    let s = collapse_blank_lines(&s);
    trim_trailing_whitespace(&s)
}

// ── Prelude: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Pass 1: Repair broken bold markers ───────────────────────────────────────

static RE_STAR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{4,}").unwrap());

fn repair_bold_markers(input: &str) -> String {
    RE_STAR_RUN.replace_all(input, "**").into_owned()
}

// ── Pass 2: Strip attribute blocks ───────────────────────────────────────────

static RE_ATTR_BLOCKS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r#"\{width="[^"]*"(\s*height="[^"]*")?\}"#).unwrap(),
        Regex::new(r#"\{height="[^"]*"\}"#).unwrap(),
        Regex::new(r#"\{style="[^"]*"\}"#).unwrap(),
        Regex::new(r"\{[#.][^}]*\}").unwrap(),
    ]
});

fn strip_attribute_blocks(input: &str) -> String {
    RE_ATTR_BLOCKS
        .iter()
        .fold(input.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

// ── Pass 3: Remove HTML table fragments ──────────────────────────────────────

static RE_TABLE_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?colgroup\b[^>]*>|</?col\b[^>]*>|</?thead\b[^>]*>|</?tbody\b[^>]*>").unwrap()
});

fn strip_table_tags(input: &str) -> String {
    RE_TABLE_TAGS.replace_all(input, "").into_owned()
}

// ── Pass 4: Un-escape punctuation ────────────────────────────────────────────

// Only a backslash that is not itself escaped: `a\\.` is a literal
// backslash followed by a full stop and stays as written.
static RE_ESCAPED_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\\])((?:\\\\)*)\\([.(),:;!?])").unwrap());

fn unescape_punctuation(input: &str) -> String {
    RE_ESCAPED_PUNCT.replace_all(input, "${1}${2}${3}").into_owned()
}

// ── Pass 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Pass 6: Trim trailing whitespace ─────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

// ── Assembly helper ──────────────────────────────────────────────────────────

/// Ensure the document ends with exactly one newline.
pub fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_bold_markers() {
        assert_eq!(normalize("****bold****"), "**bold**");
        assert_eq!(normalize("a ******b"), "a **b");
    }

    #[test]
    fn test_strip_attribute_blocks() {
        let input = r#"![](./a/image_1.png){width="3in" height="2in"} and {height="1in"}{style="x"}"#;
        assert_eq!(normalize(input), "![](./a/image_1.png) and");
        assert_eq!(normalize("# Title {#intro .unnumbered}"), "# Title");
    }

    #[test]
    fn test_strip_table_tags() {
        let input = "<colgroup>\n<col style=\"width: 50%\" />\n</colgroup>\n<thead>\n| A |\n</thead>\n<tbody>\n</tbody>";
        assert_eq!(normalize(input).trim_start(), "| A |");
    }

    #[test]
    fn test_unescape_punctuation() {
        assert_eq!(normalize(r"End\. Call\(x\)\, then\: go\; wow\! why\?"), "End. Call(x), then: go; wow! why?");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\n  \n\t\n \nb"), "a\n\nb");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trailing_whitespace() {
        assert_eq!(normalize("hello   \nworld  \n\n"), "hello\nworld");
    }

    #[test]
    fn test_crlf() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_idempotent_on_messy_input() {
        let inputs = [
            "****x****\n\n\n\n<col>\n\n\n{#a}\n\\.",
            "| a |\n<tbody>\n \n \n \n| b |   ",
            "**a******b**  \n\n\n",
            "\\\\.",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_escaped_backslash_not_unescaped() {
        assert_eq!(normalize(r"a\\."), r"a\\.");
        assert_eq!(normalize(r"path C:\\dir\\(x)"), r"path C:\\dir\\(x)");
        assert_eq!(normalize(r"a\\\."), r"a\\.");
        assert_eq!(normalize(r"\.\.\. done\!"), "... done!");
        let once = normalize(r"a\\.");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_content_preserved() {
        let input = "# Heading\n\nSome *italic* and **bold** text.\n\n| A | B |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }
}
