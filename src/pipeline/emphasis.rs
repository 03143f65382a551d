//! Bold-paragraph reclassification for HTML-derived Markdown.
//!
//! Authors often fake section headings with a bold paragraph instead of a
//! heading style. HTML exporters faithfully emit `<p><strong>Overview</strong></p>`,
//! which becomes `**Overview**` on its own line. A line that is nothing but
//! one short bold span is promoted to a level-2 heading when it reads like a
//! title:
//!
//! - shorter than 60 characters
//! - no terminal punctuation (`. , : ; ! ?`)
//! - starts with an uppercase letter, or is shorter than 50 characters
//!
//! Everything else stays inline emphasis, with exactly one space between a
//! bold span and any adjoining non-space character (runs of spaces collapse)
//! so `foo**bar**baz` cannot render as literal asterisks.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BOLD_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*\*([^*\n]+)\*\*$").unwrap());
static RE_BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").unwrap());

const TERMINAL_PUNCTUATION: [char; 6] = ['.', ',', ':', ';', '!', '?'];

/// Promote title-like bold lines to `##` headings and space out inline bold spans.
pub fn promote_bold_headings(markdown: &str) -> String {
    let mut in_fence = false;
    markdown
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                return line.to_string();
            }
            match heading_text(line) {
                Some(text) => format!("## {text}"),
                None => space_inline_bold(line),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The heading text if `line` is a lone bold span that reads like a title.
fn heading_text(line: &str) -> Option<String> {
    let caps = RE_BOLD_LINE.captures(line.trim())?;
    let text = caps[1].trim();
    if text.is_empty() {
        return None;
    }
    let len = text.chars().count();
    let ends_with_punct = text.ends_with(TERMINAL_PUNCTUATION);
    let starts_upper = text.chars().next().is_some_and(char::is_uppercase);
    (len < 60 && !ends_with_punct && (starts_upper || len < 50)).then(|| text.to_string())
}

/// Rebuild `line` so each bold span is separated from any adjoining
/// non-space text by exactly one space. Leading indentation is kept.
fn space_inline_bold(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut last = 0;
    for caps in RE_BOLD_SPAN.captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        let gap = &line[last..m.start()];
        if last == 0 {
            if gap.trim().is_empty() {
                out.push_str(gap);
            } else {
                out.push_str(gap.trim_end());
                out.push(' ');
            }
        } else {
            let gap = gap.trim();
            out.push(' ');
            if !gap.is_empty() {
                out.push_str(gap);
                out.push(' ');
            }
        }
        out.push_str("**");
        out.push_str(caps[1].trim());
        out.push_str("**");
        last = m.end();
    }
    if last == 0 {
        return line.to_string();
    }
    let tail = line[last..].trim_start();
    if !tail.is_empty() {
        out.push(' ');
        out.push_str(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_promoted() {
        assert_eq!(promote_bold_headings("**Overview**"), "## Overview");
    }

    #[test]
    fn lowercase_short_line_promoted() {
        assert_eq!(promote_bold_headings("**key results**"), "## key results");
    }

    #[test]
    fn terminal_punctuation_blocks_promotion() {
        assert_eq!(promote_bold_headings("**Note:**"), "**Note:**");
        assert_eq!(promote_bold_headings("**Done.**"), "**Done.**");
    }

    #[test]
    fn long_line_not_promoted() {
        let long = format!("**{}**", "A".repeat(60));
        assert_eq!(promote_bold_headings(&long), long);
    }

    #[test]
    fn lowercase_between_50_and_60_not_promoted() {
        let text = format!("**{}**", "a".repeat(55));
        assert_eq!(promote_bold_headings(&text), text);
        let upper = format!("**B{}**", "a".repeat(54));
        assert!(promote_bold_headings(&upper).starts_with("## B"));
    }

    #[test]
    fn inline_bold_gets_spaced() {
        assert_eq!(promote_bold_headings("foo**bar**baz"), "foo **bar** baz");
        assert_eq!(promote_bold_headings("a **b** c"), "a **b** c");
        assert_eq!(promote_bold_headings("see **this**."), "see **this** .");
    }

    #[test]
    fn spacing_around_bold_collapses_and_covers_punctuation() {
        assert_eq!(
            promote_bold_headings("a  **b**  c and (**d**) x"),
            "a **b** c and ( **d** ) x"
        );
        assert_eq!(promote_bold_headings("**a****b**"), "**a** **b**");
    }

    #[test]
    fn indentation_and_plain_lines_kept() {
        assert_eq!(promote_bold_headings("  **b** x"), "  **b** x");
        assert_eq!(promote_bold_headings("- **Item** one"), "- **Item** one");
        assert_eq!(promote_bold_headings("no  bold   here"), "no  bold   here");
    }

    #[test]
    fn bold_line_inside_code_fence_untouched() {
        let md = "```\n**Overview**\n```";
        assert_eq!(promote_bold_headings(md), md);
    }

    #[test]
    fn multi_line_document() {
        let md = "**Introduction**\n\nBody text with**inline**bold.";
        assert_eq!(
            promote_bold_headings(md),
            "## Introduction\n\nBody text with **inline** bold."
        );
    }
}
