//! Intermediate document tree produced by the OOXML readers.
//!
//! Deliberately small: only what the Markdown dialect can express survives
//! parsing. Styles are carried as resolved display names (`"Heading 2"`,
//! `"List Bullet"`), not style ids.

/// An ordered sequence of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    /// Resolved style name, if the paragraph has one.
    pub style: Option<String>,
    pub inlines: Vec<Inline>,
    pub numbering: Option<Numbering>,
    /// Left indentation in twips (1/1440 inch).
    pub left_indent: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    /// An embedded picture; its reference is supplied in document order.
    Image,
}

/// A span of text sharing one set of character formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// List membership of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numbering {
    /// Numbered (`1.`) rather than bulleted (`-`).
    pub ordered: bool,
    /// Zero-based nesting level.
    pub level: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    /// Pictures inside the cell, consumed before the cell text.
    pub image_count: usize,
}

impl Paragraph {
    /// Concatenated run text without formatting.
    pub fn plain_text(&self) -> String {
        self.inlines
            .iter()
            .filter_map(|i| match i {
                Inline::Run(r) => Some(r.text.as_str()),
                Inline::Image => None,
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.inlines
            .iter()
            .filter(|i| matches!(i, Inline::Image))
            .count()
    }
}

impl Document {
    /// Number of image slots in document order (paragraph images and cell images).
    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph(p) => p.image_count(),
                Block::Table(t) => t.rows.iter().flatten().map(|c| c.image_count).sum(),
            })
            .sum()
    }
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            ..Default::default()
        }
    }
}
