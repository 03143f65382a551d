//! WordprocessingML reader: `word/document.xml` → [`Document`].
//!
//! A single streaming pass over the body with quick-xml. Only what the
//! Markdown dialect can express is kept: paragraph style, numbering and
//! indentation; run text with bold/italic/underline; picture positions;
//! tables with their cell text.
//!
//! Pictures are recorded twice: as an [`Inline::Image`] slot in the tree and
//! as the relationship id that carries the bytes, in the same order. The
//! relationship-part extraction strategy turns the ids into references and
//! the translator fills the slots with them.
//!
//! ## Shapes the reader flattens
//!
//! - Tables nested in a table cell contribute their text to the outer cell.
//! - Text boxes (a `w:p` inside a `w:p`) merge into the host paragraph.
//! - `mc:Fallback` branches are skipped; the `mc:Choice` branch already
//!   carries the same drawing.

use crate::error::Office2MdError;
use crate::model::{Block, Cell, Document, Inline, Numbering, Paragraph, Run, Table};
use crate::ooxml::{
    attr, local_name, prefixed_attr, resolve_entity, toggle_on, Package, Relationships,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use tracing::debug;

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// Everything the DOCX backends need from the package.
#[derive(Debug, Default)]
pub struct DocxContent {
    pub document: Document,
    /// Relationship ids of the body pictures, in document order.
    pub image_rids: Vec<String>,
    /// Relationships of the main document part.
    pub rels: Relationships,
}

/// Read the main document part with its styles and numbering definitions.
pub fn read_docx<R: Read + Seek>(pkg: &mut Package<R>) -> Result<DocxContent, Office2MdError> {
    let main_part = pkg
        .relationships_for("")?
        .first_of_type("officeDocument")
        .map(|r| r.target.clone())
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());

    let rels = pkg.relationships_for(&main_part)?;

    let styles = match rels.first_of_type("styles") {
        Some(rel) => match pkg.read_optional_xml(&rel.target)? {
            Some(xml) => parse_styles(&xml, &rel.target)?,
            None => StyleMap::default(),
        },
        None => StyleMap::default(),
    };
    let numbering = match rels.first_of_type("numbering") {
        Some(rel) => match pkg.read_optional_xml(&rel.target)? {
            Some(xml) => parse_numbering(&xml, &rel.target)?,
            None => NumberingMap::default(),
        },
        None => NumberingMap::default(),
    };

    let xml = pkg.read_xml(&main_part)?;
    let (document, image_rids) = parse_document(&xml, &main_part, &styles, &numbering)?;
    debug!(
        "Parsed {}: {} blocks, {} pictures",
        main_part,
        document.blocks.len(),
        image_rids.len()
    );

    Ok(DocxContent {
        document,
        image_rids,
        rels,
    })
}

// ── styles.xml ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: Option<String>,
    num_id: Option<String>,
    ilvl: Option<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct StyleMap {
    styles: HashMap<String, StyleDef>,
}

impl StyleMap {
    /// Display name for a style id, falling back to the id itself.
    fn display_name(&self, id: &str) -> String {
        self.styles
            .get(id)
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

pub(crate) fn parse_styles(xml: &str, part: &str) -> Result<StyleMap, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut map = StyleMap::default();
    let mut current: Option<(String, StyleDef)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"style" => {
                        if let Some(id) = attr(&e, b"styleId") {
                            current = Some((id, StyleDef::default()));
                        }
                    }
                    b"name" => {
                        if let Some((_, ref mut def)) = current {
                            def.name = attr(&e, b"val");
                        }
                    }
                    b"numId" => {
                        if let Some((_, ref mut def)) = current {
                            def.num_id = attr(&e, b"val");
                        }
                    }
                    b"ilvl" => {
                        if let Some((_, ref mut def)) = current {
                            def.ilvl = attr(&e, b"val").and_then(|v| v.parse().ok());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) if local_name(e.name().as_ref()) == b"style" => {
                if let Some((id, def)) = current.take() {
                    map.styles.insert(id, def);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }
    Ok(map)
}

// ── numbering.xml ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct NumberingMap {
    /// abstractNumId → ilvl → is ordered
    abstract_levels: HashMap<String, HashMap<u32, bool>>,
    /// numId → abstractNumId
    nums: HashMap<String, String>,
}

impl NumberingMap {
    /// Whether level `ilvl` of list `num_id` is numbered. Unknown lists are bullets.
    fn is_ordered(&self, num_id: &str, ilvl: u32) -> bool {
        self.nums
            .get(num_id)
            .and_then(|abs| self.abstract_levels.get(abs))
            .and_then(|levels| levels.get(&ilvl))
            .copied()
            .unwrap_or(false)
    }
}

pub(crate) fn parse_numbering(xml: &str, part: &str) -> Result<NumberingMap, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut map = NumberingMap::default();
    let mut current_abstract: Option<String> = None;
    let mut current_level: Option<u32> = None;
    let mut current_num: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"abstractNum" => current_abstract = attr(&e, b"abstractNumId"),
                    b"lvl" => current_level = attr(&e, b"ilvl").and_then(|v| v.parse().ok()),
                    b"numFmt" => {
                        if let (Some(abs), Some(lvl)) = (&current_abstract, current_level) {
                            let fmt = attr(&e, b"val").unwrap_or_default();
                            let ordered = !matches!(fmt.as_str(), "bullet" | "none" | "");
                            map.abstract_levels
                                .entry(abs.clone())
                                .or_default()
                                .insert(lvl, ordered);
                        }
                    }
                    b"num" => current_num = attr(&e, b"numId"),
                    b"abstractNumId" => {
                        if let (Some(num), Some(abs)) = (&current_num, attr(&e, b"val")) {
                            map.nums.insert(num.clone(), abs);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"abstractNum" => current_abstract = None,
                b"lvl" => current_level = None,
                b"num" => current_num = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }
    Ok(map)
}

// ── document.xml ─────────────────────────────────────────────────────────────

/// Paragraph under construction.
#[derive(Default)]
struct ParagraphBuilder {
    style_id: Option<String>,
    num_id: Option<String>,
    ilvl: Option<u32>,
    left_indent: Option<i64>,
    inlines: Vec<Inline>,
}

impl ParagraphBuilder {
    fn push_text(&mut self, run: &Run, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::Run(last)) = self.inlines.last_mut() {
            if last.bold == run.bold && last.italic == run.italic && last.underline == run.underline
            {
                last.text.push_str(text);
                return;
            }
        }
        self.inlines.push(Inline::Run(Run {
            text: text.to_string(),
            ..run.clone()
        }));
    }

    fn finish(self, styles: &StyleMap, numbering: &NumberingMap) -> Paragraph {
        let style_def = self.style_id.as_ref().and_then(|id| styles.styles.get(id));
        let num_id = self
            .num_id
            .or_else(|| style_def.and_then(|d| d.num_id.clone()))
            .filter(|id| id != "0");
        let ilvl = self
            .ilvl
            .or_else(|| style_def.and_then(|d| d.ilvl))
            .unwrap_or(0);

        Paragraph {
            style: self.style_id.as_deref().map(|id| styles.display_name(id)),
            numbering: num_id.map(|id| Numbering {
                ordered: numbering.is_ordered(&id, ilvl),
                level: ilvl,
            }),
            left_indent: self.left_indent,
            inlines: self.inlines,
        }
    }
}

struct BodyParser<'a> {
    styles: &'a StyleMap,
    numbering: &'a NumberingMap,
    blocks: Vec<Block>,
    image_rids: Vec<String>,

    para: Option<ParagraphBuilder>,
    /// `w:p` elements open inside the current paragraph (text boxes).
    nested_paras: usize,
    run: Run,
    in_run: bool,
    in_ppr: bool,
    in_rpr: bool,
    in_text: bool,

    tbl_depth: usize,
    table: Option<Table>,
    row: Vec<Cell>,
    cell: Option<Cell>,
    cell_span: usize,

    /// Depth inside an `mc:Fallback` subtree being skipped.
    skip_depth: usize,
}

impl<'a> BodyParser<'a> {
    fn new(styles: &'a StyleMap, numbering: &'a NumberingMap) -> Self {
        Self {
            styles,
            numbering,
            blocks: Vec::new(),
            image_rids: Vec::new(),
            para: None,
            nested_paras: 0,
            run: Run::default(),
            in_run: false,
            in_ppr: false,
            in_rpr: false,
            in_text: false,
            tbl_depth: 0,
            table: None,
            row: Vec::new(),
            cell: None,
            cell_span: 1,
            skip_depth: 0,
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = e.name();
        let local = local_name(name.as_ref());

        match local {
            b"tbl" if !empty => {
                self.tbl_depth += 1;
                if self.tbl_depth == 1 {
                    self.table = Some(Table::default());
                }
            }
            b"tr" if self.tbl_depth == 1 && !empty => self.row = Vec::new(),
            b"tc" if self.tbl_depth == 1 && !empty => {
                self.cell = Some(Cell::default());
                self.cell_span = 1;
            }
            b"gridSpan" if self.tbl_depth == 1 => {
                self.cell_span = attr(e, b"val")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1)
                    .max(1);
            }
            b"p" if !empty => {
                if self.para.is_some() {
                    self.nested_paras += 1;
                } else {
                    self.para = Some(ParagraphBuilder::default());
                }
            }
            b"pPr" if !empty => self.in_ppr = true,
            b"pStyle" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.style_id = attr(e, b"val");
                }
            }
            b"numId" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.num_id = attr(e, b"val");
                }
            }
            b"ilvl" if self.in_ppr => {
                if let Some(p) = self.para.as_mut() {
                    p.ilvl = attr(e, b"val").and_then(|v| v.parse().ok());
                }
            }
            b"ind" if self.in_ppr && !self.in_rpr => {
                if let Some(p) = self.para.as_mut() {
                    p.left_indent = attr(e, b"left")
                        .or_else(|| attr(e, b"start"))
                        .and_then(|v| v.parse().ok());
                }
            }
            b"r" if !empty => {
                self.in_run = true;
                self.run = Run::default();
            }
            b"rPr" if !empty => self.in_rpr = true,
            b"b" if self.in_rpr && !self.in_ppr => self.run.bold = toggle_on(e),
            b"i" if self.in_rpr && !self.in_ppr => self.run.italic = toggle_on(e),
            b"u" if self.in_rpr && !self.in_ppr => self.run.underline = toggle_on(e),
            b"t" if self.in_run && !empty => self.in_text = true,
            b"tab" | b"br" | b"cr" if self.in_run && !self.in_ppr => self.text(" "),
            b"blip" => {
                if let Some(rid) = attr(e, b"embed") {
                    self.image(rid);
                }
            }
            b"imagedata" => {
                if let Some(rid) = prefixed_attr(e, b"id") {
                    self.image(rid);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"tbl" => {
                if self.tbl_depth == 1 {
                    if let Some(table) = self.table.take() {
                        if !table.rows.is_empty() {
                            self.blocks.push(Block::Table(table));
                        }
                    }
                }
                self.tbl_depth = self.tbl_depth.saturating_sub(1);
            }
            b"tr" if self.tbl_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                if let Some(table) = self.table.as_mut() {
                    table.rows.push(row);
                }
            }
            b"tc" if self.tbl_depth == 1 => {
                if let Some(cell) = self.cell.take() {
                    self.row.push(cell);
                    for _ in 1..self.cell_span {
                        self.row.push(Cell::default());
                    }
                }
            }
            b"p" => {
                if self.nested_paras > 0 {
                    self.nested_paras -= 1;
                    self.text(" ");
                } else if let Some(p) = self.para.take() {
                    self.finish_paragraph(p);
                }
            }
            b"pPr" => self.in_ppr = false,
            b"r" => self.in_run = false,
            b"rPr" => self.in_rpr = false,
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(p) = self.para.as_mut() {
            p.push_text(&self.run, text);
        }
    }

    fn image(&mut self, rid: String) {
        if let Some(p) = self.para.as_mut() {
            p.inlines.push(Inline::Image);
            self.image_rids.push(rid);
        }
    }

    fn finish_paragraph(&mut self, builder: ParagraphBuilder) {
        let para = builder.finish(self.styles, self.numbering);
        if self.tbl_depth > 0 {
            if let Some(cell) = self.cell.as_mut() {
                let text = para.plain_text();
                let text = text.trim();
                if !text.is_empty() {
                    if !cell.text.is_empty() {
                        cell.text.push('\n');
                    }
                    cell.text.push_str(text);
                }
                cell.image_count += para.image_count();
            }
            return;
        }
        self.blocks.push(Block::Paragraph(para));
    }
}

pub(crate) fn parse_document(
    xml: &str,
    part: &str,
    styles: &StyleMap,
    numbering: &NumberingMap,
) -> Result<(Document, Vec<String>), Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = BodyParser::new(styles, numbering);

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Office2MdError::xml(part, e))?;

        if parser.skip_depth > 0 {
            match event {
                Event::Start(_) => parser.skip_depth += 1,
                Event::End(_) => parser.skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                if local_name(e.name().as_ref()) == b"Fallback" {
                    parser.skip_depth = 1;
                    continue;
                }
                parser.start(&e, false);
            }
            Event::Empty(e) => parser.start(&e, true),
            Event::End(e) => parser.end(local_name(e.name().as_ref())),
            Event::Text(e) if parser.in_text => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                parser.text(&text);
            }
            Event::GeneralRef(e) if parser.in_text => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    parser.text(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((
        Document {
            blocks: parser.blocks,
        },
        parser.image_rids,
    ))
}
