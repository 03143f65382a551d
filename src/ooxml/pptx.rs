//! PresentationML reader: slides in presentation order, as flat shape lists.
//!
//! Group shapes are flattened so the slide reads top to bottom in tree
//! order. Each text shape keeps its paragraphs separately (the slides
//! backend turns multi-paragraph frames into bullet lists), tables keep
//! their cell grid, and pictures keep the relationship id of their bytes.

use crate::error::Office2MdError;
use crate::ooxml::{attr, local_name, prefixed_attr, resolve_entity, Package, Relationships};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use tracing::debug;

const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideShape {
    Text {
        /// Placeholder type (`title`, `body`, …); `Some("")` for an untyped
        /// placeholder, `None` for a free text box.
        placeholder: Option<String>,
        paragraphs: Vec<String>,
    },
    Table(Vec<Vec<String>>),
    Picture {
        rid: String,
    },
}

impl SlideShape {
    pub fn is_title_placeholder(&self) -> bool {
        matches!(self, SlideShape::Text { placeholder: Some(p), .. } if p == "title" || p == "ctrTitle")
    }

    /// Trimmed text of a text shape, paragraphs joined by newlines.
    pub fn text(&self) -> Option<String> {
        match self {
            SlideShape::Text { paragraphs, .. } => {
                let text = paragraphs.join("\n");
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Slide {
    /// 1-based position in the presentation.
    pub number: usize,
    pub shapes: Vec<SlideShape>,
    /// Speaker notes text, when the slide has a notes page with text.
    pub notes: Option<String>,
    /// Relationships of the slide part, for resolving picture ids.
    pub rels: Relationships,
}

pub fn read_presentation<R: Read + Seek>(
    pkg: &mut Package<R>,
) -> Result<Vec<Slide>, Office2MdError> {
    let pres_part = pkg
        .relationships_for("")?
        .first_of_type("officeDocument")
        .map(|r| r.target.clone())
        .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_string());
    let pres_rels = pkg.relationships_for(&pres_part)?;
    let pres_xml = pkg.read_xml(&pres_part)?;
    let slide_rids = parse_slide_order(&pres_xml, &pres_part)?;

    let mut slides = Vec::with_capacity(slide_rids.len());
    for rid in slide_rids {
        let Some(rel) = pres_rels.get(&rid) else {
            debug!("Slide relationship {} missing, skipped", rid);
            continue;
        };
        let part = rel.target.clone();
        let xml = pkg.read_xml(&part)?;
        let shapes = parse_shapes(&xml, &part)?;
        let rels = pkg.relationships_for(&part)?;

        let notes = match rels.first_of_type("notesSlide") {
            Some(notes_rel) => match pkg.read_optional_xml(&notes_rel.target)? {
                Some(notes_xml) => notes_text(&parse_shapes(&notes_xml, &notes_rel.target)?),
                None => None,
            },
            None => None,
        };

        slides.push(Slide {
            number: slides.len() + 1,
            shapes,
            notes,
            rels,
        });
    }
    Ok(slides)
}

/// Relationship ids from `p:sldIdLst`, in presentation order.
pub(crate) fn parse_slide_order(xml: &str, part: &str) -> Result<Vec<String>, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut rids = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                if let Some(rid) = prefixed_attr(&e, b"id") {
                    rids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }
    Ok(rids)
}

/// Text of the notes body placeholder.
fn notes_text(shapes: &[SlideShape]) -> Option<String> {
    shapes
        .iter()
        .filter(|s| matches!(s, SlideShape::Text { placeholder: Some(p), .. } if p == "body"))
        .find_map(SlideShape::text)
}

#[derive(Default)]
struct ShapeParser {
    shapes: Vec<SlideShape>,
    /// Open `p:sp`: placeholder type and paragraphs so far.
    text_shape: Option<(Option<String>, Vec<String>)>,
    paragraph: Option<String>,
    in_text: bool,
    in_pic: bool,
    table: Option<Vec<Vec<String>>>,
    row: Vec<String>,
    cell: Option<String>,
}

impl ShapeParser {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = e.name();
        match local_name(name.as_ref()) {
            b"sp" if !empty && self.table.is_none() => {
                self.text_shape = Some((None, Vec::new()));
            }
            b"ph" => {
                if let Some((ref mut ph, _)) = self.text_shape {
                    *ph = Some(attr(e, b"type").unwrap_or_default());
                }
            }
            b"pic" if !empty => self.in_pic = true,
            b"blip" if self.in_pic => {
                if let Some(rid) = attr(e, b"embed") {
                    self.shapes.push(SlideShape::Picture { rid });
                }
            }
            b"tbl" if !empty => self.table = Some(Vec::new()),
            b"tr" if !empty && self.table.is_some() => self.row = Vec::new(),
            b"tc" if self.table.is_some() => {
                if empty {
                    self.row.push(String::new());
                } else {
                    self.cell = Some(String::new());
                }
            }
            b"p" if !empty => self.paragraph = Some(String::new()),
            b"t" if !empty => self.in_text = true,
            b"br" => self.push_text("\n"),
            _ => {}
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"sp" => {
                if let Some((placeholder, paragraphs)) = self.text_shape.take() {
                    let shape = SlideShape::Text {
                        placeholder,
                        paragraphs,
                    };
                    if shape.text().is_some() {
                        self.shapes.push(shape);
                    }
                }
            }
            b"pic" => self.in_pic = false,
            b"tbl" => {
                if let Some(rows) = self.table.take() {
                    if !rows.is_empty() {
                        self.shapes.push(SlideShape::Table(rows));
                    }
                }
            }
            b"tr" => {
                if let Some(rows) = self.table.as_mut() {
                    rows.push(std::mem::take(&mut self.row));
                }
            }
            b"tc" => {
                if let Some(cell) = self.cell.take() {
                    self.row.push(cell.trim().to_string());
                }
            }
            b"p" => {
                if let Some(p) = self.paragraph.take() {
                    if let Some(cell) = self.cell.as_mut() {
                        if !cell.is_empty() {
                            cell.push('\n');
                        }
                        cell.push_str(&p);
                    } else if let Some((_, ref mut paragraphs)) = self.text_shape {
                        paragraphs.push(p);
                    }
                }
            }
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(p) = self.paragraph.as_mut() {
            p.push_str(text);
        }
    }
}

/// Flatten a slide (or notes page) shape tree into shapes in tree order.
pub(crate) fn parse_shapes(xml: &str, part: &str) -> Result<Vec<SlideShape>, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = ShapeParser::default();
    let mut skip_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Office2MdError::xml(part, e))?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                if local_name(e.name().as_ref()) == b"Fallback" {
                    skip_depth = 1;
                    continue;
                }
                parser.start(&e, false);
            }
            Event::Empty(e) => parser.start(&e, true),
            Event::End(e) => parser.end(local_name(e.name().as_ref())),
            Event::Text(e) if parser.in_text => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                parser.push_text(&text);
            }
            Event::GeneralRef(e) if parser.in_text => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    parser.push_text(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(parser.shapes)
}
