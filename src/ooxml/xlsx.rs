//! SpreadsheetML reader: workbook → sheets of cell strings.
//!
//! Cell values are read as cached (`<v>`) values, never formulas. Types:
//!
//! | `t=`        | Value |
//! |-------------|-------|
//! | `s`         | index into the shared string table |
//! | `inlineStr` | text of `<is>` |
//! | `b`         | `True` / `False` |
//! | `n`, `str`, `e`, absent | literal text |
//!
//! Numbers are kept exactly as stored; number formats (dates, currency)
//! are not applied.

use crate::error::Office2MdError;
use crate::ooxml::{attr, local_name, prefixed_attr, resolve_entity, Package};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use tracing::debug;

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    /// Non-empty rows, each as wide as the sheet's used column range.
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    /// Index of the sheet selected when the workbook was saved.
    pub active: usize,
}

impl Workbook {
    pub fn active_sheet(&self) -> Option<&Sheet> {
        self.sheets.get(self.active).or_else(|| self.sheets.first())
    }
}

pub fn read_workbook<R: Read + Seek>(pkg: &mut Package<R>) -> Result<Workbook, Office2MdError> {
    let wb_part = pkg
        .relationships_for("")?
        .first_of_type("officeDocument")
        .map(|r| r.target.clone())
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let rels = pkg.relationships_for(&wb_part)?;

    let shared = match rels.first_of_type("sharedStrings") {
        Some(rel) => match pkg.read_optional_xml(&rel.target)? {
            Some(xml) => parse_shared_strings(&xml, &rel.target)?,
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let wb_xml = pkg.read_xml(&wb_part)?;
    let (entries, active) = parse_workbook(&wb_xml, &wb_part)?;

    let mut sheets = Vec::with_capacity(entries.len());
    for (name, rid) in entries {
        let Some(rel) = rels.get(&rid) else {
            debug!("Sheet '{}' has no relationship {}, skipped", name, rid);
            continue;
        };
        let xml = pkg.read_xml(&rel.target)?;
        let rows = parse_sheet(&xml, &rel.target, &shared)?;
        sheets.push(Sheet { name, rows });
    }

    Ok(Workbook { sheets, active })
}

/// `(sheet name, relationship id)` in tab order, plus the active tab index.
pub(crate) fn parse_workbook(
    xml: &str,
    part: &str,
) -> Result<(Vec<(String, String)>, usize), Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    let mut active = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sheet" => {
                        let sheet_name = attr(&e, b"name");
                        if let (Some(n), Some(rid)) = (sheet_name, prefixed_attr(&e, b"id")) {
                            sheets.push((n, rid));
                        }
                    }
                    b"workbookView" => {
                        active = attr(&e, b"activeTab")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }
    Ok((sheets, active))
}

pub(crate) fn parse_shared_strings(xml: &str, part: &str) -> Result<Vec<String>, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_t => current.push_str(&String::from_utf8_lossy(e.as_ref())),
            Ok(Event::GeneralRef(e)) if in_t => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    current.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference (`"C7"` → 2).
pub fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(n - 1)
}

#[derive(Default)]
struct CellState {
    col: usize,
    kind: Option<String>,
    value: String,
}

/// Read a worksheet into non-empty rows spanning the used column range.
pub(crate) fn parse_sheet(
    xml: &str,
    part: &str,
    shared: &[String],
) -> Result<Vec<Vec<String>>, Office2MdError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<BTreeMap<usize, String>> = Vec::new();
    let mut row: BTreeMap<usize, String> = BTreeMap::new();
    let mut cell: Option<CellState> = None;
    let mut next_col = 0usize;
    let mut in_value = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"row" => {
                    row = BTreeMap::new();
                    next_col = 0;
                }
                b"c" => {
                    let col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    next_col = col + 1;
                    cell = Some(CellState {
                        col,
                        kind: attr(&e, b"t"),
                        value: String::new(),
                    });
                }
                b"rPh" => in_phonetic = true,
                b"v" | b"t" if cell.is_some() && !in_phonetic => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"c" => {
                next_col = attr(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_col)
                    + 1;
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"row" => rows.push(std::mem::take(&mut row)),
                b"c" => {
                    if let Some(c) = cell.take() {
                        let text = cell_text(&c, shared);
                        if !text.is_empty() {
                            row.insert(c.col, text);
                        }
                    }
                }
                b"rPh" => in_phonetic = false,
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) if in_value => {
                if let (Some(c), Some(resolved)) = (
                    cell.as_mut(),
                    resolve_entity(&String::from_utf8_lossy(e.as_ref())),
                ) {
                    c.value.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Office2MdError::xml(part, e)),
            _ => {}
        }
    }

    let non_empty: Vec<BTreeMap<usize, String>> =
        rows.into_iter().filter(|r| !r.is_empty()).collect();
    let min_col = non_empty
        .iter()
        .filter_map(|r| r.keys().next().copied())
        .min()
        .unwrap_or(0);
    let max_col = non_empty
        .iter()
        .filter_map(|r| r.keys().next_back().copied())
        .max()
        .unwrap_or(0);

    Ok(non_empty
        .into_iter()
        .map(|mut r| {
            (min_col..=max_col)
                .map(|c| r.remove(&c).unwrap_or_default())
                .collect()
        })
        .collect())
}

fn cell_text(cell: &CellState, shared: &[String]) -> String {
    let raw = cell.value.as_str();
    match cell.kind.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .cloned()
            .unwrap_or_default(),
        Some("b") => match raw.trim() {
            "1" => "True".to_string(),
            "0" => "False".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("C7"), Some(2));
        assert_eq!(column_index("Z3"), Some(25));
        assert_eq!(column_index("AA10"), Some(26));
        assert_eq!(column_index("ab2"), Some(27));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn shared_strings_rich_text_and_phonetics() {
        let xml = r#"<sst><si><t>Plain</t></si><si><r><t>Ri</t></r><r><rPr><b/></rPr><t>ch</t></r><rPh><t>ignored</t></rPh></si><si/><si><t>a &amp; b</t></si></sst>"#;
        let strings = parse_shared_strings(xml, "sst").unwrap();
        assert_eq!(strings, vec!["Plain", "Rich", "", "a & b"]);
    }

    #[test]
    fn sheet_cells_typed_and_gaps_padded() {
        let shared = vec!["Name".to_string(), "Qty".to_string()];
        let xml = r#"<worksheet><sheetData>
<row r="1"><c r="B1" t="s"><v>0</v></c><c r="D1" t="s"><v>1</v></c></row>
<row r="2"><c r="B2" t="inlineStr"><is><t>Widget</t></is></c><c r="C2" t="b"><v>1</v></c><c r="D2"><f>1+1</f><v>2</v></c></row>
<row r="3"><c r="B3" s="1"/></row>
<row r="5"><c r="D5" t="e"><v>#DIV/0!</v></c></row>
</sheetData></worksheet>"#;
        let rows = parse_sheet(xml, "sheet1", &shared).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Name", "", "Qty"],
                vec!["Widget", "True", "2"],
                vec!["", "", "#DIV/0!"],
            ]
        );
    }

    #[test]
    fn empty_sheet_has_no_rows() {
        let rows = parse_sheet("<worksheet><sheetData/></worksheet>", "s", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn workbook_sheets_and_active_tab() {
        let xml = r#"<workbook xmlns:r="r"><bookViews><workbookView activeTab="1"/></bookViews><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Summary" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
        let (sheets, active) = parse_workbook(xml, "wb").unwrap();
        assert_eq!(
            sheets,
            vec![
                ("Data".to_string(), "rId1".to_string()),
                ("Summary".to_string(), "rId2".to_string())
            ]
        );
        assert_eq!(active, 1);
    }
}
