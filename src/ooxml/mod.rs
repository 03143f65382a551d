//! Minimal OOXML (Open Packaging Conventions) reader.
//!
//! DOCX, XLSX and PPTX are all zip containers of XML parts linked by
//! relationship files (`_rels/*.rels`). This module owns the shared pieces:
//! opening the zip, reading parts, parsing relationships and resolving
//! relationship targets to part names. The format-specific readers live in
//! [`docx`], [`xlsx`] and [`pptx`].
//!
//! Part names are handled without a leading slash (`word/document.xml`),
//! which is how they appear as zip entry names.

pub mod docx;
pub mod pptx;
pub mod xlsx;

use crate::error::Office2MdError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

const IMAGE_REL_SUFFIX: &str = "/image";

/// Anything image bytes can be read from by part name.
///
/// The package implements it; tests substitute an in-memory map.
pub trait PartSource {
    fn read_part(&mut self, name: &str) -> Result<Vec<u8>, Office2MdError>;
}

/// An opened OOXML zip container.
pub struct Package<R: Read + Seek = BufReader<File>> {
    path: PathBuf,
    archive: ZipArchive<R>,
}

impl Package {
    /// Open a package from disk.
    pub fn open(path: &Path) -> Result<Self, Office2MdError> {
        let file = File::open(path).map_err(|e| Office2MdError::InvalidPackage {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> Package<R> {
    /// Wrap any seekable reader; `path` is only used in error messages.
    pub fn from_reader(reader: R, path: &Path) -> Result<Self, Office2MdError> {
        let archive = ZipArchive::new(reader).map_err(|e| Office2MdError::InvalidPackage {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.archive
            .index_for_name(name.trim_start_matches('/'))
            .is_some()
    }

    /// Read a part's raw bytes.
    pub fn read_bytes(&mut self, name: &str) -> Result<Vec<u8>, Office2MdError> {
        let name = name.trim_start_matches('/');
        let mut file = match self.archive.by_name(name) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => {
                return Err(Office2MdError::MissingPart {
                    part: name.to_string(),
                })
            }
            Err(e) => {
                return Err(Office2MdError::InvalidPackage {
                    path: self.path.clone(),
                    detail: format!("{name}: {e}"),
                })
            }
        };
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| Office2MdError::InvalidPackage {
                path: self.path.clone(),
                detail: format!("{name}: {e}"),
            })?;
        Ok(contents)
    }

    /// Read an XML part as text, dropping a UTF-8 BOM.
    pub fn read_xml(&mut self, name: &str) -> Result<String, Office2MdError> {
        let bytes = self.read_bytes(name)?;
        Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned())
    }

    /// Read an XML part that may legitimately be absent.
    pub fn read_optional_xml(&mut self, name: &str) -> Result<Option<String>, Office2MdError> {
        match self.read_xml(name) {
            Ok(xml) => Ok(Some(xml)),
            Err(Office2MdError::MissingPart { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Relationships whose source is `part`. A part without a `.rels` file
    /// has no relationships.
    pub fn relationships_for(&mut self, part: &str) -> Result<Relationships, Office2MdError> {
        let rels_name = rels_part_name(part);
        match self.read_optional_xml(&rels_name)? {
            Some(xml) => Relationships::parse(&xml, part, &rels_name),
            None => Ok(Relationships::default()),
        }
    }
}

impl<R: Read + Seek> PartSource for Package<R> {
    fn read_part(&mut self, name: &str) -> Result<Vec<u8>, Office2MdError> {
        self.read_bytes(name)
    }
}

// ── Relationships ────────────────────────────────────────────────────────────

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Resolved part name for internal targets, the raw URI for external ones.
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn is_image(&self) -> bool {
        self.rel_type.ends_with(IMAGE_REL_SUFFIX)
    }
}

/// The relationships of one source part, in file order.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn from_vec(rels: Vec<Relationship>) -> Self {
        Self { rels }
    }

    /// Parse a `.rels` part. Internal targets are resolved against `source_part`.
    pub fn parse(xml: &str, source_part: &str, rels_name: &str) -> Result<Self, Office2MdError> {
        let mut reader = Reader::from_str(xml);
        let mut rels = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e))
                    if local_name(e.name().as_ref()) == b"Relationship" =>
                {
                    let id = attr(&e, b"Id").unwrap_or_default();
                    let rel_type = attr(&e, b"Type").unwrap_or_default();
                    let raw_target = attr(&e, b"Target").unwrap_or_default();
                    let external = attr(&e, b"TargetMode").is_some_and(|m| m == "External");
                    let target = if external {
                        raw_target
                    } else {
                        resolve_part_path(source_part, &raw_target)
                    };
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Office2MdError::xml(rels_name, e)),
                _ => {}
            }
        }
        Ok(Self { rels })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    /// First relationship whose type URI ends with `/{suffix}`.
    pub fn first_of_type(&self, suffix: &str) -> Option<&Relationship> {
        self.rels
            .iter()
            .find(|r| r.rel_type.rsplit('/').next() == Some(suffix))
    }

    /// Image relationships in file order.
    pub fn images(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter().filter(|r| r.is_image())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

/// `word/document.xml` → `word/_rels/document.xml.rels`.
pub fn rels_part_name(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns it.
///
/// Absolute targets (`/word/media/a.png`) are taken from the package root;
/// relative ones (`media/a.png`, `../media/a.png`) from the source part's
/// directory.
pub fn resolve_part_path(source_part: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        if let Some((dir, _)) = source_part.trim_start_matches('/').rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

// ── XML helpers ──────────────────────────────────────────────────────────────

/// Strip a namespace prefix: `w:p` → `p`.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the attribute whose local name is `name`, unescaped.
pub(crate) fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == name)
        .map(|a| match a.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// Value of a namespace-prefixed attribute (`r:id`), ignoring an
/// unprefixed one with the same local name (`id`).
pub(crate) fn prefixed_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref().contains(&b':') && local_name(a.key.as_ref()) == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// OOXML on/off attribute (`w:val`): absent, `1`, `true` or `on` mean on.
pub(crate) fn toggle_on(e: &BytesStart<'_>) -> bool {
    match attr(e, b"val") {
        None => true,
        Some(v) => !matches!(v.as_str(), "0" | "false" | "off" | "none"),
    }
}

/// Resolve a general entity reference (`&amp;`, `&#x41;`).
pub(crate) fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEFu8, 0xBB, 0xBF][..]).unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_with(parts: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn rels_name_for_nested_part() {
        assert_eq!(rels_part_name("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_part_name("/ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_part_name("top.xml"), "_rels/top.xml.rels");
    }

    #[test]
    fn targets_resolved_against_source() {
        assert_eq!(resolve_part_path("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_part_path("ppt/slides/slide1.xml", "../media/image2.emf"), "ppt/media/image2.emf");
        assert_eq!(resolve_part_path("xl/workbook.xml", "/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn relationships_parsed_in_order() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/b.png"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="http://x/y.png" TargetMode="External"/>
</Relationships>"#;
        let rels = Relationships::parse(xml, "word/document.xml", "rels").unwrap();
        assert_eq!(rels.len(), 3);
        let images: Vec<_> = rels.images().map(|r| r.id.as_str()).collect();
        assert_eq!(images, vec!["rId2", "rId3"]);
        assert_eq!(rels.get("rId2").unwrap().target, "word/media/b.png");
        assert!(rels.get("rId3").unwrap().external);
        assert_eq!(rels.first_of_type("styles").unwrap().target, "word/styles.xml");
    }

    #[test]
    fn package_reads_parts_and_missing_rels() {
        let cursor = zip_with(&[("word/document.xml", "\u{feff}<doc/>")]);
        let mut pkg = Package::from_reader(cursor, Path::new("t.docx")).unwrap();
        assert!(pkg.has_part("/word/document.xml"));
        assert_eq!(pkg.read_xml("word/document.xml").unwrap(), "<doc/>");
        assert!(matches!(
            pkg.read_bytes("word/missing.xml"),
            Err(Office2MdError::MissingPart { .. })
        ));
        assert!(pkg.relationships_for("word/document.xml").unwrap().is_empty());
    }

    #[test]
    fn not_a_zip_is_invalid_package() {
        let res = Package::from_reader(Cursor::new(b"PK\x03\x04garbage".to_vec()), Path::new("x.docx"));
        assert!(matches!(res, Err(Office2MdError::InvalidPackage { .. })));
    }

    #[test]
    fn entities() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_entity("#233").as_deref(), Some("é"));
        assert_eq!(resolve_entity("bogus"), None);
    }
}
