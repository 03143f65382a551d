//! End-to-end conversion tests over small OOXML packages built on the fly.
//!
//! The DOCX, XLSX and PPTX fixtures are zipped into a temp directory by the
//! helpers below, so these tests need no external files or tools. Tests for
//! the pandoc and PDF backends are gated:
//!
//!   E2E_ENABLED=1 cargo test --test conversion -- --nocapture

use edgequake_office2md::backends::pandoc;
use edgequake_office2md::pipeline::postprocess::normalize;
use edgequake_office2md::pipeline::reconcile::ADDITIONAL_IMAGES_MARKER;
use edgequake_office2md::pipeline::sink::ImageSink;
use edgequake_office2md::{
    convert_batch, BackendKind, Capabilities, ConversionConfig, ConversionOutput, Converter,
    DocxBackend, ImageMode, Office2MdError,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── Fixture helpers ──────────────────────────────────────────────────────────

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-png-payload";
const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg-payload";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

fn write_package(path: &Path, parts: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#
    )
}

const DOCX_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Revenue was </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>up</w:t></w:r><w:r><w:t xml:space="preserve"> this quarter.</w:t></w:r></w:p>
<w:p><w:r><w:drawing><a:blip r:embed="rId2"/></w:drawing></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>First point</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>Second point</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Sales</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>10</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;

/// A report with a heading, bold run, one placed picture, a two-item list,
/// a table and one image relationship the body never references.
fn write_docx(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let root_rels = rels(&[("rId1", REL_OFFICE_DOCUMENT, "word/document.xml")]);
    let doc_rels = rels(&[
        ("rId2", REL_IMAGE, "media/image1.png"),
        ("rId3", REL_IMAGE, "media/image2.jpeg"),
    ]);
    write_package(
        &path,
        &[
            ("_rels/.rels", root_rels.as_bytes()),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/document.xml", DOCX_BODY.as_bytes()),
            ("word/media/image1.png", PNG_BYTES),
            ("word/media/image2.jpeg", JPEG_BYTES),
        ],
    );
    path
}

/// Two sheets: "Budget" with a header and one data row, "Notes" empty.
fn write_xlsx(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let root_rels = rels(&[("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml")]);
    let wb_rels = rels(&[
        (
            "rId1",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
            "worksheets/sheet1.xml",
        ),
        (
            "rId2",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
            "worksheets/sheet2.xml",
        ),
        (
            "rId3",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings",
            "sharedStrings.xml",
        ),
    ]);
    let workbook = r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView activeTab="0"/></bookViews><sheets><sheet name="Budget" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
    let shared = r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Item</t></si><si><t>Cost</t></si><si><t>Rent</t></si></sst>"#;
    let sheet1 = r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>1200</v></c></row></sheetData></worksheet>"#;
    let sheet2 = r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;
    write_package(
        &path,
        &[
            ("_rels/.rels", root_rels.as_bytes()),
            ("xl/_rels/workbook.xml.rels", wb_rels.as_bytes()),
            ("xl/workbook.xml", workbook.as_bytes()),
            ("xl/sharedStrings.xml", shared.as_bytes()),
            ("xl/worksheets/sheet1.xml", sheet1.as_bytes()),
            ("xl/worksheets/sheet2.xml", sheet2.as_bytes()),
        ],
    );
    path
}

/// One slide with a title, a two-paragraph body, a picture and speaker notes.
fn write_pptx(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let root_rels = rels(&[("rId1", REL_OFFICE_DOCUMENT, "ppt/presentation.xml")]);
    let pres_rels = rels(&[(
        "rId1",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide",
        "slides/slide1.xml",
    )]);
    let presentation = r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst><p:sldId id="256" r:id="rId1"/></p:sldIdLst></p:presentation>"#;
    let slide_rels = rels(&[
        ("rId2", REL_IMAGE, "../media/image1.png"),
        (
            "rId3",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide",
            "../notesSlides/notesSlide1.xml",
        ),
    ]);
    let slide = r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>Launch Plan</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>Design</a:t></a:r></a:p><a:p><a:r><a:t>Build</a:t></a:r></a:p></p:txBody></p:sp>
<p:pic><p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic>
</p:spTree></p:cSld></p:sld>"#;
    let notes = r#"<?xml version="1.0" encoding="UTF-8"?><p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>Remember the demo</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#;
    write_package(
        &path,
        &[
            ("_rels/.rels", root_rels.as_bytes()),
            ("ppt/_rels/presentation.xml.rels", pres_rels.as_bytes()),
            ("ppt/presentation.xml", presentation.as_bytes()),
            ("ppt/slides/_rels/slide1.xml.rels", slide_rels.as_bytes()),
            ("ppt/slides/slide1.xml", slide.as_bytes()),
            ("ppt/notesSlides/notesSlide1.xml", notes.as_bytes()),
            ("ppt/media/image1.png", PNG_BYTES),
        ],
    );
    path
}

fn converter(builder: edgequake_office2md::ConversionConfigBuilder) -> Converter {
    Converter::new(builder.build().unwrap(), Capabilities::none())
}

fn extracting() -> edgequake_office2md::ConversionConfigBuilder {
    ConversionConfig::builder().extract_images(true)
}

/// Every image found is either emitted or failed, every emitted image has
/// exactly one reference in the text, and the references after the
/// additional-images marker are exactly the unplaced ones.
fn assert_no_image_loss(out: &ConversionOutput) {
    let md = &out.markdown;
    let stats = &out.stats;
    assert_eq!(md.matches("![").count(), stats.images_emitted, "got:\n{md}");
    let appended = md
        .split_once(ADDITIONAL_IMAGES_MARKER)
        .map_or(0, |(_, tail)| tail.matches("![").count());
    assert_eq!(appended, stats.images_unplaced, "got:\n{md}");
    assert_eq!(stats.images_found, stats.images_emitted + stats.images_failed);
    assert_eq!(stats.images_failed, out.image_errors.len());
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn native_docx_structure_and_images() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let conv = converter(extracting().docx_backend(DocxBackend::Native));

    let out = conv.convert(&input, None).await.unwrap();
    let md = &out.markdown;

    assert_eq!(out.backend, BackendKind::Native);
    assert!(md.starts_with("# Quarterly Report\n\n"), "got:\n{md}");
    assert!(md.contains("Revenue was **up** this quarter."));
    assert!(md.contains("- First point\n- Second point\n"));
    assert!(md.contains("| Region | Sales |\n| --- | --- |\n| North | 10 |"));

    let placed = md.find("![](./report_images/image_1.png)").unwrap();
    let marker = md.find("<!-- Additional extracted images -->").unwrap();
    let unplaced = md.find("![](./report_images/image_2.jpg)").unwrap();
    assert!(placed < md.find("- First point").unwrap());
    assert!(placed < marker && marker < unplaced);

    assert!(md.ends_with('\n') && !md.ends_with("\n\n"));
    assert_eq!(out.stats.images_emitted, 2);
    assert_eq!(out.stats.images_unplaced, 1);
    assert!(out.image_errors.is_empty());

    let images_dir = dir.path().join("report_images");
    assert_eq!(out.images_dir.as_deref(), Some(images_dir.as_path()));
    assert_eq!(std::fs::read(images_dir.join("image_1.png")).unwrap(), PNG_BYTES);
    assert_eq!(std::fs::read(images_dir.join("image_2.jpg")).unwrap(), JPEG_BYTES);
}

#[tokio::test]
async fn markup_docx_matches_native_dialect() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let conv = converter(extracting().docx_backend(DocxBackend::Markup));

    let out = conv.convert(&input, None).await.unwrap();
    let md = &out.markdown;

    assert_eq!(out.backend, BackendKind::Markup);
    assert!(md.contains("# Quarterly Report"), "got:\n{md}");
    assert!(md.contains("**up**"));
    assert!(md.contains("- First point"));
    assert!(md.contains("| Region | Sales |"));
    assert!(!md.contains("base64"));

    let placed = md.find("./report_images/image_1.png").unwrap();
    let unplaced = md.find("./report_images/image_2.jpg").unwrap();
    assert!(placed < unplaced);
    assert!(dir.path().join("report_images/image_1.png").exists());
}

#[tokio::test]
async fn auto_backend_without_pandoc_uses_markup() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let out = converter(extracting()).convert(&input, None).await.unwrap();
    assert_eq!(out.backend, BackendKind::Markup);
}

#[tokio::test]
async fn forced_pandoc_without_binary_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let err = converter(extracting().docx_backend(DocxBackend::Pandoc))
        .convert(&input, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Office2MdError::BackendUnavailable { .. }));
}

#[tokio::test]
async fn skip_mode_emits_no_images() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");

    for backend in [DocxBackend::Native, DocxBackend::Markup] {
        let conv = converter(
            ConversionConfig::builder()
                .image_mode(ImageMode::Skip)
                .docx_backend(backend),
        );
        let out = conv.convert(&input, None).await.unwrap();
        assert!(!out.markdown.contains("!["), "{backend:?} leaked an image");
        assert!(!out.markdown.contains("<!--"));
        assert!(out.markdown.contains("# Quarterly Report"));
        assert_eq!(out.stats.images_emitted, 0);
        assert!(out.images_dir.is_none());
    }
    assert!(!dir.path().join("report_images").exists());
}

#[tokio::test]
async fn embed_mode_inlines_data_uris() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let conv = converter(
        ConversionConfig::builder()
            .embed_images(true)
            .docx_backend(DocxBackend::Native),
    );

    let out = conv.convert(&input, None).await.unwrap();
    assert!(out.markdown.contains("![](data:image/png;base64,"));
    assert!(out.markdown.contains("![](data:image/jpeg;base64,"));
    assert!(!dir.path().join("report_images").exists());
}

#[tokio::test]
async fn output_is_already_normalised() {
    let dir = tempfile::tempdir().unwrap();
    let docx = write_docx(dir.path(), "report.docx");
    let pptx = write_pptx(dir.path(), "deck.pptx");
    let conv = converter(extracting().docx_backend(DocxBackend::Native));

    for input in [docx, pptx] {
        let out = conv.convert(&input, None).await.unwrap();
        assert_eq!(normalize(&out.markdown), out.markdown.trim_end());
    }
}

// ── XLSX ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn xlsx_sheets_become_sections() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_xlsx(dir.path(), "budget.xlsx");

    let out = converter(extracting()).convert(&input, None).await.unwrap();
    assert_eq!(out.backend, BackendKind::Spreadsheet);
    assert!(out
        .markdown
        .contains("## Budget\n\n| Item | Cost |\n| --- | --- |\n| Rent | 1200 |"));
    assert!(out.markdown.contains("## Notes\n\n*Empty sheet*"));

    let first_only = converter(extracting().include_all_sheets(false))
        .convert(&input, None)
        .await
        .unwrap();
    assert!(first_only.markdown.contains("## Budget"));
    assert!(!first_only.markdown.contains("## Notes"));
}

// ── PPTX ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pptx_slide_with_picture_and_notes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pptx(dir.path(), "deck.pptx");

    let out = converter(extracting()).convert(&input, None).await.unwrap();
    let md = &out.markdown;
    assert_eq!(out.backend, BackendKind::Slides);
    assert!(md.starts_with("## Slide 1\n\n### Launch Plan\n\n"), "got:\n{md}");
    assert!(md.contains("- Design\n- Build\n"));
    assert!(md.contains("![](./deck_images/image_1.png)"));
    assert!(md.contains("**Notes:**\n\nRemember the demo"));
    assert!(dir.path().join("deck_images/image_1.png").exists());

    let silent = converter(extracting().include_notes(false))
        .convert(&input, None)
        .await
        .unwrap();
    assert!(!silent.markdown.contains("Notes:"));
    assert!(!silent.markdown.contains("Remember the demo"));
}

// ── Image accounting ─────────────────────────────────────────────────────────

#[tokio::test]
async fn no_image_loss_native_and_markup() {
    for backend in [DocxBackend::Native, DocxBackend::Markup] {
        let dir = tempfile::tempdir().unwrap();
        let input = write_docx(dir.path(), "report.docx");
        let out = converter(extracting().docx_backend(backend))
            .convert(&input, None)
            .await
            .unwrap();
        assert_no_image_loss(&out);
        assert_eq!(out.stats.images_found, 2, "{backend:?}");
        assert_eq!(out.stats.images_unplaced, 1, "{backend:?}");
    }
}

#[tokio::test]
async fn no_image_loss_embed_mode() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let out = converter(
        ConversionConfig::builder()
            .embed_images(true)
            .docx_backend(DocxBackend::Native),
    )
    .convert(&input, None)
    .await
    .unwrap();
    assert_no_image_loss(&out);
    assert_eq!(out.stats.images_emitted, 2);
}

#[tokio::test]
async fn no_image_loss_slides_and_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let deck = write_pptx(dir.path(), "deck.pptx");
    let budget = write_xlsx(dir.path(), "budget.xlsx");
    let conv = converter(extracting());

    let out = conv.convert(&deck, None).await.unwrap();
    assert_no_image_loss(&out);
    assert_eq!(out.stats.images_emitted, 1);

    let out = conv.convert(&budget, None).await.unwrap();
    assert_no_image_loss(&out);
    assert_eq!(out.stats.images_found, 0);
}

#[test]
fn no_image_loss_pandoc_media_directory() {
    let media = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(media.path().join("media")).unwrap();
    std::fs::write(media.path().join("media/image1.png"), PNG_BYTES).unwrap();
    std::fs::write(media.path().join("media/image2.jpeg"), JPEG_BYTES).unwrap();
    std::fs::write(media.path().join("media/image3.png"), PNG_BYTES).unwrap();

    let out = tempfile::tempdir().unwrap();
    let mut sink = ImageSink::new(
        ImageMode::Extract,
        out.path().join("report_images"),
        out.path().to_path_buf(),
    );
    let raw = "# Report\n\n![](media/image1.png){width=\"2in\"}\n\nText\n\n![](media/image3.png)\n";
    let (md, unplaced) = pandoc::finish(raw, Some(media.path()), &mut sink);
    let report = sink.into_report();

    assert_eq!(md.matches("![").count(), report.emitted, "got:\n{md}");
    assert_eq!(report.found, 3);
    assert_eq!(report.emitted, 3);
    assert_eq!(unplaced, 1);
    let (_, tail) = md.split_once(ADDITIONAL_IMAGES_MARKER).unwrap();
    assert_eq!(tail.trim(), "![](./report_images/image_2.jpg)");
}

// ── Files and batches ────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_to_file_writes_markdown_and_images_beside_it() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let target = dir.path().join("out/final.md");
    let conv = converter(extracting().docx_backend(DocxBackend::Native));

    let out = conv.convert_to_file(&input, Some(&target)).await.unwrap();
    assert_eq!(out.output_path, target);
    let written = std::fs::read_to_string(&target).unwrap();
    assert_eq!(written, out.markdown);
    assert!(written.contains("![](./final_images/image_1.png)"));
    assert!(dir.path().join("out/final_images/image_1.png").exists());
}

#[tokio::test]
async fn batch_records_failures_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_xlsx(dir.path(), "budget.xlsx");
    std::fs::write(dir.path().join("broken.docx"), b"this is not a zip").unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();
    let out_dir = dir.path().join("md");

    let conv = converter(extracting());
    let summary = convert_batch(&conv, dir.path(), Some(&out_dir), false, None)
        .await
        .unwrap();

    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.failure_count(), 1);
    assert!(!summary.is_clean());
    assert!(summary.failures[0].0.ends_with("broken.docx"));
    assert!(out_dir.join("budget.md").exists());
    assert!(!out_dir.join("broken.md").exists());
}

// ── Gated: external tools ────────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

#[tokio::test]
async fn e2e_pandoc_docx() {
    e2e_skip_unless_enabled!();
    let config = extracting().docx_backend(DocxBackend::Pandoc).build().unwrap();
    let conv = Converter::probe(config).await;
    if conv.capabilities().pandoc.is_none() {
        println!("SKIP — pandoc not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "report.docx");
    let out = conv.convert(&input, None).await.unwrap();
    let md = &out.markdown;

    assert_eq!(out.backend, BackendKind::Pandoc);
    assert!(md.contains("# Quarterly Report"), "got:\n{md}");
    assert!(md.contains("**up**"));
    assert!(!md.contains("{width="));
    assert!(md.contains("./report_images/image_1.png"));
    assert!(dir.path().join("report_images/image_1.png").exists());
    assert_no_image_loss(&out);
}

#[tokio::test]
async fn e2e_pdf_layout() {
    e2e_skip_unless_enabled!();
    let input = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample.pdf");
    if !input.exists() {
        println!("SKIP — test file not found: {}", input.display());
        return;
    }
    let conv = Converter::probe(extracting().build().unwrap()).await;
    if !conv.capabilities().pdfium {
        println!("SKIP — pdfium not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let out = conv
        .convert_to_file(&input, Some(&dir.path().join("sample.md")))
        .await
        .unwrap();
    assert_eq!(out.backend, BackendKind::Layout);
    assert!(!out.markdown.trim().is_empty());
    assert!(!out.markdown.contains("```markdown"));
}
