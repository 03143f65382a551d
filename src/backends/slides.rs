//! PPTX: one `## Slide N` section per slide, closed by a horizontal rule.
//!
//! Within a slide the title (the title placeholder, or failing that the
//! first shape with text) becomes a `###` heading. Other text frames with
//! several paragraphs become bullet lists, single-paragraph frames plain
//! text. Tables render as pipe tables and pictures go through the sink at
//! the position of their shape.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::ooxml::pptx::{read_presentation, Slide, SlideShape};
use crate::ooxml::Package;
use crate::pipeline::extract::extract_relationship_images;
use crate::pipeline::postprocess;
use crate::pipeline::reconcile::{append_unplaced, ReferenceCursor};
use crate::pipeline::sink::ImageSink;
use crate::pipeline::tables::render_pipe_table;
use std::path::Path;
use tracing::debug;

use super::BackendOutput;

pub fn convert(
    path: &Path,
    config: &ConversionConfig,
    sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let mut pkg = Package::open(path)?;
    let slides = read_presentation(&mut pkg)?;
    debug!("Presentation has {} slides", slides.len());

    let mut out = String::new();
    let mut loose: Vec<String> = Vec::new();
    for slide in &slides {
        let rids: Vec<String> = slide
            .shapes
            .iter()
            .filter_map(|s| match s {
                SlideShape::Picture { rid } => Some(rid.clone()),
                _ => None,
            })
            .collect();
        let images = extract_relationship_images(&mut pkg, &slide.rels, &rids, sink);
        out.push_str(&render_slide(slide, &images.placed, config.include_notes));
        loose.extend(images.unreferenced);
    }

    let unplaced = loose.iter().filter(|r| !r.is_empty()).count();
    let markdown = append_unplaced(&out, &loose);
    Ok(BackendOutput::new(postprocess::normalize(&markdown), unplaced))
}

/// Render one slide; `pictures` holds one reference per picture shape.
pub fn render_slide(slide: &Slide, pictures: &[String], include_notes: bool) -> String {
    let mut out = format!("## Slide {}\n\n", slide.number);

    let title_idx = slide
        .shapes
        .iter()
        .position(|s| s.is_title_placeholder() && s.text().is_some())
        .or_else(|| slide.shapes.iter().position(|s| s.text().is_some()));
    if let Some(title) = title_idx.and_then(|i| slide.shapes[i].text()) {
        out.push_str(&format!("### {}\n\n", title.replace('\n', " ")));
    }

    let mut cursor = ReferenceCursor::new(pictures);
    for (i, shape) in slide.shapes.iter().enumerate() {
        if Some(i) == title_idx {
            continue;
        }
        match shape {
            SlideShape::Text { paragraphs, .. } => {
                let lines: Vec<&str> = paragraphs
                    .iter()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .collect();
                match lines.as_slice() {
                    [] => {}
                    [single] => {
                        out.push_str(single);
                        out.push_str("\n\n");
                    }
                    many => {
                        for line in many {
                            out.push_str("- ");
                            out.push_str(line);
                            out.push('\n');
                        }
                        out.push('\n');
                    }
                }
            }
            SlideShape::Table(rows) => {
                let table = render_pipe_table(rows);
                if !table.is_empty() {
                    out.push_str(&table);
                    out.push_str("\n\n");
                }
            }
            SlideShape::Picture { .. } => {
                if let Some(r) = cursor.next_ref().filter(|r| !r.is_empty()) {
                    out.push_str(r);
                    out.push_str("\n\n");
                }
            }
        }
    }

    if include_notes {
        if let Some(ref notes) = slide.notes {
            out.push_str("**Notes:**\n\n");
            out.push_str(notes.trim());
            out.push_str("\n\n");
        }
    }

    out.push_str("---\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(placeholder: Option<&str>, paras: &[&str]) -> SlideShape {
        SlideShape::Text {
            placeholder: placeholder.map(str::to_string),
            paragraphs: paras.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn slide(shapes: Vec<SlideShape>, notes: Option<&str>) -> Slide {
        Slide {
            number: 3,
            shapes,
            notes: notes.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn title_bullets_and_plain_text() {
        let s = slide(
            vec![
                text(None, &["Free text box"]),
                text(Some("title"), &["Quarterly review"]),
                text(Some("body"), &["Revenue up", "Costs flat"]),
            ],
            None,
        );
        assert_eq!(
            render_slide(&s, &[], true),
            "## Slide 3\n\n### Quarterly review\n\nFree text box\n\n- Revenue up\n- Costs flat\n\n---\n\n"
        );
    }

    #[test]
    fn first_text_shape_is_title_without_placeholder() {
        let s = slide(vec![text(None, &["Hello"]), text(None, &["World"])], None);
        let md = render_slide(&s, &[], true);
        assert!(md.starts_with("## Slide 3\n\n### Hello\n\nWorld\n\n"));
    }

    #[test]
    fn pictures_placed_in_shape_order_and_notes_last() {
        let s = slide(
            vec![
                SlideShape::Picture { rid: "rId2".into() },
                SlideShape::Table(vec![vec!["a".into(), "b".into()]]),
                SlideShape::Picture { rid: "rId3".into() },
            ],
            Some("Say hi"),
        );
        let pics = vec!["![](a.png)".to_string(), "![](b.png)".to_string()];
        assert_eq!(
            render_slide(&s, &pics, true),
            "## Slide 3\n\n![](a.png)\n\n| a | b |\n| --- | --- |\n\n![](b.png)\n\n**Notes:**\n\nSay hi\n\n---\n\n"
        );
        assert!(!render_slide(&s, &pics, false).contains("Notes"));
    }

    #[test]
    fn dropped_pictures_leave_no_trace() {
        let s = slide(vec![SlideShape::Picture { rid: "rId2".into() }], None);
        assert_eq!(render_slide(&s, &[String::new()], true), "## Slide 3\n\n---\n\n");
    }
}
