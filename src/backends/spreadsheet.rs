//! XLSX: one `##` section per worksheet holding a pipe table of its rows.

use crate::config::ConversionConfig;
use crate::error::Office2MdError;
use crate::ooxml::xlsx::{read_workbook, Sheet, Workbook};
use crate::ooxml::Package;
use crate::pipeline::postprocess;
use crate::pipeline::sink::ImageSink;
use crate::pipeline::tables::render_pipe_table;
use std::path::Path;
use tracing::debug;

use super::BackendOutput;

pub fn convert(
    path: &Path,
    config: &ConversionConfig,
    _sink: &mut ImageSink,
) -> Result<BackendOutput, Office2MdError> {
    let mut pkg = Package::open(path)?;
    let workbook = read_workbook(&mut pkg)?;
    debug!("Workbook has {} sheets", workbook.sheets.len());
    let markdown = render_workbook(&workbook, config.include_all_sheets);
    Ok(BackendOutput::new(postprocess::normalize(&markdown), 0))
}

/// Render every sheet, or only the active one.
pub fn render_workbook(workbook: &Workbook, include_all_sheets: bool) -> String {
    let sheets: Vec<&Sheet> = if include_all_sheets {
        workbook.sheets.iter().collect()
    } else {
        workbook.active_sheet().into_iter().collect()
    };

    let mut out = String::new();
    for sheet in sheets {
        out.push_str(&format!("## {}\n\n", sheet.name));
        let table = render_pipe_table(&sheet.rows);
        if table.is_empty() {
            out.push_str("*Empty sheet*\n\n");
        } else {
            out.push_str(&table);
            out.push_str("\n\n");
        }
    }
    out
}
