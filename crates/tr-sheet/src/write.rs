//! Workbook writing: export rows into a single named sheet.

use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use tr_core::export::{EXPORT_HEADERS, ExportRow};

use crate::SheetError;

/// Hard limit the container imposes on sheet names.
const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters the container forbids in sheet names.
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Date format the import path parses back (`M/D/YY`).
const DATE_FORMAT: &str = "%-m/%-d/%y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Serializes export rows into an in-memory workbook.
pub fn write_report(rows: &[ExportRow], report_name: &str) -> Result<Vec<u8>, SheetError> {
    let mut workbook = build_workbook(rows, report_name)?;
    Ok(workbook.save_to_buffer()?)
}

/// Serializes export rows straight to a file.
pub fn write_report_to_path(
    rows: &[ExportRow],
    report_name: &str,
    path: impl AsRef<Path>,
) -> Result<(), SheetError> {
    let mut workbook = build_workbook(rows, report_name)?;
    workbook.save(path)?;
    Ok(())
}

fn build_workbook(rows: &[ExportRow], report_name: &str) -> Result<Workbook, SheetError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sanitize_sheet_name(report_name))?;

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string(0, col_num(col), *header)?;
    }
    for (index, row) in rows.iter().enumerate() {
        write_row(sheet, u32::try_from(index + 1).unwrap_or(u32::MAX), row)?;
    }
    tracing::debug!(rows = rows.len(), sheet = %sanitize_sheet_name(report_name), "wrote report sheet");
    Ok(workbook)
}

/// Writes one entry row in the fixed column order of [`EXPORT_HEADERS`].
#[allow(clippy::cast_precision_loss)]
fn write_row(sheet: &mut Worksheet, row: u32, data: &ExportRow) -> Result<(), SheetError> {
    let date = data.start.format(DATE_FORMAT).to_string();
    let start = data.start.format(TIME_FORMAT).to_string();
    let end = data.end.format(TIME_FORMAT).to_string();

    sheet.write_string(row, 0, &data.user_name)?;
    sheet.write_string(row, 1, &date)?;
    sheet.write_string(row, 2, &start)?;
    sheet.write_string(row, 3, &end)?;
    // The source format carries "UTC" duplicates of the local columns and
    // populates them identically; kept as-is for compatibility.
    sheet.write_string(row, 4, &date)?;
    sheet.write_string(row, 5, &start)?;
    sheet.write_string(row, 6, &end)?;
    sheet.write_number(row, 7, data.duration_seconds as f64)?;
    sheet.write_string(row, 8, if data.billable { "TRUE" } else { "FALSE" })?;
    sheet.write_string(row, 9, data.note.as_deref().unwrap_or(""))?;
    sheet.write_string(row, 10, &data.project_name)?;
    sheet.write_string(row, 11, data.client.as_deref().unwrap_or(""))?;
    sheet.write_string(row, 12, &data.task_name)?;
    sheet.write_string(row, 13, data.parent_task_name.as_deref().unwrap_or(""))?;
    sheet.write_string(row, 14, &data.list_title)?;
    sheet.write_string(row, 15, &data.entry_id)?;
    Ok(())
}

fn col_num(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

/// Clamps a report name to something the container accepts as a sheet name.
fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return "Report".to_string();
    }
    trimmed.chars().take(MAX_SHEET_NAME_LEN).collect()
}
