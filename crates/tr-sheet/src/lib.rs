//! Spreadsheet container boundary for the reconciliation engine.
//!
//! Reads the first worksheet of an `.xlsx` report into raw rows for
//! `tr-core`, and serializes export rows back into an `.xlsx` workbook.
//! Row-level problems are `tr-core`'s business (skip and log); this crate
//! owns the batch-level failures: an unreadable container, a workbook with
//! no sheets, a header row missing a required column, or a serialization
//! error. Those abort the whole operation with a single error and no
//! partial result.

mod read;
mod write;

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

use tr_core::ids::IdGenerator;
use tr_core::import::{ImportResult, import_rows};
use tr_core::model::{Project, TimeEntry, User};

pub use read::{read_rows, read_rows_from_path};
pub use write::{write_report, write_report_to_path};

/// Batch-level container errors.
#[derive(Debug, Error)]
pub enum SheetError {
    /// The workbook could not be opened or parsed.
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    /// The workbook has no sheets.
    #[error("workbook contains no sheets")]
    NoSheets,

    /// The first sheet has no header row.
    #[error("sheet has no header row")]
    NoHeader,

    /// The header row lacks a required column.
    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),

    /// The workbook could not be serialized.
    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

/// Reads a report workbook and runs the full import pipeline.
pub fn import_report<RS, G>(
    reader: RS,
    users: &[User],
    existing_projects: &[Project],
    ids: G,
) -> Result<ImportResult, SheetError>
where
    RS: Read + Seek,
    G: IdGenerator,
{
    let rows = read_rows(reader)?;
    Ok(import_rows(&rows, users, existing_projects, ids))
}

/// [`import_report`] for a workbook on disk.
pub fn import_report_from_path<G: IdGenerator>(
    path: impl AsRef<Path>,
    users: &[User],
    existing_projects: &[Project],
    ids: G,
) -> Result<ImportResult, SheetError> {
    let rows = read_rows_from_path(path)?;
    Ok(import_rows(&rows, users, existing_projects, ids))
}

/// Flattens entries against the forest and serializes them to an in-memory
/// workbook, one sheet named for the report.
pub fn export_report(
    entries: &[TimeEntry],
    forest: &[Project],
    users: &[User],
    report_name: &str,
) -> Result<Vec<u8>, SheetError> {
    let rows = tr_core::export::export_rows(entries, forest, users);
    write_report(&rows, report_name)
}

/// [`export_report`] straight to a file.
pub fn export_report_to_path(
    entries: &[TimeEntry],
    forest: &[Project],
    users: &[User],
    report_name: &str,
    path: impl AsRef<Path>,
) -> Result<(), SheetError> {
    let rows = tr_core::export::export_rows(entries, forest, users);
    write_report_to_path(&rows, report_name, path)
}
