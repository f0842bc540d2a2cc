//! Workbook reading: first sheet, header-mapped columns, raw rows.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{NaiveDate, NaiveDateTime};

use tr_core::export::{
    COL_BILLABLE, COL_COMPANY, COL_DATE, COL_DURATION, COL_END_TIME, COL_ID, COL_NOTE,
    COL_PARENT_TASK, COL_PROJECT, COL_START_TIME, COL_TASK, COL_TASK_LIST,
    COL_TASK_LIST_FALLBACK, COL_USER,
};
use tr_core::normalize::{Cell, RawRow};

use crate::SheetError;

/// Reads raw rows from an in-memory or streamed workbook.
///
/// Only the first sheet is read. Extra columns are ignored; a missing
/// required column aborts with [`SheetError::MissingColumn`].
pub fn read_rows<RS: Read + Seek>(reader: RS) -> Result<Vec<RawRow>, SheetError> {
    let mut workbook = Xlsx::new(reader)?;
    extract_rows(&mut workbook)
}

/// Reads raw rows from a workbook on disk.
pub fn read_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<RawRow>, SheetError> {
    let mut workbook: Xlsx<BufReader<File>> = open_workbook(path)?;
    extract_rows(&mut workbook)
}

fn extract_rows<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> Result<Vec<RawRow>, SheetError> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoSheets)??;

    let mut row_iter = range.rows();
    let header = row_iter.next().ok_or(SheetError::NoHeader)?;
    let columns = Columns::from_header(header)?;

    let mut rows = Vec::new();
    for cells in row_iter {
        if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        rows.push(columns.pick(cells));
    }
    tracing::debug!(rows = rows.len(), "read report sheet");
    Ok(rows)
}

/// Column positions resolved from the header row.
#[derive(Debug)]
struct Columns {
    user: usize,
    date: usize,
    start_time: usize,
    end_time: usize,
    duration: usize,
    billable: usize,
    note: usize,
    project: usize,
    company: usize,
    task: usize,
    parent_task: usize,
    task_list: usize,
}

impl Columns {
    fn from_header(header: &[Data]) -> Result<Self, SheetError> {
        let find = |name: &'static str| -> Result<usize, SheetError> {
            header
                .iter()
                .position(|cell| header_matches(cell, name))
                .ok_or(SheetError::MissingColumn(name))
        };

        // `Id` is part of the required header contract even though the
        // engine never trusts its values.
        find(COL_ID)?;

        Ok(Self {
            user: find(COL_USER)?,
            date: find(COL_DATE)?,
            start_time: find(COL_START_TIME)?,
            end_time: find(COL_END_TIME)?,
            duration: find(COL_DURATION)?,
            billable: find(COL_BILLABLE)?,
            note: find(COL_NOTE)?,
            project: find(COL_PROJECT)?,
            company: find(COL_COMPANY)?,
            task: find(COL_TASK)?,
            parent_task: find(COL_PARENT_TASK)?,
            task_list: find(COL_TASK_LIST).or_else(|_| find(COL_TASK_LIST_FALLBACK))?,
        })
    }

    fn pick(&self, cells: &[Data]) -> RawRow {
        let cell = |idx: usize| cells.get(idx).map(convert_cell).unwrap_or_default();
        RawRow {
            user: cell(self.user),
            date: cell(self.date),
            start_time: cell(self.start_time),
            end_time: cell(self.end_time),
            duration_seconds: cell(self.duration),
            billable: cell(self.billable),
            note: cell(self.note),
            project: cell(self.project),
            client: cell(self.company),
            task: cell(self.task),
            parent_task: cell(self.parent_task),
            task_list: cell(self.task_list),
        }
    }
}

fn header_matches(cell: &Data, name: &str) -> bool {
    match cell {
        Data::String(s) => s.trim() == name,
        _ => false,
    }
}

/// Maps a worksheet cell into the engine's container-independent cell.
fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Empty, Cell::DateTime),
        Data::DateTimeIso(s) => parse_iso(s).map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// ISO datetime strings show up in exports from other tools.
fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
