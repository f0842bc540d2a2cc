//! Row normalization: raw worksheet cells into canonical primitives.
//!
//! The source format is messy: name fields carry decoration characters,
//! dates and times arrive either as native datetime cells, as Excel serial
//! numbers, or as strings in `M/D/YY[ H:MM]` / `H:MM[:SS]` form. Everything
//! downstream works on the normalized output of this module.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

/// Characters stripped from both ends of every name field.
const NAME_DECORATIONS: &[char] = &['#', '@', '$', '%', '&', '*', '_', '-'];

/// Excel serial day 0.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A reason to reject a single row. Rejections are counted and logged; they
/// never abort the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing user name")]
    MissingUser,

    #[error("no user matches {0:?}")]
    UnknownUser(String),

    #[error("missing project name")]
    MissingProject,

    #[error("missing task name")]
    MissingTask,

    #[error("unparseable {column} cell: {value:?}")]
    BadDateTime {
        column: &'static str,
        value: String,
    },

    #[error("unparseable duration: {0:?}")]
    BadDuration(String),

    #[error("non-positive duration: {0}")]
    InvalidDuration(i64),
}

/// A single worksheet cell, decoupled from the container library.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Returns the trimmed text content, or `None` for empty/blank cells.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Empty => "<empty>".to_string(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::DateTime(dt) => dt.to_string(),
        }
    }
}

/// One record from the input sheet, cells picked out by header name.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub user: Cell,
    pub date: Cell,
    pub start_time: Cell,
    pub end_time: Cell,
    pub duration_seconds: Cell,
    pub billable: Cell,
    pub note: Cell,
    pub project: Cell,
    pub client: Cell,
    pub task: Cell,
    pub parent_task: Cell,
    pub task_list: Cell,
}

/// Canonical values for one row, ready for resolution.
///
/// Name fields are cleaned but not checked for presence; the import pipeline
/// validates user/project/task before touching the resolver so a rejected
/// row never creates entities.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub user_name: String,
    pub project: String,
    pub client: Option<String>,
    pub task_list: Option<String>,
    pub parent_task: Option<String>,
    pub task: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
    pub billable: bool,
    pub note: Option<String>,
}

/// Strips decoration characters and whitespace from both ends of a name.
///
/// Idempotent: cleaning an already-clean name is a no-op.
#[must_use]
pub fn clean_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || NAME_DECORATIONS.contains(&c))
        .to_string()
}

fn cleaned(cell: &Cell) -> String {
    cell.text().map(clean_name).unwrap_or_default()
}

fn cleaned_opt(cell: &Cell) -> Option<String> {
    let name = cleaned(cell);
    (!name.is_empty()).then_some(name)
}

fn excel_epoch() -> NaiveDate {
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Parses a date-bearing cell into its calendar day.
fn parse_date(cell: &Cell, column: &'static str) -> Result<NaiveDate, RowError> {
    let bad = || RowError::BadDateTime {
        column,
        value: cell.describe(),
    };

    match cell {
        Cell::DateTime(dt) => Ok(dt.date()),
        #[allow(clippy::cast_possible_truncation)]
        Cell::Number(serial) if serial.is_finite() && *serial >= 0.0 => excel_epoch()
            .checked_add_signed(Duration::days(serial.trunc() as i64))
            .ok_or_else(bad),
        Cell::Text(s) => parse_date_string(s).ok_or_else(bad),
        _ => Err(bad()),
    }
}

/// Parses `M/D/YY` or `M/D/YYYY`, ignoring an optional trailing ` H:MM`
/// (the combine step overwrites the time-of-day anyway). Two-digit years
/// mean the 2000s.
fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let date_part = s.trim().split_whitespace().next()?;
    let mut parts = date_part.split('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_raw: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let year = if year_raw < 100 { year_raw + 2000 } else { year_raw };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a time-bearing cell into a time-of-day.
fn parse_time(cell: &Cell, column: &'static str) -> Result<NaiveTime, RowError> {
    let bad = || RowError::BadDateTime {
        column,
        value: cell.describe(),
    };

    match cell {
        // Native value: only the hour/minute/second components count, any
        // date baked into the cell is ignored.
        Cell::DateTime(dt) => Ok(dt.time()),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Cell::Number(fraction) if fraction.is_finite() && *fraction >= 0.0 => {
            let secs = (fraction.fract() * SECONDS_PER_DAY).round() as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs % 86_400, 0).ok_or_else(bad)
        }
        Cell::Text(s) => parse_time_string(s).ok_or_else(bad),
        _ => Err(bad()),
    }
}

/// Parses `H:MM` or `H:MM:SS`.
fn parse_time_string(s: &str) -> Option<NaiveTime> {
    let mut parts = s.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = match parts.next() {
        Some(sec) => sec.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Parses the raw duration column. Presence is required; the `> 0` check
/// happens at materialization.
fn parse_duration(cell: &Cell) -> Result<i64, RowError> {
    let bad = || RowError::BadDuration(cell.describe());
    match cell {
        #[allow(clippy::cast_possible_truncation)]
        Cell::Number(n) if n.is_finite() => Ok(n.round() as i64),
        #[allow(clippy::cast_possible_truncation)]
        Cell::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.round() as i64))
                .ok_or_else(bad)
        }
        _ => Err(bad()),
    }
}

/// Parses the billable column. Empty cells default to not billable.
fn parse_billable(cell: &Cell) -> bool {
    match cell {
        Cell::Bool(b) => *b,
        Cell::Number(n) => *n != 0.0,
        Cell::Text(s) => {
            let t = s.trim();
            t.eq_ignore_ascii_case("true") || t == "1"
        }
        _ => false,
    }
}

/// Converts one raw row into canonical primitives.
///
/// The absolute start/end timestamps are built by taking the date cell's
/// calendar day and overwriting its time-of-day with the respective time
/// cell. An end at or before the start is read as crossing midnight (start
/// and end share one date cell in the source) and rolls forward one day.
pub fn normalize_row(row: &RawRow) -> Result<NormalizedRow, RowError> {
    let date = parse_date(&row.date, "Date")?;
    let start_time = parse_time(&row.start_time, "Start Time")?;
    let end_time = parse_time(&row.end_time, "End Time")?;

    let start = date.and_time(start_time).and_utc();
    let mut end = date.and_time(end_time).and_utc();
    if end <= start {
        end += Duration::days(1);
    }

    Ok(NormalizedRow {
        user_name: row.user.text().map(str::to_string).unwrap_or_default(),
        project: cleaned(&row.project),
        client: cleaned_opt(&row.client),
        task_list: cleaned_opt(&row.task_list),
        parent_task: cleaned_opt(&row.parent_task),
        task: cleaned(&row.task),
        start,
        end,
        duration_seconds: parse_duration(&row.duration_seconds)?,
        billable: parse_billable(&row.billable),
        note: row.note.text().map(str::to_string),
    })
}
