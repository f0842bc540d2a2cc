//! Core logic for the time-report reconciliation engine.
//!
//! This crate reconstructs a consistent project/task/subtask forest from
//! flat, redundant, occasionally malformed report rows, and flattens it
//! back for export:
//! - Normalization: tolerant parsing of heterogeneous date/time/name cells
//! - Resolution: name-keyed deduplication of projects, lists, tasks, subtasks
//! - Aggregation: tracked seconds per node, with orphan detection
//! - Export: the inverse transform back to the flat row schema
//!
//! The engine is a pure, synchronous batch transform: it holds no state
//! across calls and performs no I/O (the container boundary lives in
//! `tr-sheet`).

pub mod aggregate;
pub mod export;
pub mod ids;
pub mod import;
pub mod model;
pub mod normalize;
pub mod resolve;

pub use aggregate::{OrphanReport, OrphanedEntry, assign_tracked_time};
pub use export::{EXPORT_HEADERS, ExportRow, export_rows};
pub use ids::{IdGenerator, SequenceIds, UuidIds};
pub use import::{ImportResult, import_rows};
pub use model::{ImportStats, Project, Subtask, Task, TaskList, TimeEntry, User};
pub use normalize::{Cell, NormalizedRow, RawRow, RowError, clean_name};
pub use resolve::{DEFAULT_LIST_TITLE, ResolveContext};
