//! Plain-data model for the reconciled project forest and its time entries.
//!
//! Everything here is created fresh per import run and handed back to the
//! caller; the engine keeps no state across calls. Serde renames follow the
//! camelCase wire vocabulary of the surrounding application.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status copied onto newly created projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Open,
    Archived,
}

impl ProjectStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of one tree in the forest.
///
/// At most one `Project` exists per normalized (name, client) pair within a
/// single import run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Opaque id, generated per run.
    pub id: String,

    /// Normalized project name.
    pub name: String,

    /// Normalized client name, if the source carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    /// Display color, derived deterministically from the name.
    pub color: String,

    /// Pass-through metadata, defaulted on creation.
    #[serde(default)]
    pub status: ProjectStatus,

    /// Pass-through metadata, defaulted on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_hours: Option<f64>,

    /// Pass-through metadata, defaulted on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    /// Pass-through metadata, defaulted on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Ordered task lists, in first-sighting order.
    #[serde(default)]
    pub task_lists: Vec<TaskList>,
}

impl Project {
    /// Creates an empty project with default pass-through metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client: Option<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            client,
            color: color.into(),
            status: ProjectStatus::default(),
            budget_hours: None,
            start_date: None,
            end_date: None,
            task_lists: Vec::new(),
        }
    }
}

/// A named grouping of tasks within a project.
///
/// Unique per (project, normalized title); the id is derived from the
/// project id plus the title rather than generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskList {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tasks: Vec::new(),
        }
    }
}

/// A task belonging to exactly one task list.
///
/// Tasks may carry subtasks but never nest further.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub billable: bool,
    /// Sum of durations over all entries referencing this task.
    /// Assigned by the aggregation pass, zero until then.
    #[serde(default)]
    pub time_tracked_seconds: i64,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, billable: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            billable,
            time_tracked_seconds: 0,
            subtasks: Vec::new(),
        }
    }
}

/// A leaf task belonging to exactly one parent task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub billable: bool,
    /// Sum of durations over all entries referencing this subtask.
    #[serde(default)]
    pub time_tracked_seconds: i64,
}

impl Subtask {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, billable: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            billable,
            time_tracked_seconds: 0,
        }
    }
}

/// One materialized time entry.
///
/// `task_id` is type-erased: it references either a [`Task`] or a
/// [`Subtask`]. `duration_seconds` is taken from the source column as-is and
/// is not required to equal `end_time - start_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    /// Id of the owning task or subtask.
    pub task_id: String,
    pub project_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    #[serde(default)]
    pub billable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An externally supplied user. Never created by this engine; rows are
/// matched against the supplied list by case-insensitive exact name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Counters surfaced to the caller after an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub projects_created: usize,
    pub task_lists_created: usize,
    pub tasks_created: usize,
    pub subtasks_created: usize,
    pub entries_imported: usize,
    /// Rows rejected at the row level (bad cells, unknown user, ...).
    pub rows_skipped: usize,
    /// Entries whose duration disagrees with `end - start` beyond tolerance.
    pub duration_mismatches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_project_new_defaults() {
        let project = Project::new("p1", "Launch", Some("Acme".to_string()), "#1e88e5");
        assert_eq!(project.status, ProjectStatus::Open);
        assert!(project.task_lists.is_empty());
        assert!(project.budget_hours.is_none());
    }

    #[test]
    fn test_time_entry_serde_uses_camel_case() {
        let entry = TimeEntry {
            id: "e1".to_string(),
            task_id: "t1".to_string(),
            project_id: "p1".to_string(),
            user_id: "u1".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 1, 2, 10, 30, 0).unwrap(),
            duration_seconds: 5400,
            billable: true,
            note: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["taskId"], "t1");
        assert_eq!(json["durationSeconds"], 5400);
        assert!(json.get("note").is_none());

        let parsed: TimeEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_task_aggregation_field_defaults_on_deserialize() {
        let json = r#"{"id":"t1","title":"Design","subtasks":[]}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.time_tracked_seconds, 0);
        assert!(!task.billable);
    }
}
