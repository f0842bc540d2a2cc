//! Inverse transform: forest + entries back into the flat row schema.
//!
//! Column names are a wire contract, not cosmetic labels; the import path
//! round-trips through them. Owning-task lookups go through one index built
//! over the forest up front, keeping export linear in entries + nodes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{Project, TimeEntry, User};

pub const COL_USER: &str = "User";
pub const COL_DATE: &str = "Date";
pub const COL_START_TIME: &str = "Start Time";
pub const COL_END_TIME: &str = "End Time";
pub const COL_DATE_UTC: &str = "Date (UTC)";
pub const COL_START_TIME_UTC: &str = "Start Time (UTC)";
pub const COL_END_TIME_UTC: &str = "End Time (UTC)";
pub const COL_DURATION: &str = "Duration in Seconds";
pub const COL_BILLABLE: &str = "Is Billable";
pub const COL_NOTE: &str = "Note";
pub const COL_PROJECT: &str = "Project Name";
pub const COL_COMPANY: &str = "Company Name";
pub const COL_TASK: &str = "Task Name";
pub const COL_PARENT_TASK: &str = "Parent Task Name";
pub const COL_TASK_LIST: &str = "TaskList";
/// Some exports label the task-list column in the plural.
pub const COL_TASK_LIST_FALLBACK: &str = "Task Lists";
pub const COL_ID: &str = "Id";

/// The fixed column order of an exported report sheet.
///
/// The UTC-labeled columns duplicate the local values; the source format
/// carries both but populates them identically, a quirk kept for
/// compatibility.
pub const EXPORT_HEADERS: [&str; 16] = [
    COL_USER,
    COL_DATE,
    COL_START_TIME,
    COL_END_TIME,
    COL_DATE_UTC,
    COL_START_TIME_UTC,
    COL_END_TIME_UTC,
    COL_DURATION,
    COL_BILLABLE,
    COL_NOTE,
    COL_PROJECT,
    COL_COMPANY,
    COL_TASK,
    COL_PARENT_TASK,
    COL_TASK_LIST,
    COL_ID,
];

/// One flat row ready for serialization.
///
/// `billable` is the entry's own flag, never the owning task's.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub entry_id: String,
    pub user_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
    pub billable: bool,
    pub note: Option<String>,
    pub project_name: String,
    pub client: Option<String>,
    pub task_name: String,
    pub parent_task_name: Option<String>,
    pub list_title: String,
}

/// Where a task-or-subtask id lives in the forest.
struct NodePath<'a> {
    project: &'a Project,
    list_title: &'a str,
    task_name: &'a str,
    parent_task_name: Option<&'a str>,
}

/// Builds the id -> node index once, up front.
fn index_forest(forest: &[Project]) -> HashMap<&str, NodePath<'_>> {
    let mut index = HashMap::new();
    for project in forest {
        for list in &project.task_lists {
            for task in &list.tasks {
                index.insert(
                    task.id.as_str(),
                    NodePath {
                        project,
                        list_title: &list.title,
                        task_name: &task.title,
                        parent_task_name: None,
                    },
                );
                for subtask in &task.subtasks {
                    index.insert(
                        subtask.id.as_str(),
                        NodePath {
                            project,
                            list_title: &list.title,
                            task_name: &subtask.title,
                            parent_task_name: Some(&task.title),
                        },
                    );
                }
            }
        }
    }
    index
}

/// Flattens entries against the forest into export rows.
///
/// Entries whose task or user cannot be found are skipped with a warning;
/// they could not survive a re-import anyway.
#[must_use]
pub fn export_rows(entries: &[TimeEntry], forest: &[Project], users: &[User]) -> Vec<ExportRow> {
    let nodes = index_forest(forest);
    let user_names: HashMap<&str, &str> = users
        .iter()
        .map(|user| (user.id.as_str(), user.name.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(node) = nodes.get(entry.task_id.as_str()) else {
            tracing::warn!(entry = %entry.id, task = %entry.task_id, "skipping entry with unknown task");
            continue;
        };
        let Some(user_name) = user_names.get(entry.user_id.as_str()) else {
            tracing::warn!(entry = %entry.id, user = %entry.user_id, "skipping entry with unknown user");
            continue;
        };

        rows.push(ExportRow {
            entry_id: entry.id.clone(),
            user_name: (*user_name).to_string(),
            start: entry.start_time,
            end: entry.end_time,
            duration_seconds: entry.duration_seconds,
            billable: entry.billable,
            note: entry.note.clone(),
            project_name: node.project.name.clone(),
            client: node.project.client.clone(),
            task_name: node.task_name.to_string(),
            parent_task_name: node.parent_task_name.map(str::to_string),
            list_title: node.list_title.to_string(),
        });
    }
    rows
}
