//! Post-pass aggregation of tracked seconds onto the forest.
//!
//! One pass over the entries builds an id -> seconds map, one pass over the
//! forest assigns it. Re-filtering the entry list per node would be
//! O(nodes * entries) and does not scale to tens of thousands of rows.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{Project, TimeEntry};

/// How many orphaned entries to keep as a diagnostic sample.
pub const ORPHAN_SAMPLE_LIMIT: usize = 10;

/// One orphaned entry in the diagnostic sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedEntry {
    pub entry_id: String,
    pub task_id: String,
}

/// Entries whose `task_id` matches no node in the forest.
///
/// Orphans indicate a resolver/materializer mismatch; they are surfaced as a
/// warning, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReport {
    pub count: usize,
    /// At most [`ORPHAN_SAMPLE_LIMIT`] of the orphaned entries.
    pub sample: Vec<OrphanedEntry>,
}

impl OrphanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Assigns `time_tracked_seconds` to every task and subtask in the forest
/// and reports entries that reference no node.
///
/// Entry order is irrelevant; totals are sums over all matching entries.
pub fn assign_tracked_time(forest: &mut [Project], entries: &[TimeEntry]) -> OrphanReport {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for entry in entries {
        *totals.entry(entry.task_id.as_str()).or_default() += entry.duration_seconds;
    }

    let mut known: HashSet<String> = HashSet::new();
    for project in forest.iter_mut() {
        for list in &mut project.task_lists {
            for task in &mut list.tasks {
                task.time_tracked_seconds = totals.get(task.id.as_str()).copied().unwrap_or(0);
                known.insert(task.id.clone());
                for subtask in &mut task.subtasks {
                    subtask.time_tracked_seconds =
                        totals.get(subtask.id.as_str()).copied().unwrap_or(0);
                    known.insert(subtask.id.clone());
                }
            }
        }
    }

    let mut report = OrphanReport::default();
    for entry in entries {
        if !known.contains(&entry.task_id) {
            report.count += 1;
            if report.sample.len() < ORPHAN_SAMPLE_LIMIT {
                report.sample.push(OrphanedEntry {
                    entry_id: entry.id.clone(),
                    task_id: entry.task_id.clone(),
                });
            }
        }
    }

    if !report.is_empty() {
        tracing::warn!(
            orphans = report.count,
            "time entries reference tasks missing from the forest"
        );
    }
    report
}
