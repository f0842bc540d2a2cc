//! The import pipeline: normalize, resolve, materialize, aggregate.
//!
//! Rows stream once through the pipeline; each row is independent except
//! for the shared [`ResolveContext`]. A malformed row is rejected and
//! logged individually, never aborting the batch. Aggregation runs once
//! after all rows are consumed.

use std::collections::HashMap;

use crate::aggregate::{OrphanReport, assign_tracked_time};
use crate::ids::IdGenerator;
use crate::model::{ImportStats, Project, TimeEntry, User};
use crate::normalize::{NormalizedRow, RawRow, RowError, normalize_row};
use crate::resolve::ResolveContext;

/// Entries whose duration disagrees with `end - start` by more than this
/// many seconds are flagged (counted and logged, not rejected). The source
/// supplies duration independently of the timestamps.
pub const DURATION_TOLERANCE_SECONDS: i64 = 60;

/// Outcome of one import run.
///
/// `new_projects` holds only projects created this run; the caller merges
/// them with its own set. `updated_projects` carries back caller-supplied
/// projects that rows resolved into (new lists/tasks, refreshed totals).
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub new_projects: Vec<Project>,
    pub updated_projects: Vec<Project>,
    pub entries: Vec<TimeEntry>,
    pub stats: ImportStats,
    pub orphans: OrphanReport,
}

/// Runs the full import pipeline over already-extracted rows.
///
/// `users` is the externally supplied user list; rows are matched against
/// it by case-insensitive exact name and never create users. Existing
/// projects are merged by normalized name, not duplicated.
pub fn import_rows<G: IdGenerator>(
    rows: &[RawRow],
    users: &[User],
    existing_projects: &[Project],
    ids: G,
) -> ImportResult {
    let user_index: HashMap<String, &User> = users
        .iter()
        .map(|user| (user.name.to_lowercase(), user))
        .collect();

    let mut ctx = ResolveContext::new(existing_projects, ids);
    let mut entries: Vec<TimeEntry> = Vec::new();
    let mut rows_skipped = 0usize;
    let mut duration_mismatches = 0usize;

    for (index, raw) in rows.iter().enumerate() {
        match materialize_row(&mut ctx, &user_index, raw) {
            Ok(entry) => {
                if duration_disagrees(&entry) {
                    duration_mismatches += 1;
                    tracing::warn!(
                        row = index + 1,
                        entry = %entry.id,
                        duration = entry.duration_seconds,
                        elapsed = (entry.end_time - entry.start_time).num_seconds(),
                        "duration disagrees with timestamps"
                    );
                }
                entries.push(entry);
            }
            Err(error) => {
                rows_skipped += 1;
                tracing::warn!(
                    row = index + 1,
                    user = raw.user.text().unwrap_or(""),
                    task = raw.task.text().unwrap_or(""),
                    %error,
                    "skipping row"
                );
            }
        }
    }

    let resolution = ctx.finish();
    let mut forest = resolution.forest;
    let orphans = assign_tracked_time(&mut forest, &entries);

    let mut stats = resolution.stats;
    stats.entries_imported = entries.len();
    stats.rows_skipped = rows_skipped;
    stats.duration_mismatches = duration_mismatches;

    let mut new_projects = Vec::new();
    let mut updated_projects = Vec::new();
    for project in forest {
        if resolution.new_project_ids.contains(&project.id) {
            new_projects.push(project);
        } else if resolution.touched_project_ids.contains(&project.id) {
            updated_projects.push(project);
        }
        // Untouched caller-supplied projects are dropped; the caller still
        // owns its originals.
    }

    tracing::debug!(
        projects = stats.projects_created,
        tasks = stats.tasks_created,
        entries = stats.entries_imported,
        skipped = stats.rows_skipped,
        "import finished"
    );

    ImportResult {
        new_projects,
        updated_projects,
        entries,
        stats,
        orphans,
    }
}

/// Validates one row and materializes its time entry.
///
/// All checks run before the resolver is touched, so a rejected row never
/// creates entities.
fn materialize_row<G: IdGenerator>(
    ctx: &mut ResolveContext<G>,
    user_index: &HashMap<String, &User>,
    raw: &RawRow,
) -> Result<TimeEntry, RowError> {
    let row = normalize_row(raw)?;

    if row.user_name.is_empty() {
        return Err(RowError::MissingUser);
    }
    let user = user_index
        .get(&row.user_name.to_lowercase())
        .copied()
        .ok_or_else(|| RowError::UnknownUser(row.user_name.clone()))?;

    if row.project.is_empty() {
        return Err(RowError::MissingProject);
    }
    if row.task.is_empty() {
        return Err(RowError::MissingTask);
    }
    if row.duration_seconds <= 0 {
        return Err(RowError::InvalidDuration(row.duration_seconds));
    }

    let project_id = ctx.resolve_project(&row.project, row.client.as_deref());
    let list_id = ctx.resolve_list(&project_id, row.task_list.as_deref());
    let task_id = ctx.resolve_task(
        &project_id,
        &list_id,
        row.parent_task.as_deref(),
        &row.task,
        row.billable,
    );

    Ok(build_entry(ctx.generate_id(), task_id, project_id, user, &row))
}

fn build_entry(
    id: String,
    task_id: String,
    project_id: String,
    user: &User,
    row: &NormalizedRow,
) -> TimeEntry {
    TimeEntry {
        id,
        task_id,
        project_id,
        user_id: user.id.clone(),
        start_time: row.start,
        end_time: row.end,
        duration_seconds: row.duration_seconds,
        billable: row.billable,
        note: row.note.clone(),
    }
}

fn duration_disagrees(entry: &TimeEntry) -> bool {
    let elapsed = (entry.end_time - entry.start_time).num_seconds();
    (entry.duration_seconds - elapsed).abs() > DURATION_TOLERANCE_SECONDS
}
