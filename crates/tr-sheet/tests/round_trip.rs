//! End-to-end tests over the container boundary: build a report workbook,
//! import it, export the result, and import that again.

use std::io::Cursor;

use rust_xlsxwriter::Workbook;

use tr_core::ids::SequenceIds;
use tr_core::model::User;
use tr_sheet::{SheetError, export_report, export_report_to_path, import_report};

/// Column layout of a hand-built input workbook. Deliberately ordered
/// differently from the engine's export layout, with an extra column thrown
/// in: import matches columns by header name and ignores the rest.
const INPUT_HEADERS: [&str; 14] = [
    "Id",
    "User",
    "Project Name",
    "Company Name",
    "TaskList",
    "Task Name",
    "Parent Task Name",
    "Date",
    "Start Time",
    "End Time",
    "Duration in Seconds",
    "Is Billable",
    "Note",
    "Billing Rate",
];

fn build_workbook(rows: &[[&str; 14]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in INPUT_HEADERS.iter().enumerate() {
        sheet
            .write_string(0, u16::try_from(col).unwrap(), *header)
            .unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet
                .write_string(
                    u32::try_from(r).unwrap() + 1,
                    u16::try_from(c).unwrap(),
                    *value,
                )
                .unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn users() -> Vec<User> {
    vec![User::new("u-ana", "Ana"), User::new("u-ben", "Ben")]
}

#[allow(clippy::too_many_arguments)]
fn row<'a>(
    user: &'a str,
    project: &'a str,
    list: &'a str,
    task: &'a str,
    parent: &'a str,
    date: &'a str,
    start: &'a str,
    end: &'a str,
    duration: &'a str,
    billable: &'a str,
    note: &'a str,
) -> [&'a str; 14] {
    [
        "src-id", user, project, "", list, task, parent, date, start, end, duration, billable,
        note, "120",
    ]
}

#[test]
fn test_duplicate_task_rows_merge_and_aggregate() {
    let bytes = build_workbook(&[
        row("Ana", "Launch", "", "Design", "", "1/2/25", "09:00", "10:30", "5400", "TRUE", ""),
        row("Ana", "Launch", "", "Design", "", "1/2/25", "11:00", "11:30", "1800", "TRUE", ""),
    ]);

    let result = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("run")).unwrap();

    assert_eq!(result.new_projects.len(), 1);
    let project = &result.new_projects[0];
    assert_eq!(project.name, "Launch");
    assert_eq!(project.task_lists.len(), 1);
    assert_eq!(project.task_lists[0].title, "General");
    assert_eq!(project.task_lists[0].tasks.len(), 1);
    assert_eq!(project.task_lists[0].tasks[0].title, "Design");
    assert_eq!(project.task_lists[0].tasks[0].time_tracked_seconds, 7200);
    assert_eq!(result.entries.len(), 2);
    assert!(result.orphans.is_empty());
}

#[test]
fn test_row_with_empty_date_is_skipped() {
    let bytes = build_workbook(&[
        row("Ana", "Launch", "", "Design", "", "", "09:00", "10:00", "3600", "TRUE", ""),
        row("Ana", "Launch", "", "Design", "", "1/2/25", "11:00", "12:00", "3600", "TRUE", ""),
    ]);

    let result = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("run")).unwrap();

    assert_eq!(result.stats.rows_skipped, 1);
    assert_eq!(result.stats.entries_imported, 1);
}

#[test]
fn test_missing_required_column_aborts_batch() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    // Header row without "Duration in Seconds".
    for (col, header) in ["User", "Date", "Start Time", "End Time", "Id"]
        .iter()
        .enumerate()
    {
        sheet
            .write_string(0, u16::try_from(col).unwrap(), *header)
            .unwrap();
    }
    let bytes = workbook.save_to_buffer().unwrap();

    let err = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("run")).unwrap_err();
    assert!(matches!(err, SheetError::MissingColumn(_)));
}

#[test]
fn test_unreadable_container_aborts_batch() {
    let garbage = b"this is not a zip archive".to_vec();
    let err = import_report(Cursor::new(garbage), &users(), &[], SequenceIds::new("run")).unwrap_err();
    assert!(matches!(err, SheetError::Read(_)));
}

#[test]
fn test_export_then_reimport_preserves_entry_values() {
    let bytes = build_workbook(&[
        row("Ana", "Launch", "Sprint 1", "Design", "", "1/2/25", "09:00", "10:30", "5400", "TRUE", "kickoff"),
        row("Ben", "Launch", "Sprint 1", "Logo", "Design", "1/2/25", "13:00", "14:00", "3600", "FALSE", ""),
        row("Ana", "Ops", "", "Standup", "", "1/3/25", "09:00", "09:15", "900", "FALSE", "daily"),
    ]);

    let first = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("a")).unwrap();
    assert_eq!(first.entries.len(), 3);

    let exported = export_report(&first.entries, &first.new_projects, &users(), "Roundtrip").unwrap();
    let second =
        import_report(Cursor::new(exported), &users(), &[], SequenceIds::new("b")).unwrap();

    assert_eq!(second.entries.len(), first.entries.len());
    assert_eq!(second.stats.rows_skipped, 0);

    // Ids are regenerated; compare the value triple per entry, sorted.
    let mut before: Vec<_> = first
        .entries
        .iter()
        .map(|e| (e.duration_seconds, e.billable, e.note.clone()))
        .collect();
    let mut after: Vec<_> = second
        .entries
        .iter()
        .map(|e| (e.duration_seconds, e.billable, e.note.clone()))
        .collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);

    // The hierarchy reconstructs the same shape, including the subtask.
    assert_eq!(second.new_projects.len(), 2);
    let launch = second
        .new_projects
        .iter()
        .find(|p| p.name == "Launch")
        .unwrap();
    let design = &launch.task_lists[0].tasks[0];
    assert_eq!(design.title, "Design");
    assert_eq!(design.subtasks.len(), 1);
    assert_eq!(design.subtasks[0].title, "Logo");
}

#[test]
fn test_decorated_names_merge_on_reimport() {
    let bytes = build_workbook(&[
        row("Ana", "#Launch#", "", "Design", "", "1/2/25", "09:00", "10:00", "3600", "TRUE", ""),
        row("Ana", "  Launch  ", "", "Design", "", "1/2/25", "10:00", "11:00", "3600", "TRUE", ""),
    ]);

    let result = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("run")).unwrap();
    assert_eq!(result.new_projects.len(), 1);
    assert_eq!(result.new_projects[0].name, "Launch");
    assert_eq!(result.stats.tasks_created, 1);
}

#[test]
fn test_export_to_file_and_import_from_path() {
    let bytes = build_workbook(&[row(
        "Ana", "Launch", "", "Design", "", "1/2/25", "09:00", "10:00", "3600", "TRUE", "",
    )]);
    let result = import_report(Cursor::new(bytes), &users(), &[], SequenceIds::new("a")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");
    export_report_to_path(&result.entries, &result.new_projects, &users(), "Weekly", &path).unwrap();

    let again =
        tr_sheet::import_report_from_path(&path, &users(), &[], SequenceIds::new("b")).unwrap();
    assert_eq!(again.entries.len(), 1);
    assert_eq!(again.entries[0].duration_seconds, 3600);
    assert!(again.entries[0].billable);
}
