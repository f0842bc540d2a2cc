//! In-run entity resolution and hierarchy building.
//!
//! Resolution keys are composite strings built purely from normalized name
//! fields; the source file's own id column is inconsistent and never
//! trusted. Resolving the same key twice within one run always yields the
//! same id and the same node in the forest.
//!
//! All lookup tables live on one [`ResolveContext`] value owned by the
//! import run, so separate imports never interfere.

use std::collections::{HashMap, HashSet};

use crate::ids::IdGenerator;
use crate::model::{ImportStats, Project, Subtask, Task, TaskList};

/// Title used when a row names no task list.
pub const DEFAULT_LIST_TITLE: &str = "General";

/// Sentinel standing in for an absent client in project keys.
const NO_CLIENT: &str = "-";

/// Fixed palette projects are colored from.
const PROJECT_COLORS: [&str; 10] = [
    "#e53935", "#d81b60", "#8e24aa", "#5e35b1", "#3949ab", "#1e88e5", "#00897b", "#43a047",
    "#fb8c00", "#6d4c41",
];

/// Picks a palette color from a string hash of the project name.
///
/// Deterministic across runs, so repeated imports of the same project name
/// get a stable color even though the id differs per run.
#[must_use]
pub fn project_color(name: &str) -> &'static str {
    let hash = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    PROJECT_COLORS[hash as usize % PROJECT_COLORS.len()]
}

/// Derives the preferred task-list id from its project id and normalized
/// title. Slugging is lossy (case folds, punctuation collapses), so the
/// resolver disambiguates before using the result as an id.
fn derive_list_id(project_id: &str, title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{project_id}-list")
    } else {
        format!("{project_id}-{slug}")
    }
}

/// Where a task sits in the forest: (project, list, task) positions.
/// Positions are stable because the forest is append-only during a run.
type TaskPath = (usize, usize, usize);

/// Everything the resolver accumulated over one run.
#[derive(Debug)]
pub struct Resolution {
    /// The full forest: caller-supplied projects plus newly created ones.
    pub forest: Vec<Project>,
    /// Ids of projects created this run.
    pub new_project_ids: HashSet<String>,
    /// Ids of caller-supplied projects that rows resolved into.
    pub touched_project_ids: HashSet<String>,
    /// Creation counters.
    pub stats: ImportStats,
}

/// Shared resolver and hierarchy-builder state for one import run.
pub struct ResolveContext<G> {
    ids: G,
    forest: Vec<Project>,
    /// `name|client` -> project id.
    project_by_key: HashMap<String, String>,
    project_pos: HashMap<String, usize>,
    /// `projectId|listTitle` -> list id.
    list_by_key: HashMap<String, String>,
    list_pos: HashMap<String, (usize, usize)>,
    /// `projectId|parentName`, `projectId|listTitle|taskName`, or
    /// `parentTaskId|taskName` -> task/subtask id. The three key shapes
    /// cannot collide because ids are run-unique.
    task_by_key: HashMap<String, String>,
    task_pos: HashMap<String, TaskPath>,
    new_project_ids: HashSet<String>,
    touched_project_ids: HashSet<String>,
    stats: ImportStats,
}

impl<G: IdGenerator> ResolveContext<G> {
    /// Builds a context seeded with the caller's existing projects.
    ///
    /// Existing projects are indexed under the same normalized `name|client`
    /// key as new ones, with the existing id winning on collision, so a row
    /// naming a known project merges into it instead of duplicating it.
    /// Their lists and tasks are indexed too, for the same reason.
    #[must_use]
    pub fn new(existing_projects: &[Project], ids: G) -> Self {
        let mut ctx = Self {
            ids,
            forest: Vec::new(),
            project_by_key: HashMap::new(),
            project_pos: HashMap::new(),
            list_by_key: HashMap::new(),
            list_pos: HashMap::new(),
            task_by_key: HashMap::new(),
            task_pos: HashMap::new(),
            new_project_ids: HashSet::new(),
            touched_project_ids: HashSet::new(),
            stats: ImportStats::default(),
        };

        for project in existing_projects {
            ctx.seed_project(project.clone());
        }
        ctx
    }

    fn seed_project(&mut self, project: Project) {
        let key = project_key(&project.name, project.client.as_deref());
        if self.project_by_key.contains_key(&key) {
            // First one in wins; duplicate existing projects stay unmerged.
            tracing::debug!(name = %project.name, "duplicate existing project key, keeping first");
            return;
        }

        let p = self.forest.len();
        self.project_by_key.insert(key, project.id.clone());
        self.project_pos.insert(project.id.clone(), p);

        for (l, list) in project.task_lists.iter().enumerate() {
            self.list_by_key
                .insert(list_key(&project.id, &list.title), list.id.clone());
            self.list_pos.insert(list.id.clone(), (p, l));

            for (t, task) in list.tasks.iter().enumerate() {
                self.task_by_key
                    .insert(task_key(&project.id, &list.title, &task.title), task.id.clone());
                self.task_by_key
                    .entry(parent_key(&project.id, &task.title))
                    .or_insert_with(|| task.id.clone());
                self.task_pos.insert(task.id.clone(), (p, l, t));

                for subtask in &task.subtasks {
                    self.task_by_key
                        .insert(subtask_key(&task.id, &subtask.title), subtask.id.clone());
                }
            }
        }

        self.forest.push(project);
    }

    /// Resolves a project by normalized (name, client), creating it on first
    /// sight.
    pub fn resolve_project(&mut self, name: &str, client: Option<&str>) -> String {
        let key = project_key(name, client);
        if let Some(id) = self.project_by_key.get(&key) {
            let id = id.clone();
            if !self.new_project_ids.contains(&id) {
                self.touched_project_ids.insert(id.clone());
            }
            return id;
        }

        let id = self.ids.next_id();
        let project = Project::new(
            id.clone(),
            name,
            client.map(str::to_string),
            project_color(name),
        );
        tracing::debug!(project = %name, id = %id, "created project");

        self.project_pos.insert(id.clone(), self.forest.len());
        self.forest.push(project);
        self.project_by_key.insert(key, id.clone());
        self.new_project_ids.insert(id.clone());
        self.stats.projects_created += 1;
        id
    }

    /// Resolves a task list inside a project, creating and attaching it on
    /// first sight. A missing title falls back to [`DEFAULT_LIST_TITLE`].
    pub fn resolve_list(&mut self, project_id: &str, title: Option<&str>) -> String {
        let title = title.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_LIST_TITLE);
        let key = list_key(project_id, title);
        if let Some(id) = self.list_by_key.get(&key) {
            return id.clone();
        }

        let id = self.unique_list_id(project_id, title);
        let p = self.project_pos[project_id];
        let project = &mut self.forest[p];
        let l = project.task_lists.len();
        project.task_lists.push(TaskList::new(id.clone(), title));

        self.list_pos.insert(id.clone(), (p, l));
        self.list_by_key.insert(key, id.clone());
        self.stats.task_lists_created += 1;
        id
    }

    /// Picks an unused list id. The slug derivation is not injective in the
    /// title ("Sprint 1" and "SPRINT 1" slug identically), so a taken slug
    /// gets a numeric suffix; distinct titles must never share a node.
    fn unique_list_id(&self, project_id: &str, title: &str) -> String {
        let base = derive_list_id(project_id, title);
        if !self.list_pos.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.list_pos.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Resolves the task-or-subtask a row's entry belongs to.
    ///
    /// With a parent name present the parent task is resolved first (keyed
    /// project-wide) and the row's own task becomes a subtask of it;
    /// otherwise the task is keyed within its list.
    pub fn resolve_task(
        &mut self,
        project_id: &str,
        list_id: &str,
        parent_name: Option<&str>,
        task_name: &str,
        billable: bool,
    ) -> String {
        match parent_name {
            Some(parent) => {
                let parent_id = self.resolve_parent_task(project_id, list_id, parent, billable);
                self.resolve_subtask(&parent_id, task_name, billable)
            }
            None => self.resolve_list_task(project_id, list_id, task_name, billable),
        }
    }

    /// Resolves a parent task, keyed project-wide by name, attaching it to
    /// the row's list when first seen.
    fn resolve_parent_task(
        &mut self,
        project_id: &str,
        list_id: &str,
        name: &str,
        billable: bool,
    ) -> String {
        let key = parent_key(project_id, name);
        if let Some(id) = self.task_by_key.get(&key) {
            return id.clone();
        }
        let id = self.create_task(list_id, name, billable);
        // Cross-register under the list-task key shape too, so a later row
        // naming this task without a parent resolves to the same node.
        let (p, l) = self.list_pos[list_id];
        let list_title = self.forest[p].task_lists[l].title.clone();
        self.task_by_key.insert(key, id.clone());
        self.task_by_key
            .entry(task_key(project_id, &list_title, name))
            .or_insert_with(|| id.clone());
        id
    }

    /// Resolves a task keyed by (project, list title, name).
    fn resolve_list_task(
        &mut self,
        project_id: &str,
        list_id: &str,
        name: &str,
        billable: bool,
    ) -> String {
        let (p, l) = self.list_pos[list_id];
        let list_title = self.forest[p].task_lists[l].title.clone();
        let key = task_key(project_id, &list_title, name);
        if let Some(id) = self.task_by_key.get(&key) {
            return id.clone();
        }
        let id = self.create_task(list_id, name, billable);
        self.task_by_key.insert(key, id.clone());
        // Also answer parent-name lookups for this task (first list wins on
        // same-named tasks across lists).
        self.task_by_key
            .entry(parent_key(project_id, name))
            .or_insert_with(|| id.clone());
        id
    }

    /// Appends a new task to a list and records its position.
    fn create_task(&mut self, list_id: &str, name: &str, billable: bool) -> String {
        let (p, l) = self.list_pos[list_id];
        let id = self.ids.next_id();
        let tasks = &mut self.forest[p].task_lists[l].tasks;
        if !tasks.iter().any(|t| t.id == id) {
            tasks.push(Task::new(id.clone(), name, billable));
        }
        let t = tasks.iter().position(|task| task.id == id).unwrap_or(tasks.len() - 1);
        tracing::debug!(task = %name, id = %id, "created task");

        self.task_pos.insert(id.clone(), (p, l, t));
        self.stats.tasks_created += 1;
        id
    }

    /// Resolves a subtask under its parent task, creating it on first sight.
    fn resolve_subtask(&mut self, parent_id: &str, name: &str, billable: bool) -> String {
        let key = subtask_key(parent_id, name);
        if let Some(id) = self.task_by_key.get(&key) {
            return id.clone();
        }

        let id = self.ids.next_id();
        let (p, l, t) = self.task_pos[parent_id];
        let subtasks = &mut self.forest[p].task_lists[l].tasks[t].subtasks;
        if !subtasks.iter().any(|s| s.id == id) {
            subtasks.push(Subtask::new(id.clone(), name, billable));
        }
        tracing::debug!(subtask = %name, parent = %parent_id, "created subtask");

        self.task_by_key.insert(key, id.clone());
        self.stats.subtasks_created += 1;
        id
    }

    /// Hands out an id from the run's generator (entry ids come from the
    /// same sequence as entity ids).
    pub fn generate_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// Consumes the context, handing the forest and bookkeeping back to the
    /// import pipeline.
    #[must_use]
    pub fn finish(self) -> Resolution {
        Resolution {
            forest: self.forest,
            new_project_ids: self.new_project_ids,
            touched_project_ids: self.touched_project_ids,
            stats: self.stats,
        }
    }
}

fn project_key(name: &str, client: Option<&str>) -> String {
    format!("{name}|{}", client.filter(|c| !c.is_empty()).unwrap_or(NO_CLIENT))
}

fn list_key(project_id: &str, title: &str) -> String {
    format!("{project_id}|{title}")
}

fn parent_key(project_id: &str, parent_name: &str) -> String {
    format!("{project_id}|{parent_name}")
}

fn task_key(project_id: &str, list_title: &str, task_name: &str) -> String {
    format!("{project_id}|{list_title}|{task_name}")
}

fn subtask_key(parent_task_id: &str, task_name: &str) -> String {
    format!("{parent_task_id}|{task_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequenceIds;

    fn ctx() -> ResolveContext<SequenceIds> {
        ResolveContext::new(&[], SequenceIds::new("id"))
    }

    #[test]
    fn test_same_project_key_resolves_once() {
        let mut ctx = ctx();
        let a = ctx.resolve_project("Launch", Some("Acme"));
        let b = ctx.resolve_project("Launch", Some("Acme"));
        assert_eq!(a, b);

        let resolution = ctx.finish();
        assert_eq!(resolution.forest.len(), 1);
        assert_eq!(resolution.stats.projects_created, 1);
    }

    #[test]
    fn test_client_distinguishes_projects() {
        let mut ctx = ctx();
        let a = ctx.resolve_project("Launch", Some("Acme"));
        let b = ctx.resolve_project("Launch", None);
        assert_ne!(a, b);
        assert_eq!(ctx.finish().stats.projects_created, 2);
    }

    #[test]
    fn test_missing_list_title_falls_back_to_general() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, None);
        let again = ctx.resolve_list(&p, Some("General"));
        assert_eq!(list, again);

        let forest = ctx.finish().forest;
        assert_eq!(forest[0].task_lists.len(), 1);
        assert_eq!(forest[0].task_lists[0].title, "General");
    }

    #[test]
    fn test_list_id_derived_from_project_and_title() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, Some("Sprint 1"));
        assert_eq!(list, format!("{p}-sprint-1"));
    }

    #[test]
    fn test_slug_colliding_titles_stay_distinct_lists() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        // All three slug to "sprint-1" but are distinct normalized titles.
        let a = ctx.resolve_list(&p, Some("Sprint 1"));
        let b = ctx.resolve_list(&p, Some("SPRINT 1"));
        let c = ctx.resolve_list(&p, Some("Sprint.1"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);

        let resolution = ctx.finish();
        let lists = &resolution.forest[0].task_lists;
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].title, "Sprint 1");
        assert_eq!(lists[1].title, "SPRINT 1");
        assert_eq!(lists[2].title, "Sprint.1");
        assert_eq!(resolution.stats.task_lists_created, 3);
    }

    #[test]
    fn test_task_created_once_per_list_key() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, None);
        let a = ctx.resolve_task(&p, &list, None, "Design", true);
        let b = ctx.resolve_task(&p, &list, None, "Design", false);
        assert_eq!(a, b);

        let resolution = ctx.finish();
        let tasks = &resolution.forest[0].task_lists[0].tasks;
        assert_eq!(tasks.len(), 1);
        // First sighting decides the billable flag.
        assert!(tasks[0].billable);
        assert_eq!(resolution.stats.tasks_created, 1);
    }

    #[test]
    fn test_parent_name_turns_task_into_subtask() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, None);
        let sub = ctx.resolve_task(&p, &list, Some("Design"), "Logo", true);
        let sub_again = ctx.resolve_task(&p, &list, Some("Design"), "Logo", true);
        assert_eq!(sub, sub_again);

        let resolution = ctx.finish();
        let tasks = &resolution.forest[0].task_lists[0].tasks;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Design");
        assert_eq!(tasks[0].subtasks.len(), 1);
        assert_eq!(tasks[0].subtasks[0].title, "Logo");
        assert_eq!(tasks[0].subtasks[0].id, sub);
        assert_eq!(resolution.stats.tasks_created, 1);
        assert_eq!(resolution.stats.subtasks_created, 1);
    }

    #[test]
    fn test_parent_resolved_before_main_task() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, None);
        // Two rows with the same parent share one parent task node.
        ctx.resolve_task(&p, &list, Some("Design"), "Logo", true);
        ctx.resolve_task(&p, &list, Some("Design"), "Icons", true);

        let forest = ctx.finish().forest;
        let tasks = &forest[0].task_lists[0].tasks;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].subtasks.len(), 2);
    }

    #[test]
    fn test_parent_name_finds_earlier_list_task() {
        let mut ctx = ctx();
        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, None);
        let design = ctx.resolve_task(&p, &list, None, "Design", true);
        // Later row names Design as a parent; no second node appears.
        ctx.resolve_task(&p, &list, Some("Design"), "Logo", true);

        let forest = ctx.finish().forest;
        let tasks = &forest[0].task_lists[0].tasks;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, design);
        assert_eq!(tasks[0].subtasks.len(), 1);
    }

    #[test]
    fn test_existing_project_merged_by_name() {
        let mut existing = Project::new("ext-1", "Launch", None, "#e53935");
        existing.task_lists.push(TaskList::new("ext-1-general", "General"));
        existing.task_lists[0]
            .tasks
            .push(Task::new("ext-t1", "Design", true));

        let mut ctx = ResolveContext::new(std::slice::from_ref(&existing), SequenceIds::new("id"));
        let p = ctx.resolve_project("Launch", None);
        assert_eq!(p, "ext-1");

        let list = ctx.resolve_list(&p, None);
        assert_eq!(list, "ext-1-general");
        let task = ctx.resolve_task(&p, &list, None, "Design", true);
        assert_eq!(task, "ext-t1");

        let resolution = ctx.finish();
        assert_eq!(resolution.stats.projects_created, 0);
        assert_eq!(resolution.stats.tasks_created, 0);
        assert!(resolution.touched_project_ids.contains("ext-1"));
        assert!(resolution.new_project_ids.is_empty());
        // No duplicate nodes were appended.
        assert_eq!(resolution.forest[0].task_lists.len(), 1);
        assert_eq!(resolution.forest[0].task_lists[0].tasks.len(), 1);
    }

    #[test]
    fn test_new_task_in_existing_project() {
        let existing = Project::new("ext-1", "Launch", None, "#e53935");
        let mut ctx = ResolveContext::new(&[existing], SequenceIds::new("id"));

        let p = ctx.resolve_project("Launch", None);
        let list = ctx.resolve_list(&p, Some("Sprint 2"));
        ctx.resolve_task(&p, &list, None, "QA", false);

        let resolution = ctx.finish();
        assert_eq!(resolution.stats.task_lists_created, 1);
        assert_eq!(resolution.stats.tasks_created, 1);
        assert!(resolution.touched_project_ids.contains("ext-1"));
        assert_eq!(resolution.forest[0].task_lists[0].title, "Sprint 2");
    }

    #[test]
    fn test_project_color_is_deterministic() {
        assert_eq!(project_color("Launch"), project_color("Launch"));
        let color = project_color("Launch");
        assert!(PROJECT_COLORS.contains(&color));
    }
}
