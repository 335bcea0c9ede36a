use std::fmt;

use tracing::{info, warn};

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result};
use crate::models::{NamedRef, Task};
use crate::remote::RemoteClient;

/// Board statuses, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Todo, Self::InProgress, Self::Review, Self::Completed];

    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Completed => "Completed",
        }
    }

    /// Accepts API names, column titles and short ids (`todo`, `in_progress`).
    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "TODO" | "TO_DO" => Some(Self::Todo),
            "IN_PROGRESS" | "PROGRESS" => Some(Self::InProgress),
            "REVIEW" => Some(Self::Review),
            "COMPLETED" | "DONE" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// A backend status after display mapping. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DisplayStatus {
    Known(TaskStatus),
    Other(String),
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(s) => s.fmt(f),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

pub fn map_display_status(raw: &str) -> DisplayStatus {
    let known = match raw {
        "Closed" | "Completed" | "COMPLETED" => TaskStatus::Completed,
        "New" | "ACCEPTED" | "Accepted" | "TODO" => TaskStatus::Todo,
        "IN_PROGRESS" | "In Progress" => TaskStatus::InProgress,
        "REVIEW" | "Review" => TaskStatus::Review,
        "" => TaskStatus::Todo,
        other => return DisplayStatus::Other(other.to_string()),
    };
    DisplayStatus::Known(known)
}

pub fn is_completed(task: &Task) -> bool {
    map_display_status(&task.status) == DisplayStatus::Known(TaskStatus::Completed)
}

/// A task row before subtasks are attached to their parents.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub task: Task,
    pub parent_id: Option<String>,
}

/// Nests subtasks under their parents and drops duplicate ids.
///
/// A subtask whose parent is not in the list is shown as a top-level task.
pub fn assemble(items: Vec<WorkItem>) -> Vec<Task> {
    let (subs, parents): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.parent_id.is_some());
    let mut tasks: Vec<Task> = parents.into_iter().map(|i| i.task).collect();
    for sub in subs {
        let parent_id = sub.parent_id.unwrap_or_default();
        match tasks.iter_mut().find(|t| t.id == parent_id) {
            Some(parent) => parent.subtasks.push(crate::models::Subtask {
                id: sub.task.id,
                title: sub.task.title,
                status: sub.task.status,
                allocated_hours: sub.task.allocated_hours,
            }),
            None => {
                warn!(parent = %parent_id, subtask = %sub.task.id, "Parent task not found");
                tasks.push(sub.task);
            }
        }
    }
    let mut seen = std::collections::HashSet::new();
    tasks.retain(|t| seen.insert(t.id.clone()));
    tasks
}

/// Tasks shown on the status views; completed ones only on request.
pub fn visible(tasks: &[Task], show_completed: bool) -> Vec<&Task> {
    tasks.iter().filter(|t| show_completed || !is_completed(t)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectGroup<'a> {
    pub id: String,
    pub name: String,
    pub tasks: Vec<&'a Task>,
}

/// Groups tasks by project id.
///
/// Known projects come first in the given order (even when empty); projects
/// only referenced by a task follow. Tasks without a project are skipped.
pub fn group_by_project<'a>(tasks: &[&'a Task], projects: &[NamedRef]) -> Vec<ProjectGroup<'a>> {
    let mut groups: Vec<ProjectGroup<'a>> = Vec::new();
    for p in projects {
        if !p.id.is_empty() && !groups.iter().any(|g| g.id == p.id) {
            groups.push(ProjectGroup { id: p.id.clone(), name: p.name.clone(), tasks: Vec::new() });
        }
    }
    for task in tasks {
        if task.project_id.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|g| g.id == task.project_id) {
            Some(g) => g.tasks.push(task),
            None => groups.push(ProjectGroup {
                id: task.project_id.clone(),
                name: if task.project_name.is_empty() {
                    "Unknown Project".to_string()
                } else {
                    task.project_name.clone()
                },
                tasks: vec![task],
            }),
        }
    }
    groups
}

/// Groups top-level tasks by display status, in order of first appearance.
pub fn group_by_status<'a>(tasks: &[&'a Task]) -> Vec<(DisplayStatus, Vec<&'a Task>)> {
    let mut groups: Vec<(DisplayStatus, Vec<&'a Task>)> = Vec::new();
    for task in tasks {
        let status = map_display_status(&task.status);
        match groups.iter_mut().find(|(s, _)| *s == status) {
            Some((_, list)) => list.push(task),
            None => groups.push((status, vec![task])),
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

/// Four-column kanban board.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
}

impl Board {
    /// Tasks whose status maps to no column are left off the board.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut columns: Vec<BoardColumn> =
            TaskStatus::ALL.iter().map(|s| BoardColumn { status: *s, tasks: Vec::new() }).collect();
        for task in tasks {
            if let DisplayStatus::Known(status) = map_display_status(&task.status) {
                if let Some(col) = columns.iter_mut().find(|c| c.status == status) {
                    col.tasks.push(task);
                }
            }
        }
        Self { columns }
    }

    pub fn column_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.columns
            .iter()
            .find(|c| c.tasks.iter().any(|t| t.id == task_id))
            .map(|c| c.status)
    }

    /// Moves a task locally. Returns false when it is already in `target`.
    fn relocate(&mut self, task_id: &str, target: TaskStatus) -> Result<bool> {
        let from = self.column_of(task_id).ok_or_else(|| Error::NotFound(format!("Task {}", task_id)))?;
        if from == target {
            return Ok(false);
        }
        let mut moved = None;
        if let Some(col) = self.columns.iter_mut().find(|c| c.status == from) {
            if let Some(pos) = col.tasks.iter().position(|t| t.id == task_id) {
                moved = Some(col.tasks.remove(pos));
            }
        }
        if let (Some(mut task), Some(col)) = (moved, self.columns.iter_mut().find(|c| c.status == target)) {
            task.status = target.as_api_str().to_string();
            col.tasks.push(task);
        }
        Ok(true)
    }

    /// Persists the new status remotely, then moves the card.
    /// A drop onto the card's own column does nothing.
    pub async fn move_to_column(&mut self, remote: &RemoteClient, task_id: &str, target: TaskStatus) -> Result<bool> {
        match self.column_of(task_id) {
            None => return Err(Error::NotFound(format!("Task {}", task_id))),
            Some(current) if current == target => return Ok(false),
            Some(_) => {}
        }
        remote.update_task_status(task_id, target.as_api_str()).await?;
        info!(task = task_id, status = %target, "Moved task");
        self.relocate(task_id, target)
    }
}

/// The my-work screen's data: the user's projects and assembled tasks.
#[derive(Debug, Clone, Default)]
pub struct MyWork {
    pub projects: Vec<NamedRef>,
    pub tasks: Vec<Task>,
}

impl MyWork {
    pub async fn load(api: &ApiClient, user_id: &str) -> Result<Self> {
        let projects_ep = format!("projects/listByUser/{}", user_id);
        let tasks_ep = format!("tasks/new/{}", user_id);
        let (projects, grouped) = tokio::try_join!(
            api.get::<serde_json::Value>(&projects_ep, &[]),
            api.get::<serde_json::Value>(&tasks_ep, &[]),
        )?;
        let (group_projects, items) = parse::parse_my_work(&grouped);
        let mut all_projects = parse::parse_named(&projects);
        for p in group_projects {
            if !all_projects.iter().any(|k| k.id == p.id) {
                all_projects.push(p);
            }
        }
        Ok(Self { projects: all_projects, tasks: assemble(items) })
    }
}
