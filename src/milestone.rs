//! Views over the hosted board: a two-week project timeline with task
//! counts, and a single project's task list with a status filter.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::models::Task;
use crate::remote::{RemoteClient, RemoteProject};
use crate::week::DateWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub is_today: bool,
}

impl TimelineDay {
    /// "Thu 13"
    pub fn label(&self) -> String {
        self.date.format("%a %-d").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    pub today: NaiveDate,
    pub window: DateWindow,
    pub projects: Vec<RemoteProject>,
    pub tasks: Vec<Task>,
    pub error: Option<String>,
}

impl Timeline {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            window: DateWindow::timeline_of(today),
            projects: Vec::new(),
            tasks: Vec::new(),
            error: None,
        }
    }

    pub fn days(&self) -> Vec<TimelineDay> {
        self.window
            .days()
            .into_iter()
            .map(|date| TimelineDay { date, is_today: date == self.today })
            .collect()
    }

    pub fn range_label(&self) -> String {
        self.window.span_label()
    }

    pub fn previous(&mut self) {
        self.window = self.window.previous();
    }

    pub fn next(&mut self) {
        self.window = self.window.next();
    }

    /// Fetches projects and tasks together. On failure both lists stay empty.
    pub async fn load(&mut self, remote: &RemoteClient) -> Result<()> {
        match tokio::try_join!(remote.projects(), remote.tasks()) {
            Ok((projects, tasks)) => {
                debug!(projects = projects.len(), tasks = tasks.len(), "Loaded timeline");
                self.projects = projects;
                self.tasks = tasks.into_iter().map(Task::from).collect();
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load timeline");
                self.projects.clear();
                self.tasks.clear();
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn project_tasks(&self, project_id: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.project_id == project_id).collect()
    }

    pub fn task_count(&self, project_id: &str) -> usize {
        self.project_tasks(project_id).len()
    }
}

/// One project and the tasks that belong to it.
#[derive(Debug, Clone)]
pub struct ProjectDetail {
    pub project: RemoteProject,
    pub tasks: Vec<Task>,
}

impl ProjectDetail {
    pub fn from_rows(project_id: &str, projects: Vec<RemoteProject>, tasks: Vec<Task>) -> Result<Self> {
        let project = projects
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| Error::NotFound(format!("Project {}", project_id)))?;
        let tasks = tasks.into_iter().filter(|t| t.project_id == project_id).collect();
        Ok(Self { project, tasks })
    }

    pub async fn load(remote: &RemoteClient, project_id: &str) -> Result<Self> {
        let (projects, tasks) = tokio::try_join!(remote.projects(), remote.tasks())?;
        Self::from_rows(project_id, projects, tasks.into_iter().map(Task::from).collect())
    }

    /// Tasks whose status matches `filter` ignoring case. `None` and `all`
    /// keep everything.
    pub fn filtered(&self, filter: Option<&str>) -> Vec<&Task> {
        match filter {
            None => self.tasks.iter().collect(),
            Some(f) if f.eq_ignore_ascii_case("all") => self.tasks.iter().collect(),
            Some(f) => self.tasks.iter().filter(|t| t.status.eq_ignore_ascii_case(f)).collect(),
        }
    }
}

/// "Jun 3 → Jun 14", "Jun 14, 2024" with only a due date, else "No date range".
pub fn date_range_label(start: Option<NaiveDate>, due: Option<NaiveDate>) -> String {
    match (start, due) {
        (Some(s), Some(d)) => format!("{} → {}", s.format("%b %-d"), d.format("%b %-d")),
        (None, Some(d)) => d.format("%b %-d, %Y").to_string(),
        _ => "No date range".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(id: &str, project: &str, status: &str) -> Task {
        Task { id: id.into(), title: id.into(), project_id: project.into(), status: status.into(), ..Default::default() }
    }

    fn project(id: &str) -> RemoteProject {
        RemoteProject { id: id.into(), name: format!("Project {}", id), ..Default::default() }
    }

    #[test]
    fn test_timeline_days_and_paging() {
        let mut timeline = Timeline::new(d("2024-06-14"));
        let days = timeline.days();
        assert_eq!(days.len(), 14);
        assert_eq!(days[0].label(), "Thu 13");
        assert!(days[1].is_today);
        assert_eq!(days.iter().filter(|x| x.is_today).count(), 1);

        timeline.next();
        assert_eq!(timeline.window.start, d("2024-06-27"));
        assert!(timeline.days().iter().all(|x| !x.is_today));
        timeline.previous();
        timeline.previous();
        assert_eq!(timeline.window.start, d("2024-05-30"));
        assert_eq!(timeline.range_label(), "30 May - 12 Jun 2024");
    }

    #[test]
    fn test_task_count_per_project() {
        let mut timeline = Timeline::new(d("2024-06-14"));
        timeline.tasks = vec![task("1", "p1", "TODO"), task("2", "p1", "REVIEW"), task("3", "p2", "TODO")];
        assert_eq!(timeline.task_count("p1"), 2);
        assert_eq!(timeline.task_count("p2"), 1);
        assert_eq!(timeline.task_count("p3"), 0);
    }

    #[test]
    fn test_project_detail_filters_status_ignoring_case() {
        let detail = ProjectDetail::from_rows(
            "p1",
            vec![project("p1"), project("p2")],
            vec![task("1", "p1", "IN_PROGRESS"), task("2", "p1", "TODO"), task("3", "p2", "TODO")],
        )
        .unwrap();
        assert_eq!(detail.tasks.len(), 2);
        assert_eq!(detail.filtered(None).len(), 2);
        assert_eq!(detail.filtered(Some("ALL")).len(), 2);
        let in_progress = detail.filtered(Some("in_progress"));
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].id, "1");
        assert!(detail.filtered(Some("review")).is_empty());
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let err = ProjectDetail::from_rows("zz", vec![project("p1")], vec![]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_date_range_label() {
        assert_eq!(date_range_label(Some(d("2024-06-03")), Some(d("2024-06-14"))), "Jun 3 → Jun 14");
        assert_eq!(date_range_label(None, Some(d("2024-06-14"))), "Jun 14, 2024");
        assert_eq!(date_range_label(Some(d("2024-06-03")), None), "No date range");
        assert_eq!(date_range_label(None, None), "No date range");
    }
}
