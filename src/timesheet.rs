//! Weekly timesheet grid.
//!
//! Loads are split in two so callers can fetch concurrently: [`fetch_week`]
//! does the network work without touching the view, and
//! [`TimesheetView::apply`] installs the result only if its ticket is still
//! the latest one handed out by [`TimesheetView::begin_load`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result, SaveStage};
use crate::models::{CalendarDetail, Task, TimesheetEntry};
use crate::session::SessionStore;
use crate::week::{cell_key, format_hours, DateWindow};

/// Identifies one load. Only the newest ticket may apply its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetProject {
    pub id: String,
    pub name: String,
    pub collapsed: bool,
}

/// Raw responses for one week.
#[derive(Debug, Clone, Default)]
pub struct WeekData {
    pub tasks: Vec<Task>,
    pub calendar: Vec<CalendarDetail>,
}

/// Hours and minutes typed into a cell editor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellInput {
    pub allocated_hours: u32,
    pub allocated_minutes: u32,
    pub actual_hours: u32,
    pub actual_minutes: u32,
}

impl CellInput {
    pub fn allocated(&self) -> f64 {
        f64::from(self.allocated_hours) + f64::from(self.allocated_minutes) / 60.0
    }

    pub fn actual(&self) -> f64 {
        f64::from(self.actual_hours) + f64::from(self.actual_minutes) / 60.0
    }
}

pub async fn fetch_week(api: &ApiClient, user_id: &str, window: DateWindow) -> Result<WeekData> {
    let tasks: Value = api.get(&format!("tasks/{}", user_id), &[]).await?;
    let calendar: Value = api
        .get(
            "planner/calendardetail/",
            &[
                ("userId", Some(user_id.to_string())),
                ("start", Some(window.start.format("%Y-%m-%d").to_string())),
                ("end", Some(window.end().format("%Y-%m-%d").to_string())),
            ],
        )
        .await?;
    Ok(WeekData {
        tasks: parse::parse_week_tasks(&tasks),
        calendar: parse::parse_calendar_detail(&calendar),
    })
}

/// Builds the cell map. Worked time wins; allocations only fill gaps.
pub fn build_entries(rows: Vec<CalendarDetail>) -> BTreeMap<String, TimesheetEntry> {
    let mut entries = BTreeMap::new();
    let mut allocations = Vec::new();
    for row in rows {
        for t in row.time {
            if let Some(date) = t.worked_date {
                entries.insert(
                    cell_key(&row.task_id, date),
                    TimesheetEntry { id: None, task_id: row.task_id.clone(), date, hours: t.hours.into_hours(), minutes: 0 },
                );
            }
        }
        for a in row.allocation {
            if let Some(date) = a.date {
                allocations.push((row.task_id.clone(), date, a.hours));
            }
        }
    }
    for (task_id, date, hours) in allocations {
        entries
            .entry(cell_key(&task_id, date))
            .or_insert_with(|| TimesheetEntry { id: None, task_id, date, hours: hours.into_hours(), minutes: 0 });
    }
    entries
}

#[derive(Debug, Clone)]
pub struct TimesheetView {
    pub user_id: String,
    pub today: NaiveDate,
    pub window: DateWindow,
    pub tasks: Vec<Task>,
    pub projects: Vec<TimesheetProject>,
    pub entries: BTreeMap<String, TimesheetEntry>,
    pub editing: Option<String>,
    pub error: Option<String>,
    generation: u64,
}

impl TimesheetView {
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            today,
            window: DateWindow::week_of(today),
            tasks: Vec::new(),
            projects: Vec::new(),
            entries: BTreeMap::new(),
            editing: None,
            error: None,
            generation: 0,
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket(self.generation)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Installs a week's data. Returns false (and changes nothing) for a
    /// superseded ticket.
    pub fn apply(&mut self, ticket: LoadTicket, data: WeekData) -> bool {
        if !self.is_current(ticket) {
            debug!(ticket = ticket.0, latest = self.generation, "Dropping stale week response");
            return false;
        }
        let (from, to) = (self.window.start, self.window.end());
        self.tasks = data.tasks.into_iter().filter(|t| t.overlaps(from, to)).collect();
        self.projects.clear();
        for task in &self.tasks {
            if !task.project_id.is_empty() && !self.projects.iter().any(|p| p.id == task.project_id) {
                self.projects.push(TimesheetProject {
                    id: task.project_id.clone(),
                    name: task.project_name.clone(),
                    collapsed: true,
                });
            }
        }
        self.entries = build_entries(data.calendar);
        self.error = None;
        true
    }

    /// Records a failed load, unless a newer one has started since.
    pub fn fail(&mut self, ticket: LoadTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    /// Fetches and applies the current window, then mirrors the entries.
    pub async fn load(&mut self, api: &ApiClient, store: &SessionStore) -> Result<()> {
        let ticket = self.begin_load();
        match fetch_week(api, &self.user_id, self.window).await {
            Ok(data) => {
                if self.apply(ticket, data) {
                    store.save_entries_mirror(&self.entries);
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load timesheet week");
                self.fail(ticket, e.to_string());
                Err(e)
            }
        }
    }

    pub fn previous_week(&mut self) {
        self.window = self.window.previous();
    }

    pub fn next_week(&mut self) {
        self.window = self.window.next();
    }

    pub fn this_week(&mut self) {
        self.window = DateWindow::week_of(self.today);
    }

    pub fn is_current_week(&self) -> bool {
        self.window.is_current(self.today)
    }

    /// Future dates cannot be edited.
    pub fn is_editable(&self, date: NaiveDate) -> bool {
        date <= self.today
    }

    /// Opens the editor on a cell. Returns false when the date is in the
    /// future or another cell is already open.
    pub fn start_editing(&mut self, task_id: &str, date: NaiveDate) -> bool {
        if !self.is_editable(date) || self.editing.is_some() {
            return false;
        }
        self.editing = Some(cell_key(task_id, date));
        true
    }

    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    pub fn entry(&self, task_id: &str, date: NaiveDate) -> Option<&TimesheetEntry> {
        self.entries.get(&cell_key(task_id, date))
    }

    /// Formatted cell text, empty for a blank cell.
    pub fn display_time(&self, task_id: &str, date: NaiveDate) -> String {
        match self.entry(task_id, date) {
            Some(e) if e.hours > 0.0 || e.minutes > 0 => format_hours(e.total_hours()),
            _ => String::new(),
        }
    }

    pub fn day_total(&self, date: NaiveDate) -> f64 {
        self.tasks
            .iter()
            .filter_map(|t| self.entry(&t.id, date))
            .map(TimesheetEntry::total_hours)
            .sum()
    }

    pub fn task_week_total(&self, task_id: &str) -> f64 {
        self.window
            .days()
            .into_iter()
            .filter_map(|d| self.entry(task_id, d))
            .map(TimesheetEntry::total_hours)
            .sum()
    }

    pub fn week_total(&self) -> f64 {
        self.window.days().into_iter().map(|d| self.day_total(d)).sum()
    }

    /// Non-empty projects with their tasks, in first-seen order.
    pub fn tasks_by_project(&self) -> Vec<(&TimesheetProject, Vec<&Task>)> {
        self.projects
            .iter()
            .map(|p| (p, self.tasks.iter().filter(|t| t.project_id == p.id).collect::<Vec<_>>()))
            .filter(|(_, tasks)| !tasks.is_empty())
            .collect()
    }

    pub fn toggle_project(&mut self, project_id: &str) {
        if let Some(p) = self.projects.iter_mut().find(|p| p.id == project_id) {
            p.collapsed = !p.collapsed;
        }
    }

    pub fn is_collapsed(&self, project_id: &str) -> bool {
        self.projects.iter().find(|p| p.id == project_id).map_or(false, |p| p.collapsed)
    }

    /// Writes the allocation, then the time entry that references it.
    ///
    /// The cell is updated locally only after both succeed. A failure in the
    /// second step leaves the allocation in place and reports its id.
    pub async fn save_cell(
        &mut self,
        api: &ApiClient,
        store: &SessionStore,
        task_id: &str,
        date: NaiveDate,
        input: CellInput,
    ) -> Result<()> {
        if !self.is_editable(date) {
            return Err(Error::Validation(format!("Cannot log time for a future date ({})", date)));
        }
        let allocation = allocation_payload(&self.user_id, task_id, date, input.allocated());
        let scheduled: Value = api
            .post("planner/create/scheduled/", &allocation)
            .await
            .map_err(|source| Error::SaveFailed { stage: SaveStage::Allocation, scheduled_id: None, source })?;
        let scheduled_id = parse::parse_created_id(&scheduled);

        let task = self.tasks.iter().find(|t| t.id == task_id);
        let entry = time_entry_payload(&self.user_id, task_id, task, date, input.actual(), scheduled_id.as_deref());
        let created: Value = api.post("timeEntry/", &entry).await.map_err(|source| Error::SaveFailed {
            stage: SaveStage::TimeEntry,
            scheduled_id: scheduled_id.clone(),
            source,
        })?;

        self.entries.insert(
            cell_key(task_id, date),
            TimesheetEntry {
                id: parse::parse_created_id(&created),
                task_id: task_id.to_string(),
                date,
                hours: f64::from(input.actual_hours),
                minutes: input.actual_minutes,
            },
        );
        store.save_entries_mirror(&self.entries);
        self.cancel_editing();
        info!(task = task_id, %date, hours = input.actual(), "Saved time entry");
        Ok(())
    }
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn allocation_payload(user_id: &str, task_id: &str, date: NaiveDate, hours: f64) -> Value {
    json!([{
        "taskId": task_id,
        "subTaskId": null,
        "isParent": true,
        "userId": user_id,
        "estimatedTime": 0,
        "allocation": [{ "allocatedHrs": hours, "date": ymd(date), "allocatedDate": ymd(date) }],
        "title": "",
        "startDate": ymd(date),
        "endDate": ymd(date),
        "allocatedHours": hours,
        "assignerId": user_id,
    }])
}

pub fn time_entry_payload(
    user_id: &str,
    task_id: &str,
    task: Option<&Task>,
    date: NaiveDate,
    hours: f64,
    scheduled_id: Option<&str>,
) -> Value {
    let now = Utc::now().to_rfc3339();
    json!({
        "taskId": task_id,
        "taskTitle": task.map(|t| t.title.as_str()).unwrap_or(""),
        "userId": user_id,
        "projectId": task.map(|t| t.project_id.as_str()).unwrap_or(""),
        "teamId": "",
        "displayTeamName": "",
        "roleId": "",
        "clients": [],
        "tags": [],
        "workFrom": "office",
        "workedhours": hours,
        "workedDate": ymd(date),
        "status": "active",
        "description": "",
        "createdDate": now,
        "modifiedDate": now,
        "leave": 0,
        "removed": 0,
        "approved": "New",
        "approverId": "",
        "approvedDate": now,
        "approvalComment": "",
        "taskTime": [{ "startTime": null, "isStart": false }],
        "systemhours": 0,
        "manualhours": hours,
        "subTaskId": null,
        "sheduledTaskId": scheduled_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllocationSlot, WorkedTime};
    use crate::week::RawHours;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(id: &str, project: &str, start: &str, end: &str) -> Task {
        Task {
            id: id.into(),
            title: id.into(),
            project_id: project.into(),
            project_name: format!("P-{}", project),
            start_date: Some(d(start)),
            due_date: Some(d(end)),
            ..Default::default()
        }
    }

    fn detail(task: &str, time: &[(&str, f64)], alloc: &[(&str, f64)]) -> CalendarDetail {
        CalendarDetail {
            task_id: task.into(),
            time: time
                .iter()
                .map(|(date, h)| WorkedTime { worked_date: Some(d(date)), hours: RawHours::new(*h) })
                .collect(),
            allocation: alloc
                .iter()
                .map(|(date, h)| AllocationSlot { date: Some(d(date)), allocated_date: None, hours: RawHours::new(*h) })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_time_entries_take_precedence_over_allocations() {
        let rows = vec![detail("t1", &[("2024-06-10", 90.0)], &[("2024-06-10", 4.0), ("2024-06-11", 120.0)])];
        let entries = build_entries(rows);
        assert_eq!(entries["t1_2024-06-10"].hours, 1.5);
        assert_eq!(entries["t1_2024-06-11"].hours, 2.0);
    }

    #[test]
    fn test_grid_keys_allocations_on_date_field() {
        let mut row = detail("t1", &[], &[]);
        row.allocation.push(AllocationSlot {
            date: Some(d("2024-06-10")),
            allocated_date: Some(d("2024-06-11")),
            hours: RawHours::new(3.0),
        });
        row.allocation.push(AllocationSlot { date: None, allocated_date: Some(d("2024-06-12")), hours: RawHours::new(2.0) });
        let entries = build_entries(vec![row]);
        assert_eq!(entries["t1_2024-06-10"].hours, 3.0);
        assert!(!entries.contains_key("t1_2024-06-11"));
        assert!(!entries.contains_key("t1_2024-06-12"));
    }

    #[test]
    fn test_allocation_before_time_in_list_order_still_loses() {
        let rows = vec![
            detail("t1", &[], &[("2024-06-12", 3.0)]),
            detail("t1", &[("2024-06-12", 5.0)], &[]),
        ];
        assert_eq!(build_entries(rows)["t1_2024-06-12"].hours, 5.0);
    }

    #[test]
    fn test_apply_filters_window_and_builds_projects() {
        let mut view = TimesheetView::new("u1", d("2024-06-12"));
        let ticket = view.begin_load();
        let data = WeekData {
            tasks: vec![
                task("a", "p1", "2024-06-01", "2024-06-10"),
                task("b", "p2", "2024-06-17", "2024-06-20"),
                task("c", "p1", "2024-06-14", "2024-06-30"),
            ],
            calendar: vec![detail("a", &[("2024-06-10", 2.0)], &[]), detail("c", &[("2024-06-12", 1.0)], &[])],
        };
        assert!(view.apply(ticket, data));
        assert_eq!(view.tasks.len(), 2);
        assert_eq!(view.projects.len(), 1);
        assert!(view.is_collapsed("p1"));
        view.toggle_project("p1");
        assert!(!view.is_collapsed("p1"));
        assert_eq!(view.tasks_by_project()[0].1.len(), 2);
        assert_eq!(view.day_total(d("2024-06-12")), 1.0);
        assert_eq!(view.task_week_total("a"), 2.0);
        assert_eq!(view.week_total(), 3.0);
        assert_eq!(view.display_time("a", d("2024-06-10")), "2h");
        assert_eq!(view.display_time("a", d("2024-06-11")), "");
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut view = TimesheetView::new("u1", d("2024-06-12"));
        let first = view.begin_load();
        view.next_week();
        let second = view.begin_load();
        let late = WeekData { tasks: vec![task("old", "p", "2024-06-10", "2024-06-30")], calendar: vec![] };
        assert!(view.apply(second, WeekData::default()));
        assert!(!view.apply(first, late));
        assert!(view.tasks.is_empty());
        assert!(!view.fail(first, "boom"));
        assert!(view.error.is_none());
    }

    #[test]
    fn test_single_cell_edit_and_future_lock() {
        let mut view = TimesheetView::new("u1", d("2024-06-12"));
        assert!(!view.start_editing("a", d("2024-06-13")));
        assert!(view.start_editing("a", d("2024-06-12")));
        assert!(!view.start_editing("b", d("2024-06-10")));
        view.cancel_editing();
        assert!(view.start_editing("b", d("2024-06-10")));
        assert_eq!(view.editing.as_deref(), Some("b_2024-06-10"));
    }

    #[test]
    fn test_week_navigation() {
        let mut view = TimesheetView::new("u1", d("2024-06-12"));
        assert!(view.is_current_week());
        view.previous_week();
        assert_eq!(view.window.start, d("2024-06-03"));
        assert!(!view.is_current_week());
        view.this_week();
        assert_eq!(view.window.start, d("2024-06-10"));
    }

    #[test]
    fn test_cell_input_totals() {
        let input = CellInput { allocated_hours: 1, allocated_minutes: 30, actual_hours: 2, actual_minutes: 15 };
        assert_eq!(input.allocated(), 1.5);
        assert_eq!(input.actual(), 2.25);

        let huge = CellInput { actual_hours: u32::MAX, actual_minutes: 59, ..Default::default() };
        assert!(huge.actual() > f64::from(u32::MAX));
    }

    #[test]
    fn test_time_entry_payload_links_allocation() {
        let t = task("t1", "p1", "2024-06-01", "2024-06-30");
        let body = time_entry_payload("u1", "t1", Some(&t), d("2024-06-10"), 2.5, Some("s9"));
        assert_eq!(body["sheduledTaskId"], "s9");
        assert_eq!(body["projectId"], "p1");
        assert_eq!(body["workedhours"], 2.5);
        assert_eq!(body["manualhours"], 2.5);
        assert_eq!(body["workedDate"], "2024-06-10");
    }
}
