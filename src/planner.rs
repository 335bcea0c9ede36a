//! Daily planner board: allocated, planned and actual task lists for one day.

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result};
use crate::models::CalendarDetail;
use crate::week::format_worked_hours;

/// Ceiling on the sum of planned hours for a day.
pub const MAX_PLANNED_HOURS: f64 = 16.0;
/// Totals from here up to the ceiling need confirmation.
pub const CONFIRM_THRESHOLD: f64 = 8.0;

pub const DEFAULT_PROJECT: &str = "General";
pub const DEFAULT_PROJECT_COLOR: &str = "#3b82f6";

pub const COLOR_NOT_PLANNED: &str = "#3b82f6";
pub const COLOR_ON_PLAN: &str = "#10b981";
pub const COLOR_OVER_PLAN: &str = "#ef4444";
pub const COLOR_UNDER_PLAN: &str = "#f59e0b";

static HOURS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?").expect("HOURS_RE should compile"));

/// A card on the board. `hours` is display text such as `"2 hrs 30 min"`
/// or `"4hrs"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlannerTask {
    pub id: String,
    pub name: String,
    pub hours: String,
    pub project: String,
    pub project_color: String,
    pub project_id: String,
    pub planned_task_id: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_by_id: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    pub name: String,
    pub color: String,
    pub tasks: Vec<PlannerTask>,
}

impl TaskGroup {
    pub fn task_count(&self) -> String {
        let n = self.tasks.len();
        format!("{} task{}", n, if n == 1 { "" } else { "s" })
    }

    pub fn hours(&self) -> String {
        format_worked_hours(self.tasks.iter().map(|t| parse_leading_hours(&t.hours)).sum())
    }
}

/// Groups cards by project, keeping first-seen order.
fn group(tasks: Vec<PlannerTask>) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();
    for task in tasks {
        match groups.iter_mut().find(|g| g.name == task.project) {
            Some(g) => g.tasks.push(task),
            None => groups.push(TaskGroup {
                name: task.project.clone(),
                color: task.project_color.clone(),
                tasks: vec![task],
            }),
        }
    }
    groups
}

/// First decimal number in `s`, or 0.
///
/// ```
/// use timesheet::planner::parse_leading_hours;
/// assert_eq!(parse_leading_hours("2.5hrs"), 2.5);
/// assert_eq!(parse_leading_hours("3 hrs 30 min"), 3.0);
/// assert_eq!(parse_leading_hours("none"), 0.0);
/// ```
pub fn parse_leading_hours(s: &str) -> f64 {
    HOURS_RE
        .find(s)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// Hours from display text, reading a second number as minutes.
pub fn hours_with_minutes(s: &str) -> f64 {
    let n: Vec<f64> = HOURS_RE
        .find_iter(s)
        .take(2)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match n.as_slice() {
        [] => 0.0,
        [h] => *h,
        [h, m, ..] => h + m / 60.0,
    }
}

/// Colour for an actual-time card compared with the planned card for the
/// same task (`None` when the task was not planned).
pub fn indicator_color(planned: Option<&str>, actual: &str) -> &'static str {
    let Some(planned) = planned else {
        return COLOR_NOT_PLANNED;
    };
    let planned = hours_with_minutes(planned);
    let actual = hours_with_minutes(actual);
    if (planned - actual).abs() < 0.01 {
        COLOR_ON_PLAN
    } else if actual > planned {
        COLOR_OVER_PLAN
    } else {
        COLOR_UNDER_PLAN
    }
}

/// Asks the user to approve an action.
pub trait Confirm {
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

impl<F: FnMut(&str, &str) -> bool> Confirm for F {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self(title, message)
    }
}

/// A validated hours edit waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HoursEdit {
    pub task_id: String,
    pub hours: f64,
    pub new_total: f64,
}

impl HoursEdit {
    pub fn needs_confirmation(&self) -> bool {
        (CONFIRM_THRESHOLD..=MAX_PLANNED_HOURS).contains(&self.new_total)
    }

    pub fn prompt(&self) -> String {
        format!("Total planned hours will be {:.1} hrs. Do you want to continue?", self.new_total)
    }
}

/// Planned items and calendar rows for one day.
#[derive(Debug, Clone, Default)]
pub struct DayData {
    pub planned: Vec<PlannerTask>,
    pub calendar: Vec<CalendarDetail>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedItemPayload<'a> {
    task_id: &'a str,
    title: &'a str,
    hours: &'a str,
    project: &'a str,
    project_color: &'a str,
    assigned_by: &'a str,
    assigned_by_id: &'a str,
    assigned_to: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedHoursPayload<'a> {
    task_id: &'a str,
    title: &'a str,
    planned_hours: String,
    project_name: &'a str,
    project_color: &'a str,
    assigned_by: &'a str,
    assigned_by_id: &'a str,
    assigned_to: &'a str,
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub async fn fetch_planned(api: &ApiClient, user_id: &str, date: NaiveDate) -> Result<Vec<PlannerTask>> {
    let raw: Value = api
        .get("planned/", &[("userId", Some(user_id.to_string())), ("date", Some(ymd(date)))])
        .await?;
    Ok(parse::parse_planned(&raw))
}

pub async fn fetch_day(api: &ApiClient, user_id: &str, date: NaiveDate) -> Result<DayData> {
    let planned = fetch_planned(api, user_id, date).await?;
    let raw: Value = api
        .get(
            "planner/calendardetail",
            &[
                ("userId", Some(user_id.to_string())),
                ("start", Some(ymd(date))),
                ("end", Some(ymd(date))),
            ],
        )
        .await?;
    Ok(DayData { planned, calendar: parse::parse_calendar_detail(&raw) })
}

#[derive(Debug, Clone)]
pub struct PlannerBoard {
    pub user_id: String,
    pub user_name: String,
    pub today: NaiveDate,
    pub date: NaiveDate,
    pub allocated: Vec<TaskGroup>,
    pub planned: Vec<TaskGroup>,
    pub actual: Vec<TaskGroup>,
    pub error: Option<String>,
    generation: u64,
}

impl PlannerBoard {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            today,
            date: today,
            allocated: Vec::new(),
            planned: Vec::new(),
            actual: Vec::new(),
            error: None,
            generation: 0,
        }
    }

    pub fn latest_selectable(&self) -> NaiveDate {
        self.today + Days::new(1)
    }

    pub fn previous_day(&mut self) {
        self.date = self.date - Days::new(1);
    }

    pub fn next_day(&mut self) -> Result<()> {
        self.set_date(self.date + Days::new(1))
    }

    /// Any date up to tomorrow.
    pub fn set_date(&mut self, date: NaiveDate) -> Result<()> {
        if date > self.latest_selectable() {
            return Err(Error::Validation("Cannot select dates beyond tomorrow".to_string()));
        }
        self.date = date;
        Ok(())
    }

    pub fn go_to_today(&mut self) {
        self.date = self.today;
    }

    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Rebuilds all three lists. A superseded ticket changes nothing.
    pub fn apply_day(&mut self, ticket: u64, data: DayData) -> bool {
        if ticket != self.generation {
            debug!(ticket, latest = self.generation, "Dropping stale planner response");
            return false;
        }
        self.planned = group(data.planned);
        let mut allocated = Vec::new();
        let mut actual = Vec::new();
        for row in data.calendar {
            let project = row.project_name.clone().unwrap_or_else(|| DEFAULT_PROJECT.to_string());
            let card = |hours: f64| PlannerTask {
                id: row.task_id.clone(),
                name: row.title.clone(),
                hours: format_worked_hours(hours),
                project: project.clone(),
                project_color: DEFAULT_PROJECT_COLOR.to_string(),
                project_id: row.project_id.clone(),
                ..Default::default()
            };
            for slot in &row.allocation {
                let hours = slot.hours.clone().into_hours();
                if slot.planned_day() == Some(self.date) && hours > 0.0 {
                    allocated.push(card(hours));
                }
            }
            for t in &row.time {
                let hours = t.hours.clone().into_hours();
                if t.worked_date == Some(self.date) && hours > 0.0 {
                    actual.push(card(hours));
                }
            }
        }
        self.allocated = group(allocated);
        self.actual = group(actual);
        self.refresh_actual_colors();
        self.error = None;
        true
    }

    pub fn fail(&mut self, ticket: u64, message: impl Into<String>) {
        if ticket == self.generation {
            self.allocated.clear();
            self.planned.clear();
            self.actual.clear();
            self.error = Some(message.into());
        }
    }

    pub async fn load_day(&mut self, api: &ApiClient) -> Result<()> {
        let ticket = self.begin_load();
        match fetch_day(api, &self.user_id, self.date).await {
            Ok(data) => {
                self.apply_day(ticket, data);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, date = %self.date, "Failed to load planner day");
                self.fail(ticket, e.to_string());
                Err(e)
            }
        }
    }

    async fn reload_planned(&mut self, api: &ApiClient) -> Result<()> {
        let ticket = self.begin_load();
        let planned = fetch_planned(api, &self.user_id, self.date).await?;
        if ticket == self.generation {
            self.planned = group(planned);
            self.refresh_actual_colors();
        }
        Ok(())
    }

    pub fn planned_tasks(&self) -> impl Iterator<Item = &PlannerTask> {
        self.planned.iter().flat_map(|g| g.tasks.iter())
    }

    pub fn find_planned(&self, task_id: &str) -> Option<&PlannerTask> {
        self.planned_tasks().find(|t| t.id == task_id)
    }

    pub fn find_allocated(&self, task_id: &str) -> Option<&PlannerTask> {
        self.allocated.iter().flat_map(|g| g.tasks.iter()).find(|t| t.id == task_id)
    }

    pub fn planned_total(&self) -> f64 {
        self.planned_tasks().map(|t| parse_leading_hours(&t.hours)).sum()
    }

    fn total(groups: &[TaskGroup]) -> String {
        format_worked_hours(groups.iter().flat_map(|g| g.tasks.iter()).map(|t| parse_leading_hours(&t.hours)).sum())
    }

    pub fn allocated_hours(&self) -> String {
        Self::total(&self.allocated)
    }

    pub fn planned_hours(&self) -> String {
        Self::total(&self.planned)
    }

    pub fn actual_hours(&self) -> String {
        Self::total(&self.actual)
    }

    fn refresh_actual_colors(&mut self) {
        let planned: Vec<(String, String)> =
            self.planned_tasks().map(|t| (t.id.clone(), t.hours.clone())).collect();
        for task in self.actual.iter_mut().flat_map(|g| g.tasks.iter_mut()) {
            let plan = planned.iter().find(|(id, _)| *id == task.id).map(|(_, h)| h.as_str());
            task.project_color = indicator_color(plan, &task.hours).to_string();
        }
    }

    fn payload_item<'a>(&'a self, t: &'a PlannerTask) -> PlannedItemPayload<'a> {
        PlannedItemPayload {
            task_id: &t.id,
            title: &t.name,
            hours: &t.hours,
            project: &t.project,
            project_color: &t.project_color,
            assigned_by: t.assigned_by.as_deref().unwrap_or(&self.user_name),
            assigned_by_id: t.assigned_by_id.as_deref().unwrap_or(&self.user_id),
            assigned_to: t.assigned_to.as_deref().unwrap_or(&self.user_name),
        }
    }

    /// Checks a drop without changing anything.
    pub fn check_drop(&self, task: &PlannerTask) -> Result<()> {
        if self.find_planned(&task.id).is_some() {
            return Err(Error::Validation("This task is already in your planned list.".to_string()));
        }
        let current = self.planned_total();
        if current + parse_leading_hours(&task.hours) > MAX_PLANNED_HOURS {
            return Err(Error::Validation(format!(
                "Cannot add task. Total planned hours would exceed 16 hrs. Current: {:.1} hrs, Available: {:.1} hrs",
                current,
                MAX_PLANNED_HOURS - current
            )));
        }
        Ok(())
    }

    /// Adds a card to the planned list: posts the full list, then reloads it.
    pub async fn drop_task(&mut self, api: &ApiClient, task: &PlannerTask) -> Result<()> {
        self.check_drop(task)?;
        let mut dropped = task.clone();
        dropped.assigned_by = Some(self.user_name.clone());
        dropped.assigned_by_id = Some(self.user_id.clone());
        dropped.assigned_to = Some(self.user_name.clone());
        let tasks: Vec<PlannedItemPayload> = self
            .planned_tasks()
            .chain(std::iter::once(&dropped))
            .map(|t| self.payload_item(t))
            .collect();
        let body = serde_json::json!({ "userId": self.user_id, "date": ymd(self.date), "tasks": tasks });
        let _: Value = api.post("planned/", &body).await?;
        info!(task = %task.id, date = %self.date, "Task added to planned list");
        self.reload_planned(api).await
    }

    /// Posts the list without the task, then drops it locally.
    pub async fn remove_planned(&mut self, api: &ApiClient, task_id: &str) -> Result<()> {
        if self.find_planned(task_id).is_none() {
            return Err(Error::NotFound(format!("Planned task {}", task_id)));
        }
        let tasks: Vec<PlannedItemPayload> = self
            .planned_tasks()
            .filter(|t| t.id != task_id)
            .map(|t| self.payload_item(t))
            .collect();
        let body = serde_json::json!({ "userId": self.user_id, "date": ymd(self.date), "tasks": tasks });
        let _: Value = api.post("planned/", &body).await?;
        for g in &mut self.planned {
            g.tasks.retain(|t| t.id != task_id);
        }
        self.planned.retain(|g| !g.tasks.is_empty());
        self.refresh_actual_colors();
        info!(task = task_id, "Task removed from planned list");
        Ok(())
    }

    /// Validates an hours edit for a planned card.
    pub fn check_hours_edit(&self, task_id: &str, input: &str) -> Result<HoursEdit> {
        let task = self
            .find_planned(task_id)
            .ok_or_else(|| Error::NotFound(format!("Planned task {}", task_id)))?;
        if task.assigned_by_id.as_deref() != Some(self.user_id.as_str()) {
            return Err(Error::Validation("You can only edit tasks that you created.".to_string()));
        }
        let hours: f64 = input
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("'{}' is not a number of hours", input)))?;
        if !hours.is_finite() {
            return Err(Error::Validation(format!("'{}' is not a number of hours", input)));
        }
        if hours > MAX_PLANNED_HOURS {
            return Err(Error::Validation("Hours cannot exceed 16".to_string()));
        }
        if hours <= 0.0 {
            return Err(Error::Validation("Hours must be greater than 0".to_string()));
        }
        let others: f64 = self
            .planned_tasks()
            .filter(|t| t.id != task_id)
            .map(|t| parse_leading_hours(&t.hours))
            .sum();
        let new_total = others + hours;
        if new_total > MAX_PLANNED_HOURS {
            return Err(Error::Validation(format!(
                "Total planned hours cannot exceed 16. Current total (excluding this task): {:.1} hrs. Maximum you can set: {:.1} hrs",
                others,
                MAX_PLANNED_HOURS - others
            )));
        }
        Ok(HoursEdit { task_id: task_id.to_string(), hours, new_total })
    }

    /// Sends a validated edit as `PUT planned/{plannedTaskId}`.
    pub async fn commit_hours(&mut self, api: &ApiClient, edit: &HoursEdit) -> Result<()> {
        let task = self
            .find_planned(&edit.task_id)
            .ok_or_else(|| Error::NotFound(format!("Planned task {}", edit.task_id)))?;
        let planned_id = task
            .planned_task_id
            .clone()
            .ok_or_else(|| Error::NotFound(format!("Planned entry for task {}", edit.task_id)))?;
        let new_hours = format!("{}hrs", edit.hours);
        let body = PlannedHoursPayload {
            task_id: &task.id,
            title: &task.name,
            planned_hours: new_hours.clone(),
            project_name: &task.project,
            project_color: &task.project_color,
            assigned_by: task.assigned_by.as_deref().unwrap_or(&self.user_name),
            assigned_by_id: task.assigned_by_id.as_deref().unwrap_or(&self.user_id),
            assigned_to: task.assigned_to.as_deref().unwrap_or(&self.user_name),
        };
        let _: Value = api.put(&format!("planned/{}", planned_id), &body).await?;
        if let Some(t) = self
            .planned
            .iter_mut()
            .flat_map(|g| g.tasks.iter_mut())
            .find(|t| t.id == edit.task_id)
        {
            t.hours = new_hours;
        }
        self.refresh_actual_colors();
        info!(task = %edit.task_id, hours = edit.hours, "Planned hours updated");
        Ok(())
    }

    /// Validates, confirms when the total lands in the 8 to 16 band, then
    /// commits. Returns false when the user declined.
    pub async fn edit_hours<C: Confirm>(
        &mut self,
        api: &ApiClient,
        task_id: &str,
        input: &str,
        confirm: &mut C,
    ) -> Result<bool> {
        let edit = self.check_hours_edit(task_id, input)?;
        if edit.needs_confirmation() && !confirm.confirm("Confirm Hours Update", &edit.prompt()) {
            return Ok(false);
        }
        self.commit_hours(api, &edit).await?;
        Ok(true)
    }
}
