use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::week::RawHours;

/// The logged-in user as persisted in the session store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub emp_id: Option<String>,
    #[serde(default)]
    pub site_role: Option<String>,
    /// Role within the first team, e.g. "developer", "team lead", "manager".
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub teams: Vec<TeamRef>,
}

impl SessionUser {
    pub fn first_team(&self) -> Option<&TeamRef> {
        self.teams.first()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: String,
}

/// A task as returned for a user, with at most one level of subtasks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub project_id: String,
    pub project_name: String,
    /// Backend status text, before display mapping.
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub allocated_hours: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    /// True when the task's [start, due] span touches [from, to].
    /// Tasks missing either date never overlap.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        match (self.start_date, self.due_date) {
            (Some(start), Some(due)) => start <= to && due >= from,
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub allocated_hours: f64,
}

/// Worked hours for one (task, date) cell.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimesheetEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub task_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub minutes: u32,
}

impl TimesheetEntry {
    pub fn total_hours(&self) -> f64 {
        self.hours + f64::from(self.minutes) / 60.0
    }
}

/// One task row of the calendar-detail endpoint: worked time and allocations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalendarDetail {
    pub task_id: String,
    pub title: String,
    pub project_id: String,
    pub project_name: Option<String>,
    pub time: Vec<WorkedTime>,
    pub allocation: Vec<AllocationSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkedTime {
    pub worked_date: Option<NaiveDate>,
    pub hours: RawHours,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSlot {
    /// The row's `date` field, which the weekly grid keys on.
    pub date: Option<NaiveDate>,
    pub allocated_date: Option<NaiveDate>,
    pub hours: RawHours,
}

impl AllocationSlot {
    /// Day the planner files the slot under: `allocatedDate`, else `date`.
    pub fn planned_day(&self) -> Option<NaiveDate> {
        self.allocated_date.or(self.date)
    }
}

/// Minimal `{id, name}` record used for clients and buckets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

/// A user from the directory endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DirectoryUser {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub user_image: Option<String>,
    #[serde(default)]
    pub teams: Vec<TeamRef>,
}

impl DirectoryUser {
    pub fn full_name(&self) -> String {
        join_name(&self.first_name, &self.middle_name, &self.last_name)
    }

    pub fn role(&self) -> Option<&str> {
        self.teams.first().map(|t| t.role.as_str())
    }
}

/// Joins name parts, collapsing the gaps left by empty parts.
pub fn join_name(first: &str, middle: &str, last: &str) -> String {
    [first, middle, last]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
