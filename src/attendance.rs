//! Monthly attendance grid.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde_json::Value;
use tracing::warn;

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::Result;
use crate::models::{join_name, DirectoryUser, SessionUser};

pub const DEFAULT_TEAM: &str = "APPLICATIONS DEVELOPMENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Leave,
    WeekOff,
    Holiday,
    CompOff,
    HalfDay,
    Wfh,
    Maternity,
    Paternity,
}

impl AttendanceStatus {
    /// Maps a day code; unknown or empty codes have no status.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "P" => Some(Self::Present),
            "A" => Some(Self::Leave),
            "W" => Some(Self::WeekOff),
            "O" => Some(Self::Holiday),
            "C" => Some(Self::CompOff),
            "HL" => Some(Self::HalfDay),
            "WFH" => Some(Self::Wfh),
            "M" => Some(Self::Maternity),
            "PT" => Some(Self::Paternity),
            _ => None,
        }
    }

    /// Short cell label for the month grid.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Present => "P",
            Self::Leave => "A",
            Self::WeekOff => "W",
            Self::Holiday => "O",
            Self::CompOff => "C",
            Self::HalfDay => "HL",
            Self::Wfh => "WFH",
            Self::Maternity => "M",
            Self::Paternity => "PT",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Present => "present",
            Self::Leave => "leave",
            Self::WeekOff => "week-off",
            Self::Holiday => "holiday",
            Self::CompOff => "comp-off",
            Self::HalfDay => "half-day",
            Self::Wfh => "wfh",
            Self::Maternity => "maternity",
            Self::Paternity => "paternity",
        };
        f.write_str(s)
    }
}

/// One employee's month as returned by `attendance/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceRecord {
    pub user_id: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub present_days: Option<f64>,
    pub total_working_days: Option<f64>,
    pub non_present_days: Option<f64>,
    pub official_leave_days: Option<f64>,
    pub leave_balance: Option<f64>,
    /// Day of month to raw status code.
    pub day_codes: HashMap<u32, String>,
}

impl AttendanceRecord {
    pub fn display_name(&self) -> String {
        let name = join_name(&self.first_name, &self.middle_name, &self.last_name);
        if !name.is_empty() {
            name
        } else {
            self.email.clone().unwrap_or_else(|| "Unknown".to_string())
        }
    }

    pub fn status_on(&self, day: u32) -> Option<AttendanceStatus> {
        self.day_codes.get(&day).and_then(|c| AttendanceStatus::from_code(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub date: NaiveDate,
    pub day_num: u32,
}

impl MonthDay {
    /// "Mon", "Tue", ...
    pub fn day_name(&self) -> String {
        self.date.format("%a").to_string()
    }
}

/// A calendar month, held as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    pub fn containing(date: NaiveDate) -> Self {
        Self { first: date.with_day(1).unwrap_or(date) }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d").ok().map(Self::containing)
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.first)
    }

    pub fn days(&self) -> Vec<MonthDay> {
        self.first
            .iter_days()
            .take_while(|d| *d <= self.last())
            .map(|date| MonthDay { date, day_num: date.day() })
            .collect()
    }

    /// "June 2024"
    pub fn label(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

/// How much of the team the caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Developer,
    TeamLead,
    Manager,
}

impl Viewer {
    /// Anyone who is neither a team lead nor a manager is a developer.
    pub fn from_role(role: Option<&str>) -> Self {
        match role.map(str::to_lowercase).as_deref() {
            Some("team lead") => Self::TeamLead,
            Some("manager") => Self::Manager,
            _ => Self::Developer,
        }
    }

    /// Roles a viewer may pick from the employee list.
    pub fn selectable_roles(&self) -> &'static [&'static str] {
        match self {
            Self::Developer => &[],
            Self::TeamLead => &["developer"],
            Self::Manager => &["developer", "team lead"],
        }
    }
}

/// Totals and day statuses for one employee, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeMonth {
    pub user_id: String,
    pub name: String,
    pub present_days: f64,
    pub total_days: f64,
    pub leave_days: f64,
    pub official_holidays: f64,
    pub leave_balance: f64,
    pub days: Vec<(MonthDay, Option<AttendanceStatus>)>,
}

impl EmployeeMonth {
    pub fn from_record(record: &AttendanceRecord, month: &Month) -> Self {
        let days = month.days();
        let total_fallback = days.len() as f64;
        Self {
            user_id: record.user_id.clone(),
            name: record.display_name(),
            present_days: record.present_days.unwrap_or(0.0),
            total_days: record.total_working_days.filter(|t| *t > 0.0).unwrap_or(total_fallback),
            leave_days: record.non_present_days.unwrap_or(0.0),
            official_holidays: record.official_leave_days.unwrap_or(0.0),
            leave_balance: record.leave_balance.unwrap_or(0.0),
            days: days.into_iter().map(|d| (d, record.status_on(d.day_num))).collect(),
        }
    }
}

pub struct AttendanceQuery {
    pub month: Month,
    pub team: String,
    /// Explicit employee selection; overrides the viewer's default.
    pub employee: Option<String>,
}

impl AttendanceQuery {
    pub fn new(month: Month) -> Self {
        Self { month, team: DEFAULT_TEAM.to_string(), employee: None }
    }

    /// `st`, `ed`, `tm`, and `userId` for developers.
    pub fn params(&self, viewer: Viewer, user_id: &str) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("st", Some(self.month.first().to_string())),
            ("ed", Some(self.month.last().to_string())),
            ("tm", Some(self.team.clone())),
            ("userId", (viewer == Viewer::Developer).then(|| user_id.to_string())),
        ]
    }
}

/// Narrows the team's records to what the viewer sees.
pub fn scope_records(records: Vec<AttendanceRecord>, employee: Option<&str>, user_id: &str) -> Vec<AttendanceRecord> {
    let wanted = employee.unwrap_or(user_id);
    records.into_iter().filter(|r| r.user_id == wanted).collect()
}

/// `(user_id, name)` pairs the viewer may switch to. Falls back to everyone
/// in the records when the directory is unavailable.
pub fn selectable_employees(
    records: &[AttendanceRecord],
    directory: Option<&[DirectoryUser]>,
    viewer: Viewer,
) -> Vec<(String, String)> {
    if viewer == Viewer::Developer {
        return Vec::new();
    }
    let allowed: Option<Vec<&str>> = directory.map(|users| {
        users
            .iter()
            .filter(|u| {
                u.role()
                    .map(str::to_lowercase)
                    .is_some_and(|r| viewer.selectable_roles().contains(&r.as_str()))
            })
            .map(|u| u.id.as_str())
            .collect()
    });
    records
        .iter()
        .filter(|r| allowed.as_ref().map_or(true, |ids| ids.contains(&r.user_id.as_str())))
        .map(|r| (r.user_id.clone(), r.display_name()))
        .collect()
}

/// A loaded attendance month.
#[derive(Debug, Clone)]
pub struct AttendanceView {
    pub month: Month,
    pub employees: Vec<EmployeeMonth>,
    pub selectable: Vec<(String, String)>,
}

impl AttendanceView {
    pub async fn load(api: &ApiClient, user: &SessionUser, query: &AttendanceQuery) -> Result<Self> {
        let viewer = Viewer::from_role(user.user_role.as_deref());
        let raw: Value = api.get("attendance/", &query.params(viewer, &user.id)).await?;
        let records = parse::parse_attendance(&raw);

        let directory = if viewer == Viewer::Developer {
            None
        } else {
            match api.get::<Value>("users", &[("team", Some(query.team.clone()))]).await {
                Ok(v) => Some(parse::parse_directory_users(&v)),
                Err(e) => {
                    warn!(error = %e, "Could not load users for employee list");
                    None
                }
            }
        };
        let selectable = selectable_employees(&records, directory.as_deref(), viewer);

        let employees = scope_records(records, query.employee.as_deref(), &user.id)
            .iter()
            .map(|r| EmployeeMonth::from_record(r, &query.month))
            .collect();
        Ok(Self { month: query.month, employees, selectable })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRef;

    fn record(id: &str, first: &str) -> AttendanceRecord {
        AttendanceRecord { user_id: id.into(), first_name: first.into(), ..Default::default() }
    }

    #[test]
    fn test_status_codes_case_insensitive() {
        assert_eq!(AttendanceStatus::from_code("p"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::from_code("wfh"), Some(AttendanceStatus::Wfh));
        assert_eq!(AttendanceStatus::from_code("HL"), Some(AttendanceStatus::HalfDay));
        assert_eq!(AttendanceStatus::from_code("X"), None);
        assert_eq!(AttendanceStatus::from_code(""), None);
    }

    #[test]
    fn test_month_days() {
        let feb = Month::parse("2024-02").unwrap();
        assert_eq!(feb.days().len(), 29);
        assert_eq!(feb.last().to_string(), "2024-02-29");
        assert_eq!(feb.days()[0].day_name(), "Thu");
        assert_eq!(feb.label(), "February 2024");
        assert!(Month::parse("2024-13").is_none());
    }

    #[test]
    fn test_viewer_roles() {
        assert_eq!(Viewer::from_role(Some("Team Lead")), Viewer::TeamLead);
        assert_eq!(Viewer::from_role(Some("manager")), Viewer::Manager);
        assert_eq!(Viewer::from_role(Some("designer")), Viewer::Developer);
        assert_eq!(Viewer::from_role(None), Viewer::Developer);
    }

    #[test]
    fn test_params_send_user_only_for_developers() {
        let q = AttendanceQuery::new(Month::parse("2024-06").unwrap());
        let dev = q.params(Viewer::Developer, "u1");
        assert_eq!(dev[0].1.as_deref(), Some("2024-06-01"));
        assert_eq!(dev[1].1.as_deref(), Some("2024-06-30"));
        assert_eq!(dev[3].1.as_deref(), Some("u1"));
        assert_eq!(q.params(Viewer::Manager, "u1")[3].1, None);
    }

    #[test]
    fn test_scope_defaults_to_own_record() {
        let records = vec![record("u1", "Asha"), record("u2", "Ben")];
        let own = scope_records(records.clone(), None, "u1");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user_id, "u1");
        let picked = scope_records(records, Some("u2"), "u1");
        assert_eq!(picked[0].user_id, "u2");
    }

    #[test]
    fn test_selectable_by_role() {
        let records = vec![record("u1", "Asha"), record("u2", "Ben"), record("u3", "Cy")];
        let user = |id: &str, role: &str| DirectoryUser {
            id: id.into(),
            teams: vec![TeamRef { role: role.into(), ..Default::default() }],
            ..Default::default()
        };
        let dir = vec![user("u1", "manager"), user("u2", "Developer"), user("u3", "team lead")];
        let lead = selectable_employees(&records, Some(&dir), Viewer::TeamLead);
        assert_eq!(lead, vec![("u2".to_string(), "Ben".to_string())]);
        assert_eq!(selectable_employees(&records, Some(&dir), Viewer::Manager).len(), 2);
        assert_eq!(selectable_employees(&records, None, Viewer::Manager).len(), 3);
        assert!(selectable_employees(&records, Some(&dir), Viewer::Developer).is_empty());
    }

    #[test]
    fn test_employee_month_fallbacks() {
        let mut r = record("u1", "");
        r.email = Some("a@x.io".into());
        r.day_codes.insert(3, "P".into());
        let month = Month::parse("2024-06").unwrap();
        let m = EmployeeMonth::from_record(&r, &month);
        assert_eq!(m.name, "a@x.io");
        assert_eq!(m.total_days, 30.0);
        assert_eq!(m.days[2].1, Some(AttendanceStatus::Present));
        assert_eq!(m.days[3].1, None);
    }
}
