//! Response normalization.
//!
//! The API answers with arrays, single objects and "first element" wrappers
//! depending on the endpoint, and nested fields go missing. Each parser here
//! turns one endpoint's JSON into a fixed record, applying every literal
//! fallback in one place.

use std::collections::HashMap;

use chrono::{NaiveDate, Weekday};
use serde_json::{Map, Value};

use crate::attendance::AttendanceRecord;
use crate::leave::{LeaveBalance, LeaveDetails, LeaveHistoryItem, OfficialLeave};
use crate::models::{
    AllocationSlot, CalendarDetail, DirectoryUser, NamedRef, SessionUser, Subtask, Task, TeamRef,
    WorkedTime,
};
use crate::planner::{PlannerTask, DEFAULT_PROJECT, DEFAULT_PROJECT_COLOR};
use crate::projects::{Bucket, Project, ProjectUser, ProjectUsers};
use crate::shifts::{Shift, ShiftRoster};
use crate::tasks::WorkItem;
use crate::week::{parse_api_date, RawHours};

/// An array's first element, or the value itself when it is an object.
pub fn first_object(v: &Value) -> Option<&Map<String, Value>> {
    match v {
        Value::Array(items) => items.first().and_then(Value::as_object),
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// The value as a list; objects become a one-element list, anything else empty.
pub fn as_list(v: &Value) -> Vec<&Value> {
    match v {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![v],
        _ => Vec::new(),
    }
}

/// First key holding a non-empty string (numbers are stringified).
pub fn text(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn text_or(v: &Value, keys: &[&str], fallback: &str) -> String {
    text(v, keys).unwrap_or_else(|| fallback.to_string())
}

/// First key holding a number or a numeric string.
pub fn number(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match v.get(*k) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn date(v: &Value, keys: &[&str]) -> Option<NaiveDate> {
    text(v, keys).as_deref().and_then(parse_api_date)
}

fn strings(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn dates(v: Option<&Value>) -> Vec<NaiveDate> {
    strings(v).iter().filter_map(|s| parse_api_date(s)).collect()
}

fn items<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn teams(v: &Value) -> Vec<TeamRef> {
    items(v, "team")
        .iter()
        .map(|t| TeamRef {
            id: text_or(t, &["_id", "id"], ""),
            name: text_or(t, &["name"], ""),
            display_name: text_or(t, &["displayName"], ""),
            role: text_or(t, &["role"], ""),
        })
        .collect()
}

/// `users?email=` → the session user, when the lookup found one with an id.
pub fn parse_user_lookup(v: &Value) -> Option<SessionUser> {
    let map = first_object(v)?;
    let user = Value::Object(map.clone());
    let id = text(&user, &["_id"])?;
    let name = format!(
        "{} {}",
        text_or(&user, &["firstName"], ""),
        text_or(&user, &["lastName"], "")
    )
    .trim()
    .to_string();
    let teams = teams(&user);
    Some(SessionUser {
        id,
        name,
        email: text_or(&user, &["email"], ""),
        emp_id: text(&user, &["empId"]),
        site_role: text(&user, &["siteRole"]),
        user_role: teams.first().map(|t| t.role.clone()).filter(|r| !r.is_empty()),
        status: text(&user, &["status"]),
        image: text(&user, &["userImage"]),
        teams,
    })
}

/// `sitepermisssion/` → the permission object (first element if an array).
pub fn parse_permissions(v: &Value) -> Value {
    first_object(v).map(|m| Value::Object(m.clone())).unwrap_or(Value::Null)
}

fn parse_task(t: &Value) -> Option<Task> {
    let id = text(t, &["_id", "id"])?;
    let project = t.get("project").cloned().unwrap_or(Value::Null);
    Some(Task {
        id,
        title: text_or(t, &["title", "name"], ""),
        project_id: text(&project, &["id", "_id"])
            .or_else(|| text(t, &["project_id", "projectId"]))
            .unwrap_or_default(),
        project_name: text_or(&project, &["name"], ""),
        status: text_or(t, &["status"], "TODO"),
        priority: text(t, &["priority"]),
        assignee: text(t, &["assignee", "assignedTo"]),
        start_date: date(t, &["startDate", "start_date"]),
        due_date: date(t, &["endDate", "dueDate", "due_date"]),
        allocated_hours: number(t, &["allocatedHours", "allocated_hours"]).unwrap_or(0.0),
        tags: tag_names(t.get("tags")),
        subtasks: items(t, "subtasks")
            .iter()
            .filter_map(|s| {
                Some(Subtask {
                    id: text(s, &["_id", "id"])?,
                    title: text_or(s, &["title", "name"], ""),
                    status: text_or(s, &["status"], "TODO"),
                    allocated_hours: number(s, &["allocatedHours"]).unwrap_or(0.0),
                })
            })
            .collect(),
    })
}

/// Tags arrive as ids, `{name}` or `{tagName}` objects.
fn tag_names(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| match tag {
                    Value::String(s) => Some(s.clone()),
                    other => text(other, &["name", "tagName"]),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `tasks/{userId}` → tasks with project, dates, hours and subtasks.
pub fn parse_week_tasks(v: &Value) -> Vec<Task> {
    as_list(v).into_iter().filter_map(parse_task).collect()
}

/// `tasks/new/{userId}` → the project groups and their flattened task rows.
pub fn parse_my_work(v: &Value) -> (Vec<NamedRef>, Vec<WorkItem>) {
    let mut projects = Vec::new();
    let mut work = Vec::new();
    for group in as_list(v) {
        if let (Some(id), Some(name)) = (text(group, &["id"]), text(group, &["name"])) {
            projects.push(NamedRef { id: id.clone(), name: name.clone() });
            for t in items(group, "tasks") {
                if let Some(mut task) = parse_task(t) {
                    if task.project_id.is_empty() {
                        task.project_id = id.clone();
                        task.project_name = name.clone();
                    }
                    work.push(WorkItem {
                        task,
                        parent_id: text(t, &["parentTask", "parentId", "parent_id", "parentTaskId"]),
                    });
                }
            }
        }
    }
    (projects, work)
}

/// `planner/calendardetail` → per-task worked time and allocation rows.
pub fn parse_calendar_detail(v: &Value) -> Vec<CalendarDetail> {
    as_list(v)
        .into_iter()
        .filter_map(|entry| {
            let task_id = text(entry, &["taskId"])?;
            let project = entry.get("project").cloned().unwrap_or(Value::Null);
            Some(CalendarDetail {
                task_id,
                title: text_or(entry, &["title", "mainTaskTitle"], "Unnamed Task"),
                project_id: text_or(&project, &["id", "_id"], ""),
                project_name: text(&project, &["name"]),
                time: items(entry, "time")
                    .iter()
                    .map(|t| WorkedTime {
                        worked_date: date(t, &["workedDate"]),
                        hours: RawHours::new(number(t, &["workedhours", "manualhours"]).unwrap_or(0.0)),
                    })
                    .collect(),
                allocation: items(entry, "allocation")
                    .iter()
                    .map(|a| AllocationSlot {
                        date: date(a, &["date"]),
                        allocated_date: date(a, &["allocatedDate"]),
                        hours: RawHours::new(number(a, &["allocatedHrs"]).unwrap_or(0.0)),
                    })
                    .collect(),
            })
        })
        .collect()
}

/// `planned/` → planned items for one day.
pub fn parse_planned(v: &Value) -> Vec<PlannerTask> {
    as_list(v)
        .into_iter()
        .filter_map(|p| {
            Some(PlannerTask {
                id: text(p, &["taskId"])?,
                name: text_or(p, &["title"], ""),
                hours: text_or(p, &["plannedHours", "hours"], "0hrs"),
                project: text_or(p, &["projectName", "project"], DEFAULT_PROJECT),
                project_color: text_or(p, &["projectColor"], DEFAULT_PROJECT_COLOR),
                project_id: String::new(),
                planned_task_id: text(p, &["_id"]),
                assigned_by: text(p, &["assignedBy"]),
                assigned_by_id: text(p, &["assignedById"]),
                assigned_to: text(p, &["assignedTo"]),
            })
        })
        .collect()
}

/// Id of a created record: `{_id}` or `[{_id}]`.
pub fn parse_created_id(v: &Value) -> Option<String> {
    first_object(v).and_then(|m| m.get("_id")).and_then(|id| match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// `users` → directory entries.
pub fn parse_directory_users(v: &Value) -> Vec<DirectoryUser> {
    as_list(v)
        .into_iter()
        .filter_map(|u| {
            Some(DirectoryUser {
                id: text(u, &["_id", "id", "userId"])?,
                first_name: text_or(u, &["firstName"], ""),
                middle_name: text_or(u, &["middleName"], ""),
                last_name: text_or(u, &["lastName"], ""),
                email: text_or(u, &["email"], ""),
                user_image: text(u, &["userImage", "image"]),
                teams: teams(u),
            })
        })
        .collect()
}

/// `clients` / `buckets` → `{id, name}` records.
pub fn parse_named(v: &Value) -> Vec<NamedRef> {
    as_list(v)
        .into_iter()
        .filter_map(|n| {
            Some(NamedRef { id: text(n, &["_id", "id"])?, name: text_or(n, &["name"], "") })
        })
        .collect()
}

fn project_users(v: &Value, key: &str) -> Vec<ProjectUser> {
    items(v, key)
        .iter()
        .filter_map(|u| serde_json::from_value(u.clone()).ok())
        .collect()
}

/// `projects` → projects with clients, buckets and role lists.
pub fn parse_projects(v: &Value) -> Vec<Project> {
    as_list(v)
        .into_iter()
        .filter_map(|p| {
            let users = p.get("users").cloned().unwrap_or(Value::Null);
            Some(Project {
                id: text(p, &["_id", "id"])?,
                name: text_or(p, &["name"], ""),
                status: text(p, &["status"]),
                created_by: text(p, &["createdBy"]),
                creator_id: text(p, &["creatorId"]),
                created_date: text(p, &["createdDate", "created_at"]),
                modified_date: text(p, &["modifiedDate"]),
                clients: items(p, "clients")
                    .iter()
                    .map(|c| NamedRef {
                        id: text_or(c, &["id", "_id"], ""),
                        name: text_or(c, &["name"], ""),
                    })
                    .collect(),
                buckets: items(p, "buckets")
                    .iter()
                    .map(|b| Bucket {
                        name: text_or(b, &["name"], ""),
                        project: text_or(b, &["project"], ""),
                    })
                    .collect(),
                users: ProjectUsers {
                    assigned: project_users(&users, "assigned"),
                    incharge: project_users(&users, "incharge"),
                    owner: project_users(&users, "owner"),
                    removed: project_users(&users, "removed"),
                },
                time_entry: p.get("timeEntry").and_then(Value::as_bool).unwrap_or(true),
            })
        })
        .collect()
}

/// `leave/leavedetails/` → balances, week-offs, official and applied dates.
pub fn parse_leave_details(v: &Value) -> LeaveDetails {
    let balance = v.get("leaveBalance").cloned().unwrap_or(Value::Null);
    let mut week_offs: HashMap<u32, Vec<Weekday>> = HashMap::new();
    if let Some(map) = v.get("userWeekOffs").and_then(Value::as_object) {
        for (week, days) in map {
            if let Ok(week) = week.parse::<u32>() {
                let days = strings(Some(days)).iter().filter_map(|d| d.parse().ok()).collect();
                week_offs.insert(week, days);
            }
        }
    }
    LeaveDetails {
        teams: teams(v),
        balance: LeaveBalance {
            cl: number(&balance, &["CL"]).unwrap_or(0.0),
            sl: number(&balance, &["SL"]).unwrap_or(0.0),
            el: number(&balance, &["EL"]).unwrap_or(0.0),
            upl: number(&balance, &["upl"]).unwrap_or(0.0),
            permission: number(&balance, &["permission"]).unwrap_or(0.0),
        },
        official_leaves: dates(v.get("officialleaves")),
        week_offs,
        applied_leaves: dates(v.get("AppliedLeaves")),
        wfh_dates: dates(v.get("WfHDates")),
        hierarchy: strings(v.get("hierarchy")),
    }
}

/// `leave/leavelist/` → history items (`[0].leaveList` or a plain array).
pub fn parse_leave_history(v: &Value) -> Vec<LeaveHistoryItem> {
    let list = v
        .as_array()
        .and_then(|a| a.first())
        .and_then(|first| first.get("leaveList"))
        .unwrap_or(v);
    as_list(list)
        .into_iter()
        .map(|l| LeaveHistoryItem {
            id: text_or(l, &["_id", "id"], ""),
            category: text_or(l, &["category"], ""),
            req_type: text_or(l, &["reqType"], ""),
            start: date(l, &["fromDate", "startDate"]),
            end: date(l, &["toDate", "endDate"]),
            status: text_or(l, &["status"], ""),
            no_of_days: number(l, &["noOfDays"]).unwrap_or(0.0),
            message: text_or(l, &["message"], ""),
        })
        .collect()
}

/// `leave/officialleaves/` → holiday list.
pub fn parse_official_leaves(v: &Value) -> Vec<OfficialLeave> {
    v.as_array()
        .map(|a| {
            a.iter()
                .map(|o| OfficialLeave {
                    date: date(o, &["onDate", "date"]),
                    day: text_or(o, &["onDay", "day"], ""),
                    name: text_or(o, &["reason", "name"], ""),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `attendance/` → one record per employee for the requested month.
pub fn parse_attendance(v: &Value) -> Vec<AttendanceRecord> {
    v.as_array()
        .map(|a| {
            a.iter()
                .map(|emp| {
                    let month = emp
                        .get("month")
                        .and_then(Value::as_array)
                        .and_then(|m| m.first())
                        .cloned()
                        .unwrap_or(Value::Null);
                    let mut day_codes = HashMap::new();
                    if let Some(days) = month
                        .get("days")
                        .and_then(Value::as_array)
                        .and_then(|d| d.first())
                        .and_then(Value::as_object)
                    {
                        for (day, code) in days {
                            if let (Ok(day), Some(code)) = (day.parse::<u32>(), code.as_str()) {
                                day_codes.insert(day, code.to_string());
                            }
                        }
                    }
                    AttendanceRecord {
                        user_id: text_or(emp, &["userId"], ""),
                        first_name: text_or(emp, &["firstName"], ""),
                        middle_name: text_or(emp, &["middleName"], ""),
                        last_name: text_or(emp, &["lastName"], ""),
                        email: text(emp, &["email"]),
                        image: text(emp, &["userImage"]),
                        present_days: number(&month, &["presentDays"]),
                        total_working_days: number(&month, &["totalWorkingDays"]),
                        non_present_days: number(&month, &["nonPresentDays"]),
                        official_leave_days: number(&month, &["officalLeaveDays"]),
                        leave_balance: number(&month, &["leaveBalance"]),
                        day_codes,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `shift/` → shift definitions.
pub fn parse_shifts(v: &Value) -> Vec<Shift> {
    as_list(v)
        .into_iter()
        .map(|s| Shift {
            id: text_or(s, &["_id", "shift_id"], ""),
            name: text_or(s, &["shiftName"], ""),
            start_time: text_or(s, &["startTime"], ""),
            end_time: text_or(s, &["endTime"], ""),
            break_time: text_or(s, &["breakTime"], ""),
            lunch: match s.get("lunch") {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(t)) => t.eq_ignore_ascii_case("true"),
                _ => false,
            },
            lunch_window: text(s, &["lunchStartTime"]).zip(text(s, &["lunchEndTime"])),
        })
        .collect()
}

/// `shift/?team=` → shifts with the users assigned to them.
pub fn parse_shift_rosters(v: &Value) -> Vec<ShiftRoster> {
    as_list(v)
        .into_iter()
        .map(|s| {
            let shift = parse_shifts(s).into_iter().next().unwrap_or_default();
            ShiftRoster { shift, users: parse_directory_users(s.get("users").unwrap_or(&Value::Null)) }
        })
        .collect()
}
