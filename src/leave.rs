//! Leave, work-from-home and permission requests.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, Weekday};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result};
use crate::models::{DirectoryUser, SessionUser, TeamRef};
use crate::planner::Confirm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveCategory {
    Leave,
    Wfh,
    Permission,
}

impl LeaveCategory {
    pub fn value(&self) -> &'static str {
        match self {
            Self::Leave => "LEAVE",
            Self::Wfh => "WFH",
            Self::Permission => "PERMISSION",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Leave => "Leave",
            Self::Wfh => "Work From Home",
            Self::Permission => "Permission",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LEAVE" => Some(Self::Leave),
            "WFH" => Some(Self::Wfh),
            "PERMISSION" => Some(Self::Permission),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaveBalance {
    pub cl: f64,
    pub sl: f64,
    pub el: f64,
    pub upl: f64,
    pub permission: f64,
}

impl LeaveBalance {
    /// Balance reported with a request of the given type.
    pub fn for_request(&self, req_type: &str) -> f64 {
        match req_type {
            "CL" => self.cl,
            "SL" => self.sl,
            "EL" => self.el,
            "UPL" => self.upl,
            _ => self.cl + self.sl + self.el,
        }
    }

    /// `(label, value)` pairs for display.
    pub fn stats(&self) -> [(&'static str, f64); 5] {
        [("CL", self.cl), ("SL", self.sl), ("EL", self.el), ("UPL", self.upl), ("PER", self.permission)]
    }
}

/// Per-user leave context from `leave/leavedetails/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaveDetails {
    pub teams: Vec<TeamRef>,
    pub balance: LeaveBalance,
    pub official_leaves: Vec<NaiveDate>,
    /// Week-of-month (1-based) to the weekdays off in that week.
    pub week_offs: HashMap<u32, Vec<Weekday>>,
    pub applied_leaves: Vec<NaiveDate>,
    pub wfh_dates: Vec<NaiveDate>,
    /// Emails of the approver chain.
    pub hierarchy: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveHistoryItem {
    pub id: String,
    pub category: String,
    pub req_type: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: String,
    pub no_of_days: f64,
    pub message: String,
}

impl LeaveHistoryItem {
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => date >= s && date <= e,
            _ => false,
        }
    }

    pub fn status_kind(&self) -> LeaveStatus {
        LeaveStatus::classify(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfficialLeave {
    pub date: Option<NaiveDate>,
    pub day: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveStatus {
    Applied,
    Approved,
    Rejected,
    Cancelled,
    Pending,
}

impl LeaveStatus {
    /// Classifies free-text statuses such as "Approved by manager".
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("approve") {
            Self::Approved
        } else if lower.contains("reject") {
            Self::Rejected
        } else if lower.contains("cancel") {
            Self::Cancelled
        } else if lower.contains("pending") {
            Self::Pending
        } else {
            Self::Applied
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Applied => "Applied",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::Pending => "Pending",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestTypeOption {
    pub label: &'static str,
    pub value: &'static str,
}

/// Request types offered for a category. Paid leave types appear only with
/// a positive balance; with none left only unpaid leave is offered.
pub fn request_type_options(category: LeaveCategory, balance: &LeaveBalance) -> Vec<RequestTypeOption> {
    let opt = |label, value| RequestTypeOption { label, value };
    match category {
        LeaveCategory::Wfh => vec![opt("N/A", "NA")],
        LeaveCategory::Permission => vec![
            opt("0.5 Hour", "0.5"),
            opt("1 Hour", "1"),
            opt("1.5 Hours", "1.5"),
            opt("2 Hours", "2"),
        ],
        LeaveCategory::Leave => {
            let mut paid = Vec::new();
            if balance.cl > 0.0 {
                paid.push(opt("Casual Leave", "CL"));
            }
            if balance.sl > 0.0 {
                paid.push(opt("Sick Leave", "SL"));
            }
            if balance.el > 0.0 {
                paid.push(opt("Earned Leave", "EL"));
            }
            if paid.is_empty() {
                paid.push(opt("Unpaid Leave", "UPL"));
            }
            paid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HalfDay {
    #[default]
    FullDay,
    FirstHalf,
    SecondHalf,
}

impl HalfDay {
    /// Exactly one flag selects that half; both or neither mean a full day.
    pub fn from_flags(first_half: bool, second_half: bool) -> Self {
        match (first_half, second_half) {
            (true, false) => Self::FirstHalf,
            (false, true) => Self::SecondHalf,
            _ => Self::FullDay,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullDay => "fullday",
            Self::FirstHalf => "firsthalf",
            Self::SecondHalf => "secondhalf",
        }
    }
}

/// 1-based week of the month, counting weeks that start on Sunday.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    (date.day() + first.weekday().num_days_from_sunday()).div_ceil(7)
}

/// Working dates in `[from, to]`: week-offs and official leaves excluded.
/// Empty when the range is inverted.
pub fn requested_dates(from: NaiveDate, to: NaiveDate, details: &LeaveDetails) -> Vec<NaiveDate> {
    if from > to {
        return Vec::new();
    }
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| {
            let off = details
                .week_offs
                .get(&week_of_month(*d))
                .map_or(false, |days| days.contains(&d.weekday()));
            !off && !details.official_leaves.contains(d)
        })
        .collect()
}

pub fn no_of_days(count: usize, half: HalfDay) -> f64 {
    let days = count as f64;
    match half {
        HalfDay::FullDay => days,
        _ => days * 0.5,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerateCheck {
    pub conflict_dates: Vec<NaiveDate>,
    pub is_approved: bool,
}

impl RegenerateCheck {
    pub fn needs_regenerate(&self) -> bool {
        !self.conflict_dates.is_empty()
    }

    fn joined(&self) -> String {
        self.conflict_dates.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
    }

    pub fn approved_prompt(&self) -> String {
        format!(
            "Warning! You have already approved leave on these dates: {}. Do you want to regenerate the leave?",
            self.joined()
        )
    }

    pub fn warning(&self) -> String {
        format!(
            "Warning! You have applied Leave on these dates: {}. This will regenerate the leave.",
            self.joined()
        )
    }
}

/// Finds requested dates that were already applied for, and whether any of
/// them lies inside an approved request.
pub fn check_regenerate(dates: &[NaiveDate], details: &LeaveDetails, history: &[LeaveHistoryItem]) -> RegenerateCheck {
    let conflict_dates: Vec<NaiveDate> =
        dates.iter().copied().filter(|d| details.applied_leaves.contains(d)).collect();
    let is_approved = conflict_dates.iter().any(|d| {
        history
            .iter()
            .any(|h| h.status_kind() == LeaveStatus::Approved && h.covers(*d))
    });
    RegenerateCheck { conflict_dates, is_approved }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailRecipient {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
}

/// Directory users whose email is in the approver chain.
pub fn mail_list(users: &[DirectoryUser], hierarchy: &[String]) -> Vec<MailRecipient> {
    users
        .iter()
        .filter(|u| hierarchy.contains(&u.email))
        .map(|u| {
            let name = format!("{} {}", u.first_name, u.last_name).trim().to_string();
            MailRecipient {
                id: u.id.clone(),
                name: if name.is_empty() { u.email.clone() } else { name },
                email: u.email.clone(),
                department: u.teams.first().map(|t| t.name.clone()).unwrap_or_else(|| "General".to_string()),
            }
        })
        .collect()
}

/// Email-only recipients used when the directory cannot be read.
pub fn fallback_mail_list(hierarchy: &[String]) -> Vec<MailRecipient> {
    hierarchy
        .iter()
        .map(|email| MailRecipient {
            id: email.clone(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.clone(),
            department: "General".to_string(),
        })
        .collect()
}

/// The request form as entered.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveForm {
    pub category: LeaveCategory,
    pub req_type: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub first_half: bool,
    pub second_half: bool,
    /// Recipient ids from the mail list.
    pub mail_to: Vec<String>,
    pub description: String,
    pub lack_prior_notice: bool,
}

impl LeaveForm {
    pub fn half_day(&self) -> HalfDay {
        HalfDay::from_flags(self.first_half, self.second_half)
    }

    /// Form-level checks. The request type must be one the category offers.
    pub fn validate(&self, balance: &LeaveBalance) -> Result<()> {
        let options = request_type_options(self.category, balance);
        if !options.iter().any(|o| o.value == self.req_type) {
            let allowed: Vec<&str> = options.iter().map(|o| o.value).collect();
            return Err(Error::Validation(format!(
                "Request type '{}' is not available for {} (choose from {})",
                self.req_type,
                self.category.label(),
                allowed.join(", ")
            )));
        }
        if self.from > self.to {
            return Err(Error::Validation("From date must not be after to date".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation("A description is required".to_string()));
        }
        if self.mail_to.is_empty() {
            return Err(Error::Validation("At least one recipient is required".to_string()));
        }
        Ok(())
    }
}

/// The leave screen's loaded state.
#[derive(Debug, Clone, Default)]
pub struct LeaveContext {
    pub details: LeaveDetails,
    pub history: Vec<LeaveHistoryItem>,
    pub mail_list: Vec<MailRecipient>,
}

/// `[first of this month, last day of the month four months on]`.
pub fn details_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let end = start
        .checked_add_months(Months::new(5))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(start);
    (start, end)
}

pub async fn fetch_details(api: &ApiClient, user_id: &str, today: NaiveDate) -> Result<LeaveDetails> {
    let (start, end) = details_window(today);
    let raw: Value = api
        .get(
            "leave/leavedetails/",
            &[
                ("userId", Some(user_id.to_string())),
                ("start", Some(start.to_string())),
                ("end", Some(end.to_string())),
            ],
        )
        .await?;
    Ok(parse::parse_leave_details(&raw))
}

pub async fn fetch_history(api: &ApiClient, user_id: &str) -> Result<Vec<LeaveHistoryItem>> {
    let raw: Value = api
        .get("leave/leavelist/", &[("ui", Some(user_id.to_string())), ("pa", Some("1".to_string()))])
        .await?;
    Ok(parse::parse_leave_history(&raw))
}

pub async fn fetch_official_leaves(api: &ApiClient) -> Result<Vec<OfficialLeave>> {
    let raw: Value = api.get("leave/officialleaves/", &[]).await?;
    Ok(parse::parse_official_leaves(&raw))
}

/// Never fails: a directory error falls back to email-only recipients.
pub async fn fetch_mail_list(api: &ApiClient, hierarchy: &[String]) -> Vec<MailRecipient> {
    match api.get::<Value>("users/", &[]).await {
        Ok(raw) => mail_list(&parse::parse_directory_users(&raw), hierarchy),
        Err(e) => {
            warn!(error = %e, "Could not load users for mail list");
            fallback_mail_list(hierarchy)
        }
    }
}

impl LeaveContext {
    pub async fn load(api: &ApiClient, user_id: &str, today: NaiveDate) -> Result<Self> {
        let history = fetch_history(api, user_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not load leave history");
            Vec::new()
        });
        let details = fetch_details(api, user_id, today).await?;
        let mail_list = fetch_mail_list(api, &details.hierarchy).await;
        Ok(Self { details, history, mail_list })
    }

    /// Every recipient id, the default selection.
    pub fn default_recipients(&self) -> Vec<String> {
        self.mail_list.iter().map(|m| m.id.clone()).collect()
    }

    /// Validates the form and builds the `leave/` payload.
    ///
    /// A date clash with an approved request needs confirmation; declining
    /// returns `Ok(None)`. Other clashes are resubmitted as a regeneration.
    pub fn prepare<C: Confirm>(
        &self,
        user: &SessionUser,
        form: &LeaveForm,
        now: NaiveDateTime,
        confirm: &mut C,
    ) -> Result<Option<Value>> {
        form.validate(&self.details.balance)?;
        let dates = requested_dates(form.from, form.to, &self.details);
        if dates.is_empty() {
            return Err(Error::Validation("No working days in the selected range".to_string()));
        }
        let check = check_regenerate(&dates, &self.details, &self.history);
        if check.needs_regenerate() {
            if check.is_approved {
                if !confirm.confirm("Regenerate approved leave", &check.approved_prompt()) {
                    return Ok(None);
                }
            } else {
                warn!("{}", check.warning());
            }
        }
        Ok(Some(self.build_request(user, form, &dates, check.needs_regenerate(), now)))
    }

    pub fn build_request(
        &self,
        user: &SessionUser,
        form: &LeaveForm,
        dates: &[NaiveDate],
        regenerate: bool,
        now: NaiveDateTime,
    ) -> Value {
        let half = form.half_day();
        let days: Vec<Value> = dates
            .iter()
            .map(|d| json!({ "date": d.to_string(), "halfDay": half.as_str() }))
            .collect();
        let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let mail_to = self
            .mail_list
            .iter()
            .filter(|m| form.mail_to.contains(&m.id))
            .map(|m| m.email.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let team = self
            .details
            .teams
            .first()
            .or_else(|| user.first_team())
            .map(|t| t.name.clone())
            .unwrap_or_default();
        let hours = match form.category {
            LeaveCategory::Permission => form.req_type.parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        let regen = if regenerate { self.regen_object(dates) } else { json!("") };
        json!({
            "markAsLeave": false,
            "userId": user.id,
            "team": team,
            "leaveBalance": self.details.balance.for_request(&form.req_type),
            "permissionBalance": self.details.balance.permission,
            "hours": hours,
            "status": "Applied",
            "appliedDate": stamp,
            "createdDateTime": stamp,
            "modifiedDateTime": stamp,
            "active": "Pending",
            "statusChangedBy": null,
            "isNoIntimation": form.lack_prior_notice,
            "category": form.category.label(),
            "reqType": form.req_type,
            "startDate": form.from.to_string(),
            "endDate": form.to.to_string(),
            "noOfDays": no_of_days(dates.len(), half),
            "message": form.description,
            "userImage": user.image.clone().unwrap_or_else(|| "default.jpeg".to_string()),
            "regen": regen,
            "reqDetails": {
                "days": days,
                "time": { "startTime": "00:00", "endTime": "00:00" },
                "mailTo": mail_to,
                "task": {},
                "systemFlag": 0
            }
        })
    }

    fn regen_object(&self, dates: &[NaiveDate]) -> Value {
        let existing = self
            .history
            .iter()
            .find(|h| dates.iter().any(|d| h.covers(*d)))
            .map(|h| h.status.clone())
            .unwrap_or_else(|| "Applied".to_string());
        let days: Vec<Value> = dates
            .iter()
            .map(|d| json!({ "date": d.to_string(), "halfDay": "fullday" }))
            .collect();
        json!({
            "regenerate": "true",
            "existLeaveStatus": existing,
            "alreadyApplieddate": { "days": days },
            "alreadyWFHApplieddate": {}
        })
    }
}

pub async fn submit(api: &ApiClient, payload: &Value) -> Result<()> {
    let _: Value = api.post("leave/", payload).await?;
    info!("Leave request submitted");
    Ok(())
}
