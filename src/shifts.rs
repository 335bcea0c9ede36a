use serde_json::Value;

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::Result;
use crate::models::DirectoryUser;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shift {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub break_time: String,
    pub lunch: bool,
    /// `(start, end)` when both lunch times are set.
    pub lunch_window: Option<(String, String)>,
}

impl Shift {
    /// "09:00 - 18:00"
    pub fn hours(&self) -> String {
        format!("{} - {}", self.start_time, self.end_time)
    }

    pub fn lunch_label(&self) -> String {
        match (&self.lunch_window, self.lunch) {
            (Some((start, end)), true) => format!("{start} - {end}"),
            (_, true) => "Yes".to_string(),
            _ => "No".to_string(),
        }
    }
}

/// A shift with the team members working it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShiftRoster {
    pub shift: Shift,
    pub users: Vec<DirectoryUser>,
}

impl ShiftRoster {
    /// `(full name, first-team role)` for each member.
    pub fn members(&self) -> Vec<(String, String)> {
        self.users
            .iter()
            .map(|u| (u.full_name(), u.role().unwrap_or_default().to_string()))
            .collect()
    }
}

pub async fn list(api: &ApiClient) -> Result<Vec<Shift>> {
    let raw: Value = api.get("shift/", &[]).await?;
    Ok(parse::parse_shifts(&raw))
}

pub async fn rosters(api: &ApiClient, team: &str) -> Result<Vec<ShiftRoster>> {
    let raw: Value = api.get("shift/", &[("team", Some(team.to_string()))]).await?;
    Ok(parse::parse_shift_rosters(&raw))
}

/// Members of the shift with `shift_id`, empty when no roster matches.
pub fn users_for<'a>(rosters: &'a [ShiftRoster], shift_id: &str) -> &'a [DirectoryUser] {
    rosters
        .iter()
        .find(|r| r.shift.id == shift_id)
        .map(|r| r.users.as_slice())
        .unwrap_or(&[])
}
