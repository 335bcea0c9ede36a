use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result};
use crate::models::{SessionUser, TimesheetEntry};

/// Permission values that grant access to a feature.
pub const ALLOWED_PERMISSION_VALUES: [i64; 7] = [3, 5, 7, 9, 11, 15, 17];

const USER_FILE: &str = "user.json";
const PERMISSIONS_FILE: &str = "permissions.json";
const ENTRIES_FILE: &str = "timesheet_entries.json";
const REMOTE_TOKEN_FILE: &str = "remote_token";

/// The logged-in user and their cached permission map.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub permissions: Option<Value>,
}

impl Session {
    pub fn require_user(&self) -> Result<&SessionUser> {
        self.user.as_ref().ok_or(Error::NotLoggedIn)
    }
}

/// File-backed session context handed to every command and view.
///
/// Each file mirrors one browser local-storage key.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Raw contents of a stored file, `None` when missing or unreadable.
    fn read_raw(&self, name: &str) -> Option<String> {
        let path = self.path(name);
        if !path.exists() {
            return None;
        }
        let mut f = OpenOptions::new().read(true).open(&path).ok()?;
        let mut s = String::new();
        f.read_to_string(&mut s).ok()?;
        Some(s)
    }

    fn write_raw(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path(name))?;
        f.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Loads whatever is stored. Unparseable files read as absent.
    pub fn load(&self) -> Session {
        let user = self
            .read_raw(USER_FILE)
            .and_then(|s| serde_json::from_str::<SessionUser>(&s).ok());
        let permissions = self
            .read_raw(PERMISSIONS_FILE)
            .and_then(|s| serde_json::from_str::<Value>(&s).ok());
        Session { user, permissions }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        match &session.user {
            Some(user) => self.write_raw(USER_FILE, &serde_json::to_string_pretty(user)?)?,
            None => self.remove(USER_FILE)?,
        }
        match &session.permissions {
            Some(p) => self.write_raw(PERMISSIONS_FILE, &serde_json::to_string_pretty(p)?)?,
            None => self.remove(PERMISSIONS_FILE)?,
        }
        debug!(dir = %self.dir.display(), "Session saved");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Deletes the user, permissions, entry mirror and board token.
    pub fn clear(&self) -> Result<()> {
        for name in [USER_FILE, PERMISSIONS_FILE, ENTRIES_FILE, REMOTE_TOKEN_FILE] {
            self.remove(name)?;
        }
        Ok(())
    }

    /// Navigation guard: a stored user record that parses.
    pub fn is_authenticated(&self) -> bool {
        self.read_raw(USER_FILE)
            .map(|s| serde_json::from_str::<SessionUser>(&s).is_ok())
            .unwrap_or(false)
    }

    /// Permission predicate over the stored permission map.
    pub fn is_allowed(&self, feature: &str) -> bool {
        match self.read_raw(PERMISSIONS_FILE) {
            Some(raw) => is_allowed_raw(&raw, feature),
            None => false,
        }
    }

    /// Best-effort copy of the last loaded timesheet entries.
    pub fn save_entries_mirror(&self, entries: &BTreeMap<String, TimesheetEntry>) {
        let written = serde_json::to_string(entries)
            .map_err(Error::from)
            .and_then(|s| self.write_raw(ENTRIES_FILE, &s));
        if let Err(e) = written {
            warn!(error = %e, "Could not mirror timesheet entries");
        }
    }

    pub fn load_entries_mirror(&self) -> BTreeMap<String, TimesheetEntry> {
        self.read_raw(ENTRIES_FILE)
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Access token for the hosted task board.
    pub fn save_remote_token(&self, token: &str) -> Result<()> {
        self.write_raw(REMOTE_TOKEN_FILE, token)
    }

    pub fn load_remote_token(&self) -> Option<String> {
        self.read_raw(REMOTE_TOKEN_FILE)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn clear_remote_token(&self) -> Result<()> {
        self.remove(REMOTE_TOKEN_FILE)
    }
}

/// Looks the user up by email, fetches the permission map for their roles
/// and stores both.
pub async fn login(api: &ApiClient, store: &SessionStore, email: &str) -> Result<SessionUser> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::Validation("An email address is required".to_string()));
    }
    let found: Value = api.get("users", &[("email", Some(email.to_string()))]).await?;
    let user = parse::parse_user_lookup(&found)
        .ok_or_else(|| Error::NotFound(format!("User '{}'", email)))?;
    let raw: Value = api
        .get(
            "sitepermisssion/",
            &[("siteRole", user.site_role.clone()), ("userRole", user.user_role.clone())],
        )
        .await?;
    let session = Session { user: Some(user.clone()), permissions: Some(parse::parse_permissions(&raw)) };
    store.save(&session)?;
    info!(user = %user.id, "Logged in");
    Ok(user)
}

/// Decides a feature from a serialized permission map.
///
/// Denies on an empty feature, malformed JSON, a missing key (compared
/// case-insensitively) or a value outside [`ALLOWED_PERMISSION_VALUES`].
/// Arrays use their first element.
pub fn is_allowed_raw(raw: &str, feature: &str) -> bool {
    if feature.is_empty() {
        return false;
    }
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return false,
    };
    is_allowed_value(&parsed, feature)
}

pub fn is_allowed_value(permissions: &Value, feature: &str) -> bool {
    if feature.is_empty() {
        return false;
    }
    let map = match crate::api::parse::first_object(permissions) {
        Some(m) => m,
        None => return false,
    };
    let wanted = feature.to_lowercase();
    let value = map.iter().find(|(k, _)| k.to_lowercase() == wanted).map(|(_, v)| v);
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.fract() == 0.0 => ALLOWED_PERMISSION_VALUES.contains(&(n as i64)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        assert!(is_allowed_raw(r#"{"Leave": 9}"#, "leave"));
        assert!(!is_allowed_raw(r#"{"Leave": 9}"#, "Shift"));
    }

    #[test]
    fn test_denies_outside_allow_list() {
        for v in [0, 1, 2, 4, 6, 8, 10, 12, 13, 14, 16, 18] {
            assert!(!is_allowed_raw(&format!(r#"{{"Leave": {}}}"#, v), "Leave"), "value {}", v);
        }
        for v in ALLOWED_PERMISSION_VALUES {
            assert!(is_allowed_raw(&format!(r#"{{"Leave": {}}}"#, v), "Leave"));
        }
    }

    #[test]
    fn test_fails_closed() {
        assert!(!is_allowed_raw("not json", "Leave"));
        assert!(!is_allowed_raw("null", "Leave"));
        assert!(!is_allowed_raw("[]", "Leave"));
        assert!(!is_allowed_raw(r#"{"Leave": 9}"#, ""));
        assert!(!is_allowed_raw(r#"{"Leave": 9.5}"#, "Leave"));
        assert!(!is_allowed_raw(r#"{"Leave": "abc"}"#, "Leave"));
    }

    #[test]
    fn test_numeric_strings_and_arrays() {
        assert!(is_allowed_raw(r#"{"Leave": "9"}"#, "LEAVE"));
        assert!(is_allowed_raw(r#"[{"Attendance": 17}]"#, "attendance"));
    }
}
