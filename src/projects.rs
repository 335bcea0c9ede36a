//! Projects, clients and buckets.

use std::cmp::Reverse;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::api::client::ApiClient;
use crate::api::parse;
use crate::errors::{Error, Result};
use crate::models::{DirectoryUser, NamedRef, SessionUser};
use crate::week::parse_api_date;

/// A user's membership record inside a project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUser {
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_image: Option<String>,
    #[serde(default)]
    pub team: Value,
    #[serde(default)]
    pub assigned_date: Option<String>,
    #[serde(default)]
    pub released_date: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct Bucket {
    pub name: String,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectUsers {
    pub assigned: Vec<ProjectUser>,
    pub incharge: Vec<ProjectUser>,
    pub owner: Vec<ProjectUser>,
    pub removed: Vec<ProjectUser>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub creator_id: Option<String>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub clients: Vec<NamedRef>,
    pub buckets: Vec<Bucket>,
    pub users: ProjectUsers,
    pub time_entry: bool,
}

fn parse_stamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.naive_utc())
        .ok()
        .or_else(|| parse_api_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

impl Project {
    /// Last modification, or creation when never modified.
    pub fn last_activity(&self) -> Option<NaiveDateTime> {
        self.modified_date
            .as_deref()
            .or(self.created_date.as_deref())
            .and_then(parse_stamp)
    }

    pub fn client_names(&self) -> String {
        self.clients.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
    }

    fn matches(&self, term: &str) -> bool {
        self.name.to_lowercase().contains(term)
            || self.clients.iter().any(|c| c.name.to_lowercase().contains(term))
    }
}

/// Most recently touched first; undated projects last.
pub fn sort_projects(projects: &mut [Project]) {
    projects.sort_by_key(|p| Reverse(p.last_activity()));
}

/// Case-insensitive match on the project name or any client name.
/// A blank term keeps everything.
pub fn search<'a>(projects: &'a [Project], term: &str) -> Vec<&'a Project> {
    let term = term.trim().to_lowercase();
    projects.iter().filter(|p| term.is_empty() || p.matches(&term)).collect()
}

/// Membership records for `ids`, skipping ids missing from the directory.
pub fn build_user_refs(ids: &[String], directory: &[DirectoryUser], date: &str) -> Vec<ProjectUser> {
    ids.iter()
        .filter_map(|id| directory.iter().find(|u| &u.id == id))
        .map(|u| ProjectUser {
            user_id: u.id.clone(),
            first_name: u.first_name.clone(),
            middle_name: u.middle_name.clone(),
            last_name: u.last_name.clone(),
            email: u.email.clone(),
            user_image: u.user_image.clone(),
            team: serde_json::to_value(&u.teams).unwrap_or(Value::Null),
            assigned_date: Some(date.to_string()),
            released_date: None,
        })
        .collect()
}

/// Previously assigned users dropped from `new_ids`, stamped as released.
pub fn removed_users(prev_assigned: &[ProjectUser], new_ids: &[String], now: &str) -> Vec<ProjectUser> {
    prev_assigned
        .iter()
        .filter(|u| !new_ids.contains(&u.user_id))
        .map(|u| ProjectUser { released_date: Some(now.to_string()), ..u.clone() })
        .collect()
}

/// `toISOString`-style timestamp.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectForm {
    pub name: String,
    pub client_ids: Vec<String>,
    pub participants: Vec<String>,
    pub incharge: Vec<String>,
    pub owners: Vec<String>,
    pub time_entry: bool,
}

impl ProjectForm {
    /// Prefills the form from an existing project.
    pub fn from_project(p: &Project) -> Self {
        let ids = |list: &[ProjectUser]| list.iter().map(|u| u.user_id.clone()).collect();
        Self {
            name: p.name.clone(),
            client_ids: p.clients.iter().map(|c| c.id.clone()).collect(),
            participants: ids(&p.users.assigned),
            incharge: ids(&p.users.incharge),
            owners: ids(&p.users.owner),
            time_entry: p.time_entry,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Project name is required".to_string()));
        }
        if self.client_ids.is_empty() {
            return Err(Error::Validation("At least one client is required".to_string()));
        }
        if self.participants.is_empty() {
            return Err(Error::Validation("At least one participant is required".to_string()));
        }
        Ok(())
    }

    /// In-charge and owners must be participants; others are dropped.
    pub fn restrict_to_participants(&mut self) {
        let participants = self.participants.clone();
        self.incharge.retain(|id| participants.contains(id));
        self.owners.retain(|id| participants.contains(id));
    }

    fn client_refs(&self, clients: &[NamedRef]) -> Vec<Value> {
        self.client_ids
            .iter()
            .map(|id| {
                let name = clients.iter().find(|c| &c.id == id).map(|c| c.name.clone());
                json!({ "id": id, "name": name })
            })
            .collect()
    }

    pub fn create_payload(
        &self,
        creator: &SessionUser,
        clients: &[NamedRef],
        directory: &[DirectoryUser],
        now: &str,
    ) -> Value {
        json!({
            "name": self.name,
            "createdBy": creator.name,
            "creatorId": creator.id,
            "status": "active",
            "createdDate": now,
            "modifiedDate": null,
            "clients": self.client_refs(clients),
            "buckets": [],
            "users": {
                "assigned": build_user_refs(&self.participants, directory, now),
                "incharge": build_user_refs(&self.incharge, directory, now),
                "owner": build_user_refs(&self.owners, directory, now),
                "removed": [],
                "requested": []
            },
            "timeEntry": self.time_entry,
            "logo": "",
            "lastActivity": null,
            "workedHours": 0
        })
    }

    pub fn update_payload(
        &self,
        prev: &Project,
        clients: &[NamedRef],
        directory: &[DirectoryUser],
        now: &str,
    ) -> Value {
        json!({
            "name": self.name,
            "createdBy": prev.created_by,
            "creatorId": prev.creator_id,
            "modifiedDate": now,
            "clients": self.client_refs(clients),
            "buckets": prev.buckets,
            "users": {
                "assigned": build_user_refs(&self.participants, directory, now),
                "incharge": build_user_refs(&self.incharge, directory, now),
                "owner": build_user_refs(&self.owners, directory, now),
                "removed": removed_users(&prev.users.assigned, &self.participants, now)
            },
            "timeEntry": self.time_entry
        })
    }
}

/// Existing buckets plus the selected ones, labelled with the project name.
pub fn bucket_payload(project: &Project, all_buckets: &[NamedRef], selected: &[String]) -> Value {
    let mut buckets = project.buckets.clone();
    buckets.extend(
        all_buckets
            .iter()
            .filter(|b| selected.contains(&b.id))
            .map(|b| Bucket { name: b.name.clone(), project: project.name.clone() }),
    );
    json!({ "buckets": buckets })
}

pub async fn list_projects(api: &ApiClient) -> Result<Vec<Project>> {
    let raw: Value = api.get("projects", &[]).await?;
    let mut projects = parse::parse_projects(&raw);
    sort_projects(&mut projects);
    Ok(projects)
}

pub async fn list_clients(api: &ApiClient) -> Result<Vec<NamedRef>> {
    let raw: Value = api.get("clients", &[]).await?;
    Ok(parse::parse_named(&raw))
}

pub async fn list_buckets(api: &ApiClient) -> Result<Vec<NamedRef>> {
    let raw: Value = api.get("buckets", &[]).await?;
    Ok(parse::parse_named(&raw))
}

pub async fn list_users(api: &ApiClient) -> Result<Vec<DirectoryUser>> {
    let raw: Value = api.get("users", &[]).await?;
    Ok(parse::parse_directory_users(&raw))
}

pub async fn add_client(api: &ApiClient, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Client name is required".to_string()));
    }
    let _: Value = api.post("clients", &json!({ "name": name.trim() })).await?;
    info!(client = name, "Client added");
    Ok(())
}

/// Everything the project forms pick from.
#[derive(Debug, Clone, Default)]
pub struct ProjectCatalog {
    pub projects: Vec<Project>,
    pub clients: Vec<NamedRef>,
    pub buckets: Vec<NamedRef>,
    pub users: Vec<DirectoryUser>,
}

impl ProjectCatalog {
    pub async fn load(api: &ApiClient) -> Result<Self> {
        let (projects, clients, buckets, users) =
            tokio::try_join!(list_projects(api), list_clients(api), list_buckets(api), list_users(api))?;
        Ok(Self { projects, clients, buckets, users })
    }

    pub fn find(&self, id_or_name: &str) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id_or_name)
            .or_else(|| self.projects.iter().find(|p| p.name.eq_ignore_ascii_case(id_or_name)))
            .ok_or_else(|| Error::NotFound(format!("project '{}'", id_or_name)))
    }

    pub async fn create(&self, api: &ApiClient, creator: &SessionUser, mut form: ProjectForm) -> Result<()> {
        form.restrict_to_participants();
        form.validate()?;
        let payload = form.create_payload(creator, &self.clients, &self.users, &iso_now());
        let _: Value = api.post("projects", &payload).await?;
        info!(project = %form.name, "Project created");
        Ok(())
    }

    pub async fn update(&self, api: &ApiClient, project_id: &str, mut form: ProjectForm) -> Result<()> {
        let prev = self.find(project_id)?;
        form.restrict_to_participants();
        form.validate()?;
        let payload = form.update_payload(prev, &self.clients, &self.users, &iso_now());
        let _: Value = api.put(&format!("projects/{}", prev.id), &payload).await?;
        info!(project = %form.name, "Project updated");
        Ok(())
    }

    pub async fn attach_buckets(&self, api: &ApiClient, project_id: &str, bucket_ids: &[String]) -> Result<()> {
        if bucket_ids.is_empty() {
            return Err(Error::Validation("Select at least one bucket".to_string()));
        }
        let project = self.find(project_id)?;
        let payload = bucket_payload(project, &self.buckets, bucket_ids);
        let _: Value = api.put(&format!("projects/{}", project.id), &payload).await?;
        info!(project = %project.name, count = bucket_ids.len(), "Buckets attached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRef;

    fn user(id: &str, first: &str) -> DirectoryUser {
        DirectoryUser {
            id: id.into(),
            first_name: first.into(),
            last_name: "X".into(),
            email: format!("{id}@x.io"),
            teams: vec![TeamRef { name: "APPS".into(), role: "developer".into(), ..Default::default() }],
            ..Default::default()
        }
    }

    fn project(name: &str, created: Option<&str>, modified: Option<&str>) -> Project {
        Project {
            id: name.to_lowercase(),
            name: name.into(),
            created_date: created.map(str::to_string),
            modified_date: modified.map(str::to_string),
            clients: vec![NamedRef { id: "c1".into(), name: format!("{name} Client") }],
            time_entry: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_user_refs_skips_unknown() {
        let dir = vec![user("u1", "Asha"), user("u2", "Ben")];
        let refs = build_user_refs(&["u2".into(), "ghost".into()], &dir, "2024-06-10T00:00:00.000Z");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].user_id, "u2");
        assert_eq!(refs[0].assigned_date.as_deref(), Some("2024-06-10T00:00:00.000Z"));
        assert_eq!(refs[0].team[0]["name"], "APPS");
    }

    #[test]
    fn test_removed_users_are_stamped() {
        let prev = build_user_refs(&["u1".into(), "u2".into()], &[user("u1", "A"), user("u2", "B")], "then");
        let removed = removed_users(&prev, &["u2".into()], "now");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].user_id, "u1");
        assert_eq!(removed[0].released_date.as_deref(), Some("now"));
    }

    #[test]
    fn test_sort_by_latest_activity() {
        let mut list = vec![
            project("Old", Some("2024-01-01T00:00:00.000Z"), None),
            project("Touched", Some("2023-01-01T00:00:00.000Z"), Some("2024-06-01T10:00:00.000Z")),
            project("Undated", None, None),
            project("New", Some("2024-03-01"), None),
        ];
        sort_projects(&mut list);
        let names: Vec<_> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Touched", "New", "Old", "Undated"]);
    }

    #[test]
    fn test_search_by_project_or_client() {
        let list = vec![project("Apollo", None, None), project("Zephyr", None, None)];
        assert_eq!(search(&list, "apo").len(), 1);
        assert_eq!(search(&list, "ZEPHYR client")[0].name, "Zephyr");
        assert_eq!(search(&list, "  ").len(), 2);
        assert!(search(&list, "nothing").is_empty());
    }

    #[test]
    fn test_form_restricts_roles_to_participants() {
        let mut form = ProjectForm {
            name: "P".into(),
            client_ids: vec!["c1".into()],
            participants: vec!["u1".into()],
            incharge: vec!["u2".into()],
            owners: vec!["u1".into(), "u3".into()],
            time_entry: true,
        };
        form.restrict_to_participants();
        assert!(form.incharge.is_empty());
        assert_eq!(form.owners, vec!["u1".to_string()]);
        assert!(form.validate().is_ok());
        form.client_ids.clear();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_update_payload_keeps_creator_and_records_removals() {
        let dir = vec![user("u1", "A"), user("u2", "B")];
        let mut prev = project("Apollo", Some("2024-01-01"), None);
        prev.created_by = Some("Asha".into());
        prev.users.assigned = build_user_refs(&["u1".into(), "u2".into()], &dir, "then");
        let mut form = ProjectForm::from_project(&prev);
        form.participants = vec!["u2".into()];
        let clients = vec![NamedRef { id: "c1".into(), name: "Acme".into() }];
        let payload = form.update_payload(&prev, &clients, &dir, "now");
        assert_eq!(payload["createdBy"], "Asha");
        assert_eq!(payload["clients"][0]["name"], "Acme");
        assert_eq!(payload["users"]["removed"][0]["userId"], "u1");
        assert_eq!(payload["users"]["removed"][0]["releasedDate"], "now");
        assert_eq!(payload["modifiedDate"], "now");
    }

    #[test]
    fn test_bucket_payload_appends() {
        let mut p = project("Apollo", None, None);
        p.buckets = vec![Bucket { name: "Design".into(), project: "Apollo".into() }];
        let all = vec![NamedRef { id: "b1".into(), name: "QA".into() }, NamedRef { id: "b2".into(), name: "Ops".into() }];
        let payload = bucket_payload(&p, &all, &["b2".into()]);
        assert_eq!(payload["buckets"].as_array().unwrap().len(), 2);
        assert_eq!(payload["buckets"][1], json!({"name": "Ops", "project": "Apollo"}));
    }
}
