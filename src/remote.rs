//! Client for the hosted backend-as-a-service: PostgREST-style table access
//! under `/rest/v1` and password auth under `/auth/v1`.

use chrono::{NaiveDate, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::api::client::ApiClient;
use crate::errors::ApiError;
use crate::models::Task;

const TASK_SELECT: &str = "*,project:projects(*)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RemoteTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub allocated_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub project: Option<RemoteProject>,
}

impl From<RemoteTask> for Task {
    fn from(t: RemoteTask) -> Self {
        let project_name = t.project.as_ref().map(|p| p.name.clone()).unwrap_or_default();
        Task {
            id: t.id,
            title: t.title,
            project_id: t.project_id.unwrap_or_default(),
            project_name,
            status: t.status,
            priority: t.priority,
            assignee: t.assignee,
            start_date: t.start_date,
            due_date: t.due_date,
            allocated_hours: t.allocated_hours.unwrap_or(0.0),
            tags: t.tags,
            subtasks: Vec::new(),
        }
    }
}

/// Fields for creating or updating a task. Unset fields are not sent.
#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_hours: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<RemoteUser>,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl RemoteClient {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: None,
        })
    }

    /// Uses `token` as the bearer for subsequent calls.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, format!("{}/{}", self.url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, path: &str) -> Result<T, ApiError> {
        let response = builder.send().await?;
        ApiClient::decode(response, path).await
    }

    /// Single-row requests ask PostgREST for an object instead of an array.
    fn single(builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Prefer", "return=representation")
            .header(reqwest::header::ACCEPT, "application/vnd.pgrst.object+json")
    }

    #[instrument(skip(self))]
    pub async fn projects(&self) -> Result<Vec<RemoteProject>, ApiError> {
        let path = "rest/v1/projects";
        let req = self
            .request(Method::GET, path)
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        let rows: Option<Vec<RemoteProject>> = self.send(req, path).await?;
        Ok(rows.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn tasks(&self) -> Result<Vec<RemoteTask>, ApiError> {
        let path = "rest/v1/tasks";
        let req = self
            .request(Method::GET, path)
            .query(&[("select", TASK_SELECT), ("order", "created_at.desc")]);
        let rows: Option<Vec<RemoteTask>> = self.send(req, path).await?;
        debug!(count = rows.as_ref().map_or(0, Vec::len), "Fetched remote tasks");
        Ok(rows.unwrap_or_default())
    }

    #[instrument(skip(self, task))]
    pub async fn create_task(&self, task: &TaskChanges) -> Result<RemoteTask, ApiError> {
        let path = "rest/v1/tasks";
        let mut body = serde_json::to_value(task)
            .map_err(|e| ApiError::Client(format!("Failed to encode task: {}", e)))?;
        stamp_updated_at(&mut body);
        let req = Self::single(self.request(Method::POST, path))
            .query(&[("select", TASK_SELECT)])
            .json(&[body]);
        let created = self.send(req, path).await?;
        info!("Created remote task");
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_task(&self, id: &str, changes: &TaskChanges) -> Result<RemoteTask, ApiError> {
        let path = "rest/v1/tasks";
        let mut body = serde_json::to_value(changes)
            .map_err(|e| ApiError::Client(format!("Failed to encode task: {}", e)))?;
        stamp_updated_at(&mut body);
        let eq = format!("eq.{}", id);
        let req = Self::single(self.request(Method::PATCH, path))
            .query(&[("id", eq.as_str()), ("select", TASK_SELECT)])
            .json(&body);
        self.send(req, path).await
    }

    #[instrument(skip(self))]
    pub async fn update_task_status(&self, id: &str, status: &str) -> Result<(), ApiError> {
        let path = "rest/v1/tasks";
        let eq = format!("eq.{}", id);
        let req = self
            .request(Method::PATCH, path)
            .query(&[("id", eq.as_str())])
            .json(&json!({ "status": status, "updated_at": Utc::now().to_rfc3339() }));
        let _: Value = self.send(req, path).await?;
        info!(task = id, status, "Updated remote task status");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        let path = "rest/v1/tasks";
        let eq = format!("eq.{}", id);
        let req = self.request(Method::DELETE, path).query(&[("id", eq.as_str())]);
        let _: Value = self.send(req, path).await?;
        Ok(())
    }

    #[instrument(skip(self, project))]
    pub async fn create_project(&self, project: &RemoteProject) -> Result<RemoteProject, ApiError> {
        let path = "rest/v1/projects";
        let mut body = serde_json::to_value(project)
            .map_err(|e| ApiError::Client(format!("Failed to encode project: {}", e)))?;
        // Let the table assign ids and timestamps.
        if let Some(map) = body.as_object_mut() {
            map.retain(|k, v| !v.is_null() && !(k == "id" && v.as_str() == Some("")));
        }
        let req = Self::single(self.request(Method::POST, path)).json(&[body]);
        self.send(req, path).await
    }

    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let path = "auth/v1/signup";
        let req = self
            .request(Method::POST, path)
            .json(&json!({ "email": email, "password": password }));
        self.send(req, path).await
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteSession, ApiError> {
        let path = "auth/v1/token";
        let req = self
            .request(Method::POST, path)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let session: RemoteSession = self.send(req, path).await?;
        info!("Signed in to remote backend");
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let path = "auth/v1/logout";
        let _: Value = self.send(self.request(Method::POST, path), path).await?;
        Ok(())
    }

    /// The user behind the current bearer token, `None` when anonymous.
    pub async fn current_user(&self) -> Result<Option<RemoteUser>, ApiError> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        let path = "auth/v1/user";
        self.send(self.request(Method::GET, path), path).await
    }
}

fn stamp_updated_at(body: &mut Value) {
    if let Some(map) = body.as_object_mut() {
        map.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
    }
}
