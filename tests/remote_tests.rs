use chrono::NaiveDate;
use serde_json::json;
use timesheet::errors::ApiErrorCategory;
use timesheet::models::Task;
use timesheet::remote::{RemoteClient, RemoteProject, TaskChanges};
use timesheet::tasks::{Board, TaskStatus};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn task_row(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id, "title": format!("Task {id}"), "status": status,
        "project_id": "p1", "due_date": "2024-06-20",
        "project": { "id": "p1", "name": "Website" }
    })
}

#[tokio::test]
async fn test_create_task_sends_single_row_and_stamps_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .and(header("apikey", "anon"))
        .and(header("Authorization", "Bearer session-token"))
        .and(header("Accept", "application/vnd.pgrst.object+json"))
        .and(body_partial_json(json!([{ "title": "Ship it", "status": "TODO", "project_id": "p1" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_row("n1", "TODO")))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap().with_access_token("session-token");
    let changes = TaskChanges {
        title: Some("Ship it".into()),
        status: Some("TODO".into()),
        project_id: Some("p1".into()),
        due_date: NaiveDate::from_ymd_opt(2024, 6, 20),
        ..Default::default()
    };
    let created = remote.create_task(&changes).await.unwrap();
    assert_eq!(created.id, "n1");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body[0]["updated_at"].is_string());
    assert!(body[0].get("description").is_none());

    let task = Task::from(created);
    assert_eq!(task.project_name, "Website");
    assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 6, 20));
}

#[tokio::test]
async fn test_update_and_delete_filter_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.t1"))
        .and(body_partial_json(json!({ "title": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_row("t1", "REVIEW")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let changes = TaskChanges { title: Some("Renamed".into()), ..Default::default() };
    let updated = remote.update_task("t1", &changes).await.unwrap();
    assert_eq!(updated.status, "REVIEW");
    remote.delete_task("t1").await.unwrap();
}

#[tokio::test]
async fn test_projects_and_create_project() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/projects"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "p1", "name": "Website", "color": "#ff0000" },
            { "id": "p2", "name": "Mobile" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/projects"))
        .and(body_partial_json(json!([{ "name": "Infra" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "p3", "name": "Infra" })))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let projects = remote.projects().await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].color.as_deref(), Some("#ff0000"));

    let project = RemoteProject { name: "Infra".into(), ..Default::default() };
    let created = remote.create_project(&project).await.unwrap();
    assert_eq!(created.id, "p3");

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(sent[0].get("id").is_none());
    assert!(sent[0].get("color").is_none());
}

#[tokio::test]
async fn test_sign_up_and_sign_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({ "email": "a@example.org" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ru1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let signed_up = remote.sign_up("a@example.org", "secret").await.unwrap();
    assert_eq!(signed_up["id"], "ru1");
    remote.clone().with_access_token("tok").sign_out().await.unwrap();
}

#[tokio::test]
async fn test_board_move_patches_status_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_row("t1", "TODO"), task_row("t2", "COMPLETED")])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("id", "eq.t1"))
        .and(body_partial_json(json!({ "status": "IN_PROGRESS" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let rows = remote.tasks().await.unwrap();
    let mut board = Board::from_tasks(rows.into_iter().map(Task::from).collect());

    assert!(board.move_to_column(&remote, "t1", TaskStatus::InProgress).await.unwrap());
    assert_eq!(board.column_of("t1"), Some(TaskStatus::InProgress));
    // Already there: no second request.
    assert!(!board.move_to_column(&remote, "t1", TaskStatus::InProgress).await.unwrap());
}

#[tokio::test]
async fn test_expired_token_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ru1", "email": "a@example.org" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let user = remote.clone().with_access_token("fresh").current_user().await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("a@example.org"));

    let err = remote.with_access_token("old").current_user().await.unwrap_err();
    assert_eq!(err.category(), ApiErrorCategory::Authentication);
}

#[tokio::test]
async fn test_project_detail_and_timeline_load_board_rows() {
    use timesheet::milestone::{ProjectDetail, Timeline};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "p1", "name": "Website" },
            { "id": "p2", "name": "Mobile" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            task_row("t1", "TODO"),
            task_row("t2", "In_Progress"),
            { "id": "t3", "title": "App", "status": "TODO", "project_id": "p2" }
        ])))
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let detail = ProjectDetail::load(&remote, "p1").await.unwrap();
    assert_eq!(detail.project.name, "Website");
    assert_eq!(detail.tasks.len(), 2);
    assert_eq!(detail.filtered(Some("IN_PROGRESS"))[0].id, "t2");

    let mut timeline = Timeline::new(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
    timeline.load(&remote).await.unwrap();
    assert_eq!(timeline.task_count("p1"), 2);
    assert_eq!(timeline.task_count("p2"), 1);
    assert!(timeline.error.is_none());
}

#[tokio::test]
async fn test_timeline_failure_leaves_it_empty() {
    use timesheet::milestone::Timeline;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let remote = RemoteClient::new(server.uri(), "anon").unwrap();
    let mut timeline = Timeline::new(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
    assert!(timeline.load(&remote).await.is_err());
    assert!(timeline.projects.is_empty());
    assert!(timeline.error.is_some());
}
