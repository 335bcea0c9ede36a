use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;
use timesheet::api::client::ApiClient;
use timesheet::errors::{Error, SaveStage};
use timesheet::session::SessionStore;
use timesheet::timesheet::{CellInput, TimesheetView};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn mount_week(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tasks/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "t1", "title": "Build API",
                "project": { "id": "p1", "name": "Alpha" },
                "startDate": "2024-06-01T00:00:00.000Z", "endDate": "2024-06-30"
            },
            {
                "_id": "t2", "title": "Old work",
                "project": { "id": "p2", "name": "Beta" },
                "startDate": "2024-01-01", "endDate": "2024-01-31"
            }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/planner/calendardetail/"))
        .and(query_param("userId", "u1"))
        .and(query_param("start", "2024-06-10"))
        .and(query_param("end", "2024-06-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "taskId": "t1",
            "project": { "id": "p1", "name": "Alpha" },
            "time": [{ "workedDate": "2024-06-10", "workedhours": 150 }],
            "allocation": [{ "allocatedDate": "2024-06-11", "allocatedHrs": 4 }]
        }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_load_week_builds_grid_and_mirrors_entries() {
    let server = MockServer::start().await;
    mount_week(&server).await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut view = TimesheetView::new("u1", d("2024-06-12"));
    view.load(&api, &store).await.unwrap();

    assert_eq!(view.tasks.len(), 1);
    assert_eq!(view.projects.len(), 1);
    assert_eq!(view.projects[0].name, "Alpha");
    // 150 is read as minutes.
    assert_eq!(view.display_time("t1", d("2024-06-10")), "2h 30m");
    assert_eq!(view.display_time("t1", d("2024-06-11")), "4h");
    assert_eq!(view.week_total(), 6.5);
    assert_eq!(store.load_entries_mirror().len(), 2);
}

#[tokio::test]
async fn test_failed_load_sets_view_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/u1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut view = TimesheetView::new("u1", d("2024-06-12"));
    assert!(view.load(&api, &store).await.is_err());
    assert!(view.error.is_some());
    assert!(view.tasks.is_empty());
}

#[tokio::test]
async fn test_save_cell_writes_allocation_then_time_entry() {
    let server = MockServer::start().await;
    mount_week(&server).await;
    Mock::given(method("POST"))
        .and(path("/planner/create/scheduled/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "_id": "s9" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/timeEntry/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "e1" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let api = ApiClient::new(server.uri(), "k").unwrap();
    let mut view = TimesheetView::new("u1", d("2024-06-12"));
    view.load(&api, &store).await.unwrap();
    assert!(view.start_editing("t1", d("2024-06-12")));

    let input = CellInput { allocated_hours: 2, allocated_minutes: 0, actual_hours: 1, actual_minutes: 45 };
    view.save_cell(&api, &store, "t1", d("2024-06-12"), input).await.unwrap();

    assert_eq!(view.display_time("t1", d("2024-06-12")), "1h 45m");
    assert_eq!(view.entry("t1", d("2024-06-12")).unwrap().id.as_deref(), Some("e1"));
    assert!(view.editing.is_none());
    assert_eq!(store.load_entries_mirror().len(), 3);
}

#[tokio::test]
async fn test_failed_time_entry_reports_kept_allocation() {
    let server = MockServer::start().await;
    mount_week(&server).await;
    Mock::given(method("POST"))
        .and(path("/planner/create/scheduled/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "_id": "s9" }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/timeEntry/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let api = ApiClient::new(server.uri(), "k").unwrap();
    let mut view = TimesheetView::new("u1", d("2024-06-12"));
    view.load(&api, &store).await.unwrap();

    let input = CellInput { allocated_hours: 1, actual_hours: 1, ..Default::default() };
    let err = view.save_cell(&api, &store, "t1", d("2024-06-12"), input).await.unwrap_err();
    match err {
        Error::SaveFailed { stage, scheduled_id, .. } => {
            assert_eq!(stage, SaveStage::TimeEntry);
            assert_eq!(scheduled_id.as_deref(), Some("s9"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(view.display_time("t1", d("2024-06-12")), "");
}

#[tokio::test]
async fn test_future_date_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let api = ApiClient::new(server.uri(), "k").unwrap();
    let mut view = TimesheetView::new("u1", d("2024-06-12"));

    let input = CellInput { actual_hours: 1, ..Default::default() };
    let err = view.save_cell(&api, &store, "t1", d("2024-06-13"), input).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
