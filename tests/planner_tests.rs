use chrono::NaiveDate;
use serde_json::{json, Value};
use timesheet::api::client::ApiClient;
use timesheet::errors::Error;
use timesheet::planner::{PlannerBoard, COLOR_NOT_PLANNED, COLOR_ON_PLAN, COLOR_OVER_PLAN};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

fn calendar() -> Value {
    json!([
        {
            "taskId": "a1", "title": "Design",
            "project": { "id": "p1", "name": "Alpha" },
            "allocation": [{ "allocatedDate": "2024-06-12", "allocatedHrs": 2 }],
            "time": [{ "workedDate": "2024-06-12", "workedhours": 2 }]
        },
        {
            "taskId": "a2", "title": "Migration",
            "allocation": [
                { "allocatedDate": "2024-06-12", "allocatedHrs": 15 },
                { "allocatedDate": "2024-06-13", "allocatedHrs": 3 }
            ]
        }
    ])
}

async fn mount_calendar(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/planner/calendardetail"))
        .and(query_param("start", "2024-06-12"))
        .and(query_param("end", "2024-06-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(calendar()))
        .mount(server)
        .await;
}

fn planned_item(task: &str, hours: &str, planned_id: &str) -> Value {
    json!({
        "_id": planned_id, "taskId": task, "title": format!("Task {task}"),
        "plannedHours": hours, "projectName": "Alpha", "projectColor": "#123456",
        "assignedBy": "Dev", "assignedById": "u1", "assignedTo": "Dev"
    })
}

#[tokio::test]
async fn test_load_day_splits_lists() {
    let server = MockServer::start().await;
    mount_calendar(&server).await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .and(query_param("userId", "u1"))
        .and(query_param("date", "2024-06-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut board = PlannerBoard::new("u1", "Dev", today());
    board.load_day(&api).await.unwrap();

    assert_eq!(board.allocated.len(), 2);
    assert_eq!(board.allocated[0].name, "Alpha");
    assert_eq!(board.allocated[1].name, "General");
    assert_eq!(board.allocated[1].tasks[0].hours, "15 hrs");
    assert!(board.planned.is_empty());
    assert_eq!(board.actual[0].tasks[0].project_color, COLOR_NOT_PLANNED);
    assert!(board.error.is_none());
}

#[tokio::test]
async fn test_drop_posts_full_list_and_reloads() {
    let server = MockServer::start().await;
    mount_calendar(&server).await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([planned_item("a1", "2 hrs", "pl1")])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/planned/"))
        .and(body_partial_json(json!({ "userId": "u1", "date": "2024-06-12" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut board = PlannerBoard::new("u1", "Dev", today());
    board.load_day(&api).await.unwrap();

    let design = board.find_allocated("a1").cloned().unwrap();
    board.drop_task(&api, &design).await.unwrap();
    assert_eq!(board.planned_total(), 2.0);
    assert_eq!(board.actual[0].tasks[0].project_color, COLOR_ON_PLAN);

    // 2 planned + 15 would pass the 16 hour ceiling; nothing is posted.
    let migration = board.find_allocated("a2").cloned().unwrap();
    let err = board.drop_task(&api, &migration).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(board.planned_total(), 2.0);
}

#[tokio::test]
async fn test_hours_edit_in_band_needs_confirmation() {
    let server = MockServer::start().await;
    mount_calendar(&server).await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            planned_item("a1", "2 hrs", "pl1"),
            planned_item("b1", "5hrs", "pl2")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/planned/pl1"))
        .and(body_partial_json(json!({ "taskId": "a1", "plannedHours": "4hrs" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut board = PlannerBoard::new("u1", "Dev", today());
    board.load_day(&api).await.unwrap();

    let mut asked = Vec::new();
    let mut decline = |title: &str, message: &str| {
        asked.push(format!("{title}: {message}"));
        false
    };
    assert!(!board.edit_hours(&api, "a1", "4", &mut decline).await.unwrap());
    assert_eq!(asked.len(), 1);
    assert!(asked[0].contains("9.0 hrs"));
    assert_eq!(board.find_planned("a1").unwrap().hours, "2 hrs");

    let mut accept = |_: &str, _: &str| true;
    assert!(board.edit_hours(&api, "a1", "4", &mut accept).await.unwrap());
    assert_eq!(board.find_planned("a1").unwrap().hours, "4hrs");
    assert_eq!(board.planned_total(), 9.0);
    // Actual is 2 hrs against 4 planned.
    assert_ne!(board.actual[0].tasks[0].project_color, COLOR_OVER_PLAN);
}

#[tokio::test]
async fn test_remove_planned_posts_remaining_items() {
    let server = MockServer::start().await;
    mount_calendar(&server).await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            planned_item("a1", "2 hrs", "pl1"),
            planned_item("b1", "5hrs", "pl2")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut board = PlannerBoard::new("u1", "Dev", today());
    board.load_day(&api).await.unwrap();
    board.remove_planned(&api, "b1").await.unwrap();

    assert!(board.find_planned("b1").is_none());
    assert_eq!(board.planned_total(), 2.0);
    let missing = board.remove_planned(&api, "zz").await.unwrap_err();
    assert!(matches!(missing, Error::NotFound(_)));
}

#[tokio::test]
async fn test_failed_day_load_clears_lists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/planned/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let api = ApiClient::new(server.uri(), "k").unwrap();

    let mut board = PlannerBoard::new("u1", "Dev", today());
    assert!(board.load_day(&api).await.is_err());
    assert!(board.error.is_some());
    assert!(board.allocated.is_empty());
}
