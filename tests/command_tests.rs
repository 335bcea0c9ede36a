use serde_json::json;
use tempfile::TempDir;
use timesheet::commands::*;
use timesheet::config::AppConfig;
use timesheet::errors::Error;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock API on its own runtime plus a command context pointed at it.
struct Harness {
    ctx: Context,
    server: MockServer,
    rt: Runtime,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            api_base_url: server.uri(),
            api_key: Some("test-key".into()),
            remote_url: None,
            remote_key: None,
            data_dir: dir.path().to_path_buf(),
        };
        let ctx = Context::new(config).unwrap();
        Harness { ctx, server, rt, _dir: dir }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn login(&self) {
        self.mount(
            Mock::given(method("GET")).and(path("/users")).respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{
                    "_id": "u1", "firstName": "Dev", "lastName": "One", "email": "dev@example.org",
                    "siteRole": "employee", "team": [{ "name": "QA", "role": "developer" }]
                }])),
            ),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path("/sitepermisssion/"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Planner": 7 }))),
        );
        cmd_login(&self.ctx, "dev@example.org").unwrap();
    }
}

#[test]
fn test_guarded_commands_need_login() {
    let h = Harness::new();
    assert!(matches!(cmd_whoami(&h.ctx), Err(Error::NotLoggedIn)));
    assert!(matches!(cmd_tasks(&h.ctx, GroupBy::Status, false), Err(Error::NotLoggedIn)));
    assert!(matches!(cmd_plan_show(&h.ctx, None), Err(Error::NotLoggedIn)));
}

#[test]
fn test_login_whoami_logout() {
    let h = Harness::new();
    h.login();
    assert!(h.ctx.store.is_authenticated());
    assert!(h.ctx.store.is_allowed("planner"));
    cmd_whoami(&h.ctx).unwrap();
    cmd_can(&h.ctx, "planner").unwrap();

    cmd_logout(&h.ctx).unwrap();
    assert!(!h.ctx.store.is_authenticated());
}

#[test]
fn test_offline_week_works_without_api() {
    let h = Harness::new();
    cmd_week(&h.ctx, 0, true).unwrap();
}

#[test]
fn test_log_rejects_bad_input_before_calling_api() {
    let h = Harness::new();
    h.login();
    let args = |date: &str, minutes: u32| LogArgs {
        task: "t1".into(),
        date: date.into(),
        hours: 1,
        minutes,
        allocated: None,
        allocated_minutes: None,
    };
    assert!(matches!(cmd_log(&h.ctx, args("12/06/2024", 0)), Err(Error::Validation(_))));
    assert!(matches!(cmd_log(&h.ctx, args("2024-06-12", 60)), Err(Error::Validation(_))));
    let mut too_long = args("2024-06-12", 0);
    too_long.hours = u32::MAX;
    assert!(matches!(cmd_log(&h.ctx, too_long), Err(Error::Validation(_))));
}

#[test]
fn test_board_needs_known_column_and_remote_config() {
    let h = Harness::new();
    let err = cmd_board_move(&h.ctx, "t1", "somewhere").unwrap_err();
    assert!(err.to_string().contains("IN_PROGRESS"));
    assert!(matches!(cmd_board_move(&h.ctx, "t1", "done"), Err(Error::Config(_))));
}

#[test]
fn test_board_project_and_timeline_read_hosted_rows() {
    let mut h = Harness::new();
    assert!(matches!(cmd_board_timeline(&h.ctx, 0), Err(Error::Config(_))));

    h.ctx.config.remote_url = Some(h.server.uri());
    h.ctx.config.remote_key = Some("anon".into());
    h.mount(
        Mock::given(method("GET"))
            .and(path("/rest/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "p1", "name": "Website" }]))),
    );
    h.mount(
        Mock::given(method("GET")).and(path("/rest/v1/tasks")).respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": "t1", "title": "Hero", "status": "TODO", "project_id": "p1" }])),
        ),
    );
    cmd_board_timeline(&h.ctx, -1).unwrap();
    cmd_board_project(&h.ctx, "p1", Some("todo")).unwrap();
    assert!(matches!(cmd_board_project(&h.ctx, "p9", None), Err(Error::NotFound(_))));
}

#[test]
fn test_plan_add_unknown_task_is_not_found() {
    let h = Harness::new();
    h.login();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/planned/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/planner/calendardetail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );
    assert!(matches!(cmd_plan_add(&h.ctx, "nope", None), Err(Error::NotFound(_))));
    assert!(matches!(cmd_plan_show(&h.ctx, Some("2999-01-01")), Err(Error::Validation(_))));
}

#[test]
fn test_missing_api_key_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        api_base_url: "http://localhost:1".into(),
        api_key: None,
        remote_url: None,
        remote_key: None,
        data_dir: dir.path().to_path_buf(),
    };
    let ctx = Context::new(config).unwrap();
    assert!(matches!(cmd_login(&ctx, "dev@example.org"), Err(Error::Config(_))));
}
