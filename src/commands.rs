use std::future::Future;
use std::io::{self, Write};

use chrono::{Local, NaiveDate};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use tokio::runtime::Runtime;

use crate::api::client::ApiClient;
use crate::attendance::{AttendanceQuery, AttendanceStatus, AttendanceView, Month};
use crate::config::AppConfig;
use crate::errors::{Error, Result};
use crate::leave::{self, LeaveCategory, LeaveContext, LeaveForm, LeaveStatus};
use crate::milestone::{date_range_label, ProjectDetail, Timeline};
use crate::models::{SessionUser, Task};
use crate::planner::{PlannerBoard, TaskGroup};
use crate::projects::{self, ProjectCatalog, ProjectForm};
use crate::remote::{RemoteClient, TaskChanges};
use crate::session::{self, SessionStore};
use crate::shifts;
use crate::tasks::{self, Board, DisplayStatus, MyWork, TaskStatus};
use crate::timesheet::{CellInput, TimesheetView};
use crate::week::{format_hours, format_worked_hours, DateWindow};
use crate::workload;

/// Everything a command needs: resolved config, the session store and a
/// runtime to drive the async clients.
pub struct Context {
    pub config: AppConfig,
    pub store: SessionStore,
    rt: Runtime,
}

impl Context {
    pub fn new(config: AppConfig) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        let store = SessionStore::new(config.data_dir.clone());
        Ok(Self { config, store, rt })
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.rt.block_on(fut)
    }

    pub fn api(&self) -> Result<ApiClient> {
        Ok(ApiClient::new(self.config.api_base_url.clone(), self.config.require_api_key()?)?)
    }

    /// The stored user. Fails with "not logged in" when the guard denies.
    pub fn user(&self) -> Result<SessionUser> {
        if !self.store.is_authenticated() {
            return Err(Error::NotLoggedIn);
        }
        self.store.load().require_user().cloned()
    }

    pub fn remote(&self) -> Result<RemoteClient> {
        let (url, key) = self.config.require_remote()?;
        let client = RemoteClient::new(url, key)?;
        Ok(match self.store.load_remote_token() {
            Some(token) => client.with_access_token(token),
            None => client,
        })
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("Invalid date '{}': {}. Use YYYY-MM-DD.", s, e)))
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// `#rrggbb` to a terminal color; anything else renders uncolored.
fn hex_color(hex: &str) -> Color {
    let h = hex.trim_start_matches('#');
    let channel = |i: usize| h.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok());
    match (h.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => Color::Rgb { r, g, b },
        _ => Color::Reset,
    }
}

/// Asks on stdin. Anything but `y` declines.
fn prompt_yes_no(title: &str, message: &str) -> bool {
    print!("{}: {} [y/N] ", title, message);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => input.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

fn confirmer(yes: bool) -> impl FnMut(&str, &str) -> bool {
    move |title: &str, message: &str| yes || prompt_yes_no(title, message)
}

// ---------------------------------------------------------------------------
// Session

pub fn cmd_login(ctx: &Context, email: &str) -> Result<()> {
    let api = ctx.api()?;
    let user = ctx.block_on(session::login(&api, &ctx.store, email))?;
    println!("Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub fn cmd_logout(ctx: &Context) -> Result<()> {
    ctx.store.clear()?;
    println!("Logged out.");
    Ok(())
}

pub fn cmd_whoami(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let mut table = new_table(&["Field", "Value"]);
    table.add_row(vec!["Name", user.name.as_str()]);
    table.add_row(vec!["Email", user.email.as_str()]);
    table.add_row(vec!["Id", user.id.as_str()]);
    table.add_row(vec!["Employee Id", user.emp_id.as_deref().unwrap_or("")]);
    table.add_row(vec!["Site Role", user.site_role.as_deref().unwrap_or("")]);
    table.add_row(vec!["Role", user.user_role.as_deref().unwrap_or("")]);
    let teams = user.teams.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
    table.add_row(vec!["Teams".to_string(), teams]);
    println!("{table}");
    Ok(())
}

pub fn cmd_can(ctx: &Context, feature: &str) -> Result<()> {
    if ctx.store.is_allowed(feature) {
        println!("{}: allowed", feature);
    } else {
        println!("{}: denied", feature);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Timesheet

pub fn cmd_week(ctx: &Context, offset: i64, offline: bool) -> Result<()> {
    if offline {
        let entries = ctx.store.load_entries_mirror();
        if entries.is_empty() {
            println!("No cached entries.");
            return Ok(());
        }
        let mut table = new_table(&["Task", "Date", "Time"]);
        for e in entries.values() {
            table.add_row(vec![e.task_id.clone(), e.date.to_string(), format_hours(e.total_hours())]);
        }
        println!("{table}");
        return Ok(());
    }

    let user = ctx.user()?;
    let api = ctx.api()?;
    let mut view = TimesheetView::new(user.id, ctx.today());
    view.window = view.window.shift_weeks(offset);
    ctx.block_on(view.load(&api, &ctx.store))?;

    let days = view.window.days();
    let mut headers = vec!["Task".to_string()];
    headers.extend(days.iter().map(|d| d.format("%a %-d").to_string()));
    headers.push("Total".to_string());
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    let mut table = new_table(&header_refs);

    for (project, tasks) in view.tasks_by_project() {
        table.add_row(vec![Cell::new(&project.name).add_attribute(Attribute::Bold).fg(Color::Cyan)]);
        for task in tasks {
            let mut row = vec![Cell::new(format!("  {}", task.title))];
            for d in &days {
                let cell = Cell::new(view.display_time(&task.id, *d));
                row.push(if view.is_editable(*d) { cell } else { cell.fg(Color::DarkGrey) });
            }
            row.push(Cell::new(format_hours(view.task_week_total(&task.id))));
            table.add_row(row);
        }
    }
    let mut totals = vec![Cell::new("Total").add_attribute(Attribute::Bold)];
    totals.extend(days.iter().map(|d| Cell::new(format_hours(view.day_total(*d)))));
    totals.push(Cell::new(format_hours(view.week_total())).add_attribute(Attribute::Bold));
    table.add_row(totals);

    let marker = if view.is_current_week() { " (this week)" } else { "" };
    println!("Week {}{}", view.window.range_label(), marker);
    println!("{table}");
    Ok(())
}

pub struct LogArgs {
    pub task: String,
    pub date: String,
    pub hours: u32,
    pub minutes: u32,
    pub allocated: Option<u32>,
    pub allocated_minutes: Option<u32>,
}

pub fn cmd_log(ctx: &Context, args: LogArgs) -> Result<()> {
    let date = parse_date(&args.date)?;
    if args.minutes >= 60 || args.allocated_minutes.is_some_and(|m| m >= 60) {
        return Err(Error::Validation("Minutes must be between 0 and 59".to_string()));
    }
    if args.hours > 24 || args.allocated.is_some_and(|h| h > 24) {
        return Err(Error::Validation("Hours must be between 0 and 24".to_string()));
    }
    let user = ctx.user()?;
    let api = ctx.api()?;
    let mut view = TimesheetView::new(user.id, ctx.today());
    view.window = DateWindow::week_of(date);
    ctx.block_on(view.load(&api, &ctx.store))?;
    if !view.start_editing(&args.task, date) {
        return Err(Error::Validation(format!("Cannot log time for a future date ({})", date)));
    }
    let input = CellInput {
        allocated_hours: args.allocated.unwrap_or(args.hours),
        allocated_minutes: args.allocated_minutes.unwrap_or(args.minutes),
        actual_hours: args.hours,
        actual_minutes: args.minutes,
    };
    ctx.block_on(view.save_cell(&api, &ctx.store, &args.task, date, input))?;
    println!("Logged {} on {} for task {}.", format_hours(input.actual()), date, args.task);
    Ok(())
}

// ---------------------------------------------------------------------------
// My work and board

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Status,
    Project,
}

fn add_task_rows(table: &mut Table, task: &Task) {
    let status = tasks::map_display_status(&task.status);
    let status_color = match status {
        DisplayStatus::Known(TaskStatus::Completed) => Color::Green,
        DisplayStatus::Known(TaskStatus::InProgress) => Color::Yellow,
        DisplayStatus::Known(TaskStatus::Review) => Color::Magenta,
        _ => Color::Reset,
    };
    table.add_row(vec![
        Cell::new(&task.id),
        Cell::new(&task.title),
        Cell::new(&task.project_name),
        Cell::new(status.to_string()).fg(status_color),
        Cell::new(task.due_date.map(|d| d.to_string()).unwrap_or_default()),
        Cell::new(format_hours(task.allocated_hours)),
    ]);
    for sub in &task.subtasks {
        table.add_row(vec![
            Cell::new(&sub.id).fg(Color::DarkGrey),
            Cell::new(format!("  └ {}", sub.title)),
            Cell::new(""),
            Cell::new(tasks::map_display_status(&sub.status).to_string()),
            Cell::new(""),
            Cell::new(format_hours(sub.allocated_hours)),
        ]);
    }
}

pub fn cmd_tasks(ctx: &Context, by: GroupBy, all: bool) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let work = ctx.block_on(MyWork::load(&api, &user.id))?;
    let shown = tasks::visible(&work.tasks, all);
    if shown.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    let headers = ["ID", "Title", "Project", "Status", "Due", "Allocated"];
    match by {
        GroupBy::Status => {
            for (status, group) in tasks::group_by_status(&shown) {
                println!("{} ({})", status, group.len());
                let mut table = new_table(&headers);
                for t in group {
                    add_task_rows(&mut table, t);
                }
                println!("{table}");
            }
        }
        GroupBy::Project => {
            for group in tasks::group_by_project(&shown, &work.projects) {
                if group.tasks.is_empty() {
                    continue;
                }
                println!("{} ({})", group.name, group.tasks.len());
                let mut table = new_table(&headers);
                for t in group.tasks {
                    add_task_rows(&mut table, t);
                }
                println!("{table}");
            }
        }
    }
    Ok(())
}

fn load_board(ctx: &Context, remote: &RemoteClient) -> Result<Board> {
    let remote_tasks = ctx.block_on(remote.tasks())?;
    Ok(Board::from_tasks(remote_tasks.into_iter().map(Task::from).collect()))
}

pub fn cmd_board_show(ctx: &Context) -> Result<()> {
    let remote = ctx.remote()?;
    let board = load_board(ctx, &remote)?;
    let headers: Vec<&str> = board.columns.iter().map(|c| c.status.title()).collect();
    let mut table = new_table(&headers);
    let depth = board.columns.iter().map(|c| c.tasks.len()).max().unwrap_or(0);
    for i in 0..depth {
        table.add_row(
            board
                .columns
                .iter()
                .map(|c| c.tasks.get(i).map(|t| format!("{} [{}]", t.title, t.id)).unwrap_or_default()),
        );
    }
    println!("{table}");
    Ok(())
}

/// Two-week timeline of board projects with their task counts.
pub fn cmd_board_timeline(ctx: &Context, offset: i64) -> Result<()> {
    let remote = ctx.remote()?;
    let mut timeline = Timeline::new(ctx.today());
    timeline.window = timeline.window.shift_weeks(offset);
    ctx.block_on(timeline.load(&remote))?;

    println!("{}", timeline.range_label());
    let days: Vec<String> = timeline
        .days()
        .iter()
        .map(|d| if d.is_today { format!("[{}]", d.label()) } else { d.label() })
        .collect();
    println!("{}", days.join("  "));

    let mut table = new_table(&["Project", "Tasks", "Due in window"]);
    for project in &timeline.projects {
        let due = timeline
            .project_tasks(&project.id)
            .iter()
            .filter(|t| t.due_date.is_some_and(|d| timeline.window.contains(d)))
            .count();
        let mut name = Cell::new(&project.name);
        if let Some(color) = project.color.as_deref() {
            name = name.fg(hex_color(color));
        }
        table.add_row(vec![name, Cell::new(timeline.task_count(&project.id)), Cell::new(due)]);
    }
    println!("{table}");
    Ok(())
}

/// One board project's tasks, optionally narrowed to a status.
pub fn cmd_board_project(ctx: &Context, project_id: &str, status: Option<&str>) -> Result<()> {
    let remote = ctx.remote()?;
    let detail = ctx.block_on(ProjectDetail::load(&remote, project_id))?;
    println!("{}", detail.project.name);
    if let Some(description) = detail.project.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{}", description);
    }
    let tasks = detail.filtered(status);
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let mut table = new_table(&["ID", "Title", "Status", "Priority", "Dates"]);
    for t in tasks {
        table.add_row(vec![
            t.id.clone(),
            t.title.clone(),
            tasks::map_display_status(&t.status).to_string(),
            t.priority.clone().unwrap_or_default(),
            date_range_label(t.start_date, t.due_date),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_board_move(ctx: &Context, task_id: &str, column: &str) -> Result<()> {
    let target = TaskStatus::parse(column).ok_or_else(|| {
        let names: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_api_str()).collect();
        Error::Validation(format!("Unknown column '{}'. Use one of: {}", column, names.join(", ")))
    })?;
    let remote = ctx.remote()?;
    let mut board = load_board(ctx, &remote)?;
    if ctx.block_on(board.move_to_column(&remote, task_id, target))? {
        println!("Moved task {} to {}.", task_id, target.title());
    } else {
        println!("Task {} is already in {}.", task_id, target.title());
    }
    Ok(())
}

pub fn cmd_board_add(
    ctx: &Context,
    title: &str,
    project: Option<&str>,
    due: Option<&str>,
    hours: Option<f64>,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("A task title is required".to_string()));
    }
    let remote = ctx.remote()?;
    let project_id = match project {
        Some(p) => {
            let projects = ctx.block_on(remote.projects())?;
            let found = projects
                .iter()
                .find(|r| r.id == p || r.name.eq_ignore_ascii_case(p))
                .ok_or_else(|| Error::NotFound(format!("Board project '{}'", p)))?;
            Some(found.id.clone())
        }
        None => None,
    };
    let changes = TaskChanges {
        title: Some(title.trim().to_string()),
        project_id,
        status: Some(TaskStatus::Todo.as_api_str().to_string()),
        due_date: due.map(parse_date).transpose()?,
        allocated_hours: hours,
        ..Default::default()
    };
    let created = ctx.block_on(remote.create_task(&changes))?;
    println!("Created task {} [{}].", created.title, created.id);
    Ok(())
}

pub fn cmd_board_delete(ctx: &Context, task_id: &str) -> Result<()> {
    let remote = ctx.remote()?;
    ctx.block_on(remote.delete_task(task_id))?;
    println!("Deleted task {}.", task_id);
    Ok(())
}

pub fn cmd_board_login(ctx: &Context, email: &str, password: &str) -> Result<()> {
    let (url, key) = ctx.config.require_remote()?;
    let remote = RemoteClient::new(url, key)?;
    let session = ctx.block_on(remote.sign_in(email, password))?;
    ctx.store.save_remote_token(&session.access_token)?;
    let who = session.user.and_then(|u| u.email).unwrap_or_else(|| email.to_string());
    println!("Signed in to the task board as {}.", who);
    Ok(())
}

pub fn cmd_board_logout(ctx: &Context) -> Result<()> {
    if ctx.store.load_remote_token().is_some() {
        let remote = ctx.remote()?;
        if let Err(e) = ctx.block_on(remote.sign_out()) {
            tracing::warn!(error = %e, "Remote sign-out failed");
        }
    }
    ctx.store.clear_remote_token()?;
    println!("Signed out of the task board.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Planner

fn load_planner(ctx: &Context, date: Option<&str>) -> Result<(ApiClient, PlannerBoard)> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let mut board = PlannerBoard::new(user.id, user.name, ctx.today());
    if let Some(d) = date {
        board.set_date(parse_date(d)?)?;
    }
    ctx.block_on(board.load_day(&api))?;
    Ok((api, board))
}

fn print_groups(title: &str, total: &str, groups: &[TaskGroup], color_cards: bool) {
    println!("{} ({})", title, total);
    if groups.is_empty() {
        println!("  No tasks.");
        return;
    }
    let mut table = new_table(&["Project", "Task ID", "Task", "Hours"]);
    for g in groups {
        table.add_row(vec![
            Cell::new(format!("{} · {}", g.name, g.task_count())).fg(hex_color(&g.color)).add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(""),
            Cell::new(g.hours()),
        ]);
        for t in &g.tasks {
            let hours = Cell::new(&t.hours);
            table.add_row(vec![
                Cell::new(""),
                Cell::new(&t.id),
                Cell::new(&t.name),
                if color_cards { hours.fg(hex_color(&t.project_color)) } else { hours },
            ]);
        }
    }
    println!("{table}");
}

pub fn cmd_plan_show(ctx: &Context, date: Option<&str>) -> Result<()> {
    let (_, board) = load_planner(ctx, date)?;
    println!("Planner for {}", board.date.format("%A, %B %-d, %Y"));
    print_groups("Allocated", &board.allocated_hours(), &board.allocated, false);
    print_groups("Planned", &board.planned_hours(), &board.planned, false);
    print_groups("Actual", &board.actual_hours(), &board.actual, true);
    Ok(())
}

pub fn cmd_plan_add(ctx: &Context, task_id: &str, date: Option<&str>) -> Result<()> {
    let (api, mut board) = load_planner(ctx, date)?;
    let task = board
        .find_allocated(task_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Allocated task {} on {}", task_id, board.date)))?;
    ctx.block_on(board.drop_task(&api, &task))?;
    println!("Planned '{}' ({}). Planned total: {}", task.name, task.hours, board.planned_hours());
    Ok(())
}

pub fn cmd_plan_remove(ctx: &Context, task_id: &str, date: Option<&str>) -> Result<()> {
    let (api, mut board) = load_planner(ctx, date)?;
    ctx.block_on(board.remove_planned(&api, task_id))?;
    println!("Removed task {} from the plan.", task_id);
    Ok(())
}

pub fn cmd_plan_hours(ctx: &Context, task_id: &str, hours: &str, date: Option<&str>, yes: bool) -> Result<()> {
    let (api, mut board) = load_planner(ctx, date)?;
    let mut confirm = confirmer(yes);
    if ctx.block_on(board.edit_hours(&api, task_id, hours, &mut confirm))? {
        println!("Updated planned hours. Planned total: {}", format_worked_hours(board.planned_total()));
    } else {
        println!("Aborted.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Leave

pub struct LeaveApplyArgs {
    pub category: String,
    pub req_type: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub first_half: bool,
    pub second_half: bool,
    pub mail_to: Vec<String>,
    pub message: String,
    pub no_notice: bool,
    pub yes: bool,
}

pub fn cmd_leave_apply(ctx: &Context, args: LeaveApplyArgs) -> Result<()> {
    let category = LeaveCategory::parse(&args.category).ok_or_else(|| {
        Error::Validation(format!("Unknown category '{}'. Use LEAVE, WFH or PERMISSION", args.category))
    })?;
    let from = parse_date(&args.from)?;
    let to = match &args.to {
        Some(t) => parse_date(t)?,
        None => from,
    };
    let user = ctx.user()?;
    let api = ctx.api()?;
    let leave_ctx = ctx.block_on(LeaveContext::load(&api, &user.id, ctx.today()))?;

    let req_type = match args.req_type {
        Some(t) => t,
        None => leave::request_type_options(category, &leave_ctx.details.balance)
            .first()
            .map(|o| o.value.to_string())
            .unwrap_or_default(),
    };
    let mail_to = if args.mail_to.is_empty() {
        leave_ctx.default_recipients()
    } else {
        args.mail_to
            .iter()
            .map(|m| {
                leave_ctx
                    .mail_list
                    .iter()
                    .find(|r| r.id == *m || r.email.eq_ignore_ascii_case(m))
                    .map(|r| r.id.clone())
                    .ok_or_else(|| Error::Validation(format!("'{}' is not in your approver list", m)))
            })
            .collect::<Result<Vec<_>>>()?
    };
    let form = LeaveForm {
        category,
        req_type,
        from,
        to,
        first_half: args.first_half,
        second_half: args.second_half,
        mail_to,
        description: args.message,
        lack_prior_notice: args.no_notice,
    };
    let mut confirm = confirmer(args.yes);
    match leave_ctx.prepare(&user, &form, Local::now().naive_local(), &mut confirm)? {
        Some(payload) => {
            ctx.block_on(leave::submit(&api, &payload))?;
            println!(
                "{} request submitted for {} day(s).",
                category.label(),
                payload["noOfDays"].as_f64().unwrap_or_default()
            );
        }
        None => println!("Aborted."),
    }
    Ok(())
}

fn status_color(status: LeaveStatus) -> Color {
    match status {
        LeaveStatus::Approved => Color::Green,
        LeaveStatus::Rejected | LeaveStatus::Cancelled => Color::Red,
        LeaveStatus::Pending | LeaveStatus::Applied => Color::Yellow,
    }
}

pub fn cmd_leave_history(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let history = ctx.block_on(leave::fetch_history(&api, &user.id))?;
    if history.is_empty() {
        println!("No leave requests found.");
        return Ok(());
    }
    let mut table = new_table(&["Category", "Type", "From", "To", "Days", "Status", "Message"]);
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    for item in history {
        let kind = item.status_kind();
        table.add_row(vec![
            Cell::new(&item.category),
            Cell::new(&item.req_type),
            Cell::new(date(item.start)),
            Cell::new(date(item.end)),
            Cell::new(item.no_of_days),
            Cell::new(&item.status).fg(status_color(kind)),
            Cell::new(&item.message),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_leave_balance(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let details = ctx.block_on(leave::fetch_details(&api, &user.id, ctx.today()))?;
    let mut table = new_table(&["Type", "Balance"]);
    for (label, value) in details.balance.stats() {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
    for category in [LeaveCategory::Leave, LeaveCategory::Wfh, LeaveCategory::Permission] {
        let options: Vec<String> = leave::request_type_options(category, &details.balance)
            .iter()
            .map(|o| format!("{} ({})", o.value, o.label))
            .collect();
        println!("{}: {}", category.label(), options.join(", "));
    }
    Ok(())
}

pub fn cmd_leave_holidays(ctx: &Context) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let holidays = ctx.block_on(leave::fetch_official_leaves(&api))?;
    if holidays.is_empty() {
        println!("No official leaves found.");
        return Ok(());
    }
    let mut table = new_table(&["Date", "Day", "Occasion"]);
    for h in holidays {
        table.add_row(vec![h.date.map(|d| d.to_string()).unwrap_or_default(), h.day, h.name]);
    }
    println!("{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendance

fn attendance_color(status: Option<AttendanceStatus>) -> Color {
    match status {
        Some(AttendanceStatus::Present) => Color::Green,
        Some(AttendanceStatus::Leave) => Color::Red,
        Some(AttendanceStatus::WeekOff) | Some(AttendanceStatus::Holiday) => Color::DarkGrey,
        Some(AttendanceStatus::HalfDay) | Some(AttendanceStatus::CompOff) => Color::Yellow,
        Some(AttendanceStatus::Wfh) => Color::Cyan,
        Some(_) => Color::Magenta,
        None => Color::Reset,
    }
}

pub fn cmd_attendance(ctx: &Context, month: Option<&str>, employee: Option<String>, team: Option<String>) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let month = match month {
        Some(m) => Month::parse(m)
            .ok_or_else(|| Error::Validation(format!("Invalid month '{}'. Use YYYY-MM.", m)))?,
        None => Month::containing(ctx.today()),
    };
    let mut query = AttendanceQuery::new(month);
    query.employee = employee;
    if let Some(t) = team {
        query.team = t;
    }
    let view = ctx.block_on(AttendanceView::load(&api, &user, &query))?;

    println!("Attendance for {}", view.month.label());
    if view.employees.is_empty() {
        println!("No attendance records found.");
    }
    for emp in &view.employees {
        let mut summary = new_table(&["Employee", "Present", "Working Days", "Leave", "Holidays", "Leave Balance"]);
        summary.add_row(vec![
            Cell::new(&emp.name),
            Cell::new(emp.present_days),
            Cell::new(emp.total_days),
            Cell::new(emp.leave_days),
            Cell::new(emp.official_holidays),
            Cell::new(emp.leave_balance),
        ]);
        println!("{summary}");

        let mut grid = new_table(&["Day", "Date", "Status"]);
        for (day, status) in &emp.days {
            grid.add_row(vec![
                Cell::new(day.day_name()),
                Cell::new(day.day_num),
                Cell::new(status.map(|s| s.to_string()).unwrap_or_default()).fg(attendance_color(*status)),
            ]);
        }
        println!("{grid}");
    }
    if !view.selectable.is_empty() {
        println!("Other employees (use --employee <id>):");
        for (id, name) in &view.selectable {
            println!("  {}  {}", id, name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects, clients, buckets

fn print_projects(list: &[&projects::Project]) {
    if list.is_empty() {
        println!("No projects found.");
        return;
    }
    let mut table = new_table(&["ID", "Name", "Clients", "Status", "Members", "Buckets", "Time Entry", "Updated"]);
    for p in list {
        let updated = p.last_activity().map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(p.client_names()),
            Cell::new(p.status.as_deref().unwrap_or("")),
            Cell::new(p.users.assigned.len()),
            Cell::new(p.buckets.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(", ")),
            Cell::new(if p.time_entry { "Yes" } else { "No" }),
            Cell::new(updated),
        ]);
    }
    println!("{table}");
}

pub fn cmd_projects_list(ctx: &Context) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let list = ctx.block_on(projects::list_projects(&api))?;
    print_projects(&list.iter().collect::<Vec<_>>());
    Ok(())
}

pub fn cmd_projects_search(ctx: &Context, term: &str) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let list = ctx.block_on(projects::list_projects(&api))?;
    print_projects(&projects::search(&list, term));
    Ok(())
}

#[derive(Debug, Default)]
pub struct ProjectArgs {
    pub name: Option<String>,
    pub clients: Vec<String>,
    pub participants: Vec<String>,
    pub incharge: Vec<String>,
    pub owners: Vec<String>,
    pub time_entry: Option<bool>,
}

fn resolve_clients(catalog: &ProjectCatalog, refs: &[String]) -> Result<Vec<String>> {
    refs.iter()
        .map(|r| {
            catalog
                .clients
                .iter()
                .find(|c| c.id == *r || c.name.eq_ignore_ascii_case(r))
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::NotFound(format!("Client '{}'", r)))
        })
        .collect()
}

fn resolve_users(catalog: &ProjectCatalog, refs: &[String]) -> Result<Vec<String>> {
    refs.iter()
        .map(|r| {
            catalog
                .users
                .iter()
                .find(|u| u.id == *r || u.email.eq_ignore_ascii_case(r))
                .map(|u| u.id.clone())
                .ok_or_else(|| Error::NotFound(format!("User '{}'", r)))
        })
        .collect()
}

pub fn cmd_projects_create(ctx: &Context, args: ProjectArgs) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let catalog = ctx.block_on(ProjectCatalog::load(&api))?;
    let form = ProjectForm {
        name: args.name.unwrap_or_default(),
        client_ids: resolve_clients(&catalog, &args.clients)?,
        participants: resolve_users(&catalog, &args.participants)?,
        incharge: resolve_users(&catalog, &args.incharge)?,
        owners: resolve_users(&catalog, &args.owners)?,
        time_entry: args.time_entry.unwrap_or(true),
    };
    let name = form.name.clone();
    ctx.block_on(catalog.create(&api, &user, form))?;
    println!("Project '{}' created.", name);
    Ok(())
}

pub fn cmd_projects_update(ctx: &Context, project: &str, args: ProjectArgs) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let catalog = ctx.block_on(ProjectCatalog::load(&api))?;
    let prev = catalog.find(project)?;
    let mut form = ProjectForm::from_project(prev);
    if let Some(name) = args.name {
        form.name = name;
    }
    if !args.clients.is_empty() {
        form.client_ids = resolve_clients(&catalog, &args.clients)?;
    }
    if !args.participants.is_empty() {
        form.participants = resolve_users(&catalog, &args.participants)?;
    }
    if !args.incharge.is_empty() {
        form.incharge = resolve_users(&catalog, &args.incharge)?;
    }
    if !args.owners.is_empty() {
        form.owners = resolve_users(&catalog, &args.owners)?;
    }
    if let Some(t) = args.time_entry {
        form.time_entry = t;
    }
    let id = prev.id.clone();
    ctx.block_on(catalog.update(&api, &id, form))?;
    println!("Project {} updated.", id);
    Ok(())
}

pub fn cmd_clients_list(ctx: &Context) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let clients = ctx.block_on(projects::list_clients(&api))?;
    let mut table = new_table(&["ID", "Name"]);
    for c in clients {
        table.add_row(vec![c.id, c.name]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_clients_add(ctx: &Context, name: &str) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    ctx.block_on(projects::add_client(&api, name))?;
    println!("Client '{}' added.", name.trim());
    Ok(())
}

pub fn cmd_buckets_list(ctx: &Context) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let buckets = ctx.block_on(projects::list_buckets(&api))?;
    let mut table = new_table(&["ID", "Name"]);
    for b in buckets {
        table.add_row(vec![b.id, b.name]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_buckets_attach(ctx: &Context, project: &str, buckets: &[String]) -> Result<()> {
    ctx.user()?;
    let api = ctx.api()?;
    let catalog = ctx.block_on(ProjectCatalog::load(&api))?;
    let ids = buckets
        .iter()
        .map(|r| {
            catalog
                .buckets
                .iter()
                .find(|b| b.id == *r || b.name.eq_ignore_ascii_case(r))
                .map(|b| b.id.clone())
                .ok_or_else(|| Error::NotFound(format!("Bucket '{}'", r)))
        })
        .collect::<Result<Vec<_>>>()?;
    ctx.block_on(catalog.attach_buckets(&api, project, &ids))?;
    println!("Attached {} bucket(s).", ids.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Shifts and workload

pub fn cmd_shifts(ctx: &Context, team: Option<String>) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let team = team.or_else(|| user.first_team().map(|t| t.name.clone()));
    let list = ctx.block_on(shifts::list(&api))?;
    let rosters = match &team {
        Some(t) => ctx.block_on(shifts::rosters(&api, t))?,
        None => Vec::new(),
    };
    if list.is_empty() {
        println!("No shifts found.");
        return Ok(());
    }
    let mut table = new_table(&["Shift", "Hours", "Break", "Lunch", "Members"]);
    for s in &list {
        let members = shifts::users_for(&rosters, &s.id)
            .iter()
            .map(|u| match u.role() {
                Some(role) if !role.is_empty() => format!("{} ({})", u.full_name(), role),
                _ => u.full_name(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![s.name.clone(), s.hours(), s.break_time.clone(), s.lunch_label(), members]);
    }
    if let Some(t) = team {
        println!("Shifts for {}", t);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_workload(ctx: &Context, offset: i64) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let today = ctx.today();
    let window = DateWindow::fortnight_of(today).shift_weeks(offset);
    let load = ctx.block_on(workload::load(&api, &user.id, window, today))?;

    let mut table = new_table(&["Day", "Date", "Allocated", "Worked"]);
    for day in &load.days {
        let label = Cell::new(day.date.format("%a").to_string());
        table.add_row(vec![
            if day.is_today { label.add_attribute(Attribute::Bold).fg(Color::Cyan) } else { label },
            Cell::new(day.date.format("%-d %b").to_string()),
            Cell::new(format_hours(day.allocated)),
            Cell::new(format_hours(day.worked)),
        ]);
    }
    println!("Workload {}", window.span_label());
    println!("{table}");
    let class = load.availability_class();
    let color = match class {
        workload::Availability::Low => Color::Red,
        workload::Availability::Medium => Color::Yellow,
        workload::Availability::High => Color::Green,
    };
    let mut summary = new_table(&["Allocated", "Available", "Availability"]);
    summary.add_row(vec![
        Cell::new(format_hours(load.total_allocated())),
        Cell::new(format_hours(load.available_hours())),
        Cell::new(format!("{:.1}% ({})", load.availability(), class.label())).fg(color),
    ]);
    println!("{summary}");
    Ok(())
}
