pub mod app;
pub mod ui;

use std::io;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::error;

use crate::api::client::ApiClient;
use crate::commands::Context;
use crate::errors::Result;
use crate::planner::PlannerBoard;
use app::{App, InputMode, Pane};
use ui::ui;

/// Opens the interactive planner board for the logged-in user.
pub fn run_tui(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let api = ctx.api()?;
    let mut board = PlannerBoard::new(user.id, user.name, ctx.today());
    // A failed first load leaves the error on the board header.
    let _ = ctx.block_on(board.load_day(&api));
    let mut app = App::new(board);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, ctx, &api);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "Planner UI stopped");
    }
    res
}

fn reload(app: &mut App, ctx: &Context, api: &ApiClient) {
    let result = ctx.block_on(app.board.load_day(api));
    app.status = result.err().map(|e| e.to_string());
    app.clamp_selection();
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, ctx: &Context, api: &ApiClient) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match app.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Tab => app.switch_pane(),
                KeyCode::Enter | KeyCode::Char('p') => {
                    if app.pane != Pane::Allocated {
                        app.status = Some("Select an allocated task to plan".to_string());
                    } else if let Some(task) = app.selected_task() {
                        let result = ctx.block_on(app.board.drop_task(api, &task));
                        app.report(result, format!("Planned '{}'", task.name));
                    }
                }
                KeyCode::Char('d') | KeyCode::Delete => {
                    if app.pane == Pane::Planned {
                        if let Some(task) = app.selected_task() {
                            let result = ctx.block_on(app.board.remove_planned(api, &task.id));
                            app.report(result, format!("Removed '{}'", task.name));
                        }
                    }
                }
                KeyCode::Char('h') => app.begin_hours_edit(),
                KeyCode::Char('[') => {
                    app.board.previous_day();
                    reload(app, ctx, api);
                }
                KeyCode::Char(']') => match app.board.next_day() {
                    Ok(()) => reload(app, ctx, api),
                    Err(e) => app.status = Some(e.to_string()),
                },
                KeyCode::Char('t') => {
                    app.board.go_to_today();
                    reload(app, ctx, api);
                }
                _ => {}
            },
            InputMode::EditingHours => match key.code {
                KeyCode::Enter => {
                    if let Some(edit) = app.submit_hours() {
                        let result = ctx.block_on(app.board.commit_hours(api, &edit));
                        app.report(result, "Planned hours updated");
                    }
                }
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => app.input_buffer.push(c),
                KeyCode::Backspace => {
                    app.input_buffer.pop();
                }
                _ => {}
            },
            InputMode::Confirming => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if let Some(edit) = app.answer_confirm(true) {
                        let result = ctx.block_on(app.board.commit_hours(api, &edit));
                        app.report(result, "Planned hours updated");
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.answer_confirm(false);
                }
                _ => {}
            },
        }
    }
}
