use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, DisplayItem, InputMode, Pane};

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Date
            Constraint::Min(0),    // Panes
            Constraint::Length(3), // Help / status
        ])
        .split(f.area());

    let title = format!(
        "Planner - {} ({})",
        app.board.date.format("%A, %B %-d, %Y"),
        app.board.user_name
    );
    let header = Paragraph::new(app.board.error.clone().unwrap_or_default())
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(header, chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(34), Constraint::Percentage(33), Constraint::Percentage(33)])
        .split(chunks[1]);

    for (i, pane) in Pane::ALL.into_iter().enumerate() {
        render_pane(f, app, pane, panes[i]);
    }

    let help_text = match app.input_mode {
        InputMode::Normal => app.status.clone().unwrap_or_else(|| {
            "q: Quit | j/k: Move | Tab: Pane | Enter/p: Plan | d: Remove | h: Hours | [ ]: Day | t: Today".to_string()
        }),
        InputMode::EditingHours => "Enter: Save | Esc: Cancel".to_string(),
        InputMode::Confirming => "y: Confirm | n/Esc: Cancel".to_string(),
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[2]);

    match app.input_mode {
        InputMode::EditingHours => {
            let area = centered_rect(40, 3, f.area());
            f.render_widget(Clear, area);
            let input = Paragraph::new(app.input_buffer.as_str())
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL).title("Planned Hours"));
            f.render_widget(input, area);
        }
        InputMode::Confirming => {
            let area = centered_rect(60, 4, f.area());
            f.render_widget(Clear, area);
            let message = app.pending.as_ref().map(|e| e.prompt()).unwrap_or_default();
            let modal = Paragraph::new(format!("{}\n(y/n)", message))
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL).title("Confirm Hours Update"));
            f.render_widget(modal, area);
        }
        InputMode::Normal => {}
    }
}

fn render_pane(f: &mut Frame, app: &mut App, pane: Pane, area: Rect) {
    let total = match pane {
        Pane::Allocated => app.board.allocated_hours(),
        Pane::Planned => app.board.planned_hours(),
        Pane::Actual => app.board.actual_hours(),
    };
    let rows: Vec<Row> = app
        .display_items(pane)
        .into_iter()
        .map(|item| match item {
            DisplayItem::ProjectHeader(g) => Row::new(vec![
                Cell::from(format!("{} · {}", g.name, g.task_count())),
                Cell::from(g.hours()),
            ])
            .style(Style::default().fg(hex_color(&g.color)).add_modifier(Modifier::BOLD)),
            DisplayItem::Task(t) => {
                let hours = Cell::from(t.hours.clone());
                let hours = if pane == Pane::Actual {
                    hours.style(Style::default().fg(hex_color(&t.project_color)))
                } else {
                    hours
                };
                Row::new(vec![Cell::from(format!("  {}", t.name)), hours])
            }
        })
        .collect();

    let border = if app.pane == pane {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let table = Table::new(rows, [Constraint::Min(10), Constraint::Length(10)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(format!("{} ({})", pane.title(), total)),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, app.state_mut(pane));
}

fn hex_color(hex: &str) -> Color {
    let h = hex.trim_start_matches('#');
    let channel = |i: usize| h.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok());
    match (h.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Reset,
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(margin), Constraint::Length(height), Constraint::Length(margin)])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
