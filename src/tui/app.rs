use ratatui::widgets::TableState;

use crate::errors::Result;
use crate::planner::{parse_leading_hours, HoursEdit, PlannerBoard, PlannerTask, TaskGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Allocated,
    Planned,
    Actual,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Allocated, Pane::Planned, Pane::Actual];

    fn index(self) -> usize {
        match self {
            Pane::Allocated => 0,
            Pane::Planned => 1,
            Pane::Actual => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Pane::Allocated => "Allocated",
            Pane::Planned => "Planned",
            Pane::Actual => "Actual",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    EditingHours,
    Confirming,
}

/// One line of a pane: a project header or a card under it.
pub enum DisplayItem<'a> {
    ProjectHeader(&'a TaskGroup),
    Task(&'a PlannerTask),
}

pub struct App {
    pub board: PlannerBoard,
    pub pane: Pane,
    pub states: [TableState; 3],
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub pending: Option<HoursEdit>,
    pub status: Option<String>,
}

impl App {
    pub fn new(board: PlannerBoard) -> App {
        let mut app = App {
            board,
            pane: Pane::Allocated,
            states: Default::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            pending: None,
            status: None,
        };
        app.clamp_selection();
        app
    }

    pub fn groups(&self, pane: Pane) -> &[TaskGroup] {
        match pane {
            Pane::Allocated => &self.board.allocated,
            Pane::Planned => &self.board.planned,
            Pane::Actual => &self.board.actual,
        }
    }

    pub fn display_items(&self, pane: Pane) -> Vec<DisplayItem<'_>> {
        let mut items = Vec::new();
        for g in self.groups(pane) {
            items.push(DisplayItem::ProjectHeader(g));
            items.extend(g.tasks.iter().map(DisplayItem::Task));
        }
        items
    }

    pub fn state_mut(&mut self, pane: Pane) -> &mut TableState {
        &mut self.states[pane.index()]
    }

    /// Keeps each pane's selection inside its rows after a reload.
    pub fn clamp_selection(&mut self) {
        for pane in Pane::ALL {
            let len = self.display_items(pane).len();
            let state = self.state_mut(pane);
            match state.selected() {
                _ if len == 0 => state.select(None),
                Some(i) if i >= len => state.select(Some(len - 1)),
                None => state.select(Some(0)),
                _ => {}
            }
        }
    }

    pub fn next(&mut self) {
        let len = self.display_items(self.pane).len();
        if len == 0 {
            return;
        }
        let pane = self.pane;
        let state = self.state_mut(pane);
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.display_items(self.pane).len();
        if len == 0 {
            return;
        }
        let pane = self.pane;
        let state = self.state_mut(pane);
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn switch_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Allocated => Pane::Planned,
            Pane::Planned => Pane::Actual,
            Pane::Actual => Pane::Allocated,
        };
    }

    /// The card under the cursor, if the cursor is on a card.
    pub fn selected_task(&self) -> Option<PlannerTask> {
        let i = self.states[self.pane.index()].selected()?;
        match self.display_items(self.pane).into_iter().nth(i)? {
            DisplayItem::Task(t) => Some(t.clone()),
            DisplayItem::ProjectHeader(_) => None,
        }
    }

    /// Stores the outcome of an action for the status line.
    pub fn report(&mut self, result: Result<()>, success: impl Into<String>) {
        self.status = Some(match result {
            Ok(()) => success.into(),
            Err(e) => e.to_string(),
        });
        self.clamp_selection();
    }

    pub fn begin_hours_edit(&mut self) {
        if self.pane != Pane::Planned {
            self.status = Some("Select a planned task to edit its hours".to_string());
            return;
        }
        if let Some(task) = self.selected_task() {
            self.input_buffer = format!("{}", parse_leading_hours(&task.hours));
            self.input_mode = InputMode::EditingHours;
        }
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.pending = None;
    }

    /// Validates the typed hours. Returns the edit to commit, or `None` when
    /// it was rejected or now waits on the confirmation modal.
    pub fn submit_hours(&mut self) -> Option<HoursEdit> {
        let task = self.selected_task()?;
        let checked = self.board.check_hours_edit(&task.id, &self.input_buffer);
        self.input_buffer.clear();
        match checked {
            Err(e) => {
                self.status = Some(e.to_string());
                self.input_mode = InputMode::Normal;
                None
            }
            Ok(edit) if edit.needs_confirmation() => {
                self.pending = Some(edit);
                self.input_mode = InputMode::Confirming;
                None
            }
            Ok(edit) => {
                self.input_mode = InputMode::Normal;
                Some(edit)
            }
        }
    }

    pub fn answer_confirm(&mut self, yes: bool) -> Option<HoursEdit> {
        self.input_mode = InputMode::Normal;
        let edit = self.pending.take();
        if !yes {
            self.status = Some("Hours update cancelled".to_string());
            return None;
        }
        edit
    }
}
