//! Shell state and key handling

use anyhow::Result;
use chrono::NaiveDateTime;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::event::{Event, EventHandler};
use super::ui::Terminal;
use super::view;
use crate::cli::dispatch::{delete_prompt, Command, Dispatcher, Reply};
use crate::cli::output::Sink;
use crate::domain::Task;
use crate::tracker::{Clock, DeleteToken};

const WELCOME: &str = "Welcome to tasktimer! Type 'help' for a list of commands.";

/// Commands whose argument is a task name and can be completed with Tab
const NAME_COMMANDS: [&str; 4] = ["start", "stop", "toggle", "delete"];

/// Lines kept in the output pane
const PANE_LIMIT: usize = 2000;

/// Which part of the window receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Tasks,
}

/// Output pane
#[derive(Debug, Default)]
pub struct Pane {
    lines: Vec<String>,
    collapsed: bool,
}

impl Pane {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    fn toggle(&mut self) {
        self.collapsed = !self.collapsed;
    }
}

/// A collapsed pane opens again for errors and cancellations
impl Sink for Pane {
    fn line(&mut self, text: &str) {
        if self.collapsed && needs_attention(text) {
            self.collapsed = false;
        }

        self.lines.push(text.to_string());
        if self.lines.len() > PANE_LIMIT {
            let excess = self.lines.len() - PANE_LIMIT;
            self.lines.drain(..excess);
        }
    }
}

fn needs_attention(text: &str) -> bool {
    text == "Delete cancelled."
        || ["Error:", "Unknown ", "Syntax:"]
            .iter()
            .any(|prefix| text.starts_with(prefix))
}

/// Shell state
pub struct App {
    dispatcher: Dispatcher,

    pane: Pane,

    /// Current input line
    input: String,

    /// Submitted commands, oldest first
    history: Vec<String>,
    history_limit: usize,

    /// Position while walking the history with Up/Down
    history_pos: Option<usize>,

    /// Deletion waiting for a y/n answer
    pending_delete: Option<DeleteToken>,

    focus: Focus,

    /// Tasks shown in the task panel
    tasks: Vec<Task>,
    task_index: usize,
    refresh_failed: bool,

    should_quit: bool,
}

impl App {
    pub fn new(dispatcher: Dispatcher, history_limit: usize) -> Self {
        let mut app = Self {
            dispatcher,
            pane: Pane::default(),
            input: String::new(),
            history: Vec::new(),
            history_limit,
            history_pos: None,
            pending_delete: None,
            focus: Focus::Input,
            tasks: Vec::new(),
            task_index: 0,
            refresh_failed: false,
            should_quit: false,
        };

        app.pane.line(WELCOME);
        app.refresh_tasks();
        app
    }

    /// Runs the main loop until the user leaves
    pub fn run(&mut self, terminal: &mut Terminal, events: EventHandler) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| view::draw(frame, self))?;

            match events.next()? {
                Event::Key(key) => self.handle_key(key),
                // Picks up changes made by other processes
                Event::Tick => self.refresh_tasks(),
            }
        }

        Ok(())
    }

    pub fn pane(&self) -> &Pane {
        &self.pane
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_index(&self) -> usize {
        self.task_index
    }

    pub fn is_confirming(&self) -> bool {
        self.pending_delete.is_some()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.dispatcher.tracker().clock().now()
    }

    /// Handles a key press
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if matches!(key.code, KeyCode::F(2) | KeyCode::Esc) {
            self.focus = match self.focus {
                Focus::Input => Focus::Tasks,
                Focus::Tasks => Focus::Input,
            };
            return;
        }

        match self.focus {
            Focus::Input => self.handle_input_key(key),
            Focus::Tasks => self.handle_task_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Up => self.history_prev(),
            KeyCode::Down => self.history_next(),
            KeyCode::Tab => self.complete(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    fn handle_task_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if !self.tasks.is_empty() {
                    self.task_index = if self.task_index == 0 {
                        self.tasks.len() - 1
                    } else {
                        self.task_index - 1
                    };
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.tasks.is_empty() {
                    self.task_index = (self.task_index + 1) % self.tasks.len();
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            _ => {}
        }
    }

    /// Runs the input line, or answers a pending deletion
    fn submit(&mut self) {
        let line = std::mem::take(&mut self.input).trim().to_string();
        self.history_pos = None;
        if line.is_empty() {
            return;
        }

        self.pane.line(&format!("> {}", line));

        match self.pending_delete.take() {
            Some(token) => self.answer(token, &line),
            None => {
                self.remember(&line);
                match self.dispatcher.run(&line, &mut self.pane) {
                    Some(Reply::ConfirmDelete { token }) => self.pending_delete = Some(token),
                    Some(Reply::Collapse) => self.pane.toggle(),
                    Some(Reply::Exit) => self.should_quit = true,
                    _ => {}
                }
            }
        }

        self.refresh_tasks();
    }

    fn answer(&mut self, token: DeleteToken, answer: &str) {
        match answer.to_lowercase().as_str() {
            "y" | "yes" => self.dispatcher.confirm(token, true, &mut self.pane),
            "n" | "no" => self.dispatcher.confirm(token, false, &mut self.pane),
            _ => {
                self.pane.line("Please answer 'y' (yes) or 'n' (no).");
                self.pane.line(&delete_prompt(&token));
                self.pending_delete = Some(token);
            }
        }
    }

    fn remember(&mut self, line: &str) {
        if self.history_limit == 0 {
            return;
        }
        if self.history.last().map(String::as_str) != Some(line) {
            self.history.push(line.to_string());
        }
        if self.history.len() > self.history_limit {
            let excess = self.history.len() - self.history_limit;
            self.history.drain(..excess);
        }
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }

        let pos = match self.history_pos {
            None => self.history.len() - 1,
            Some(pos) => pos.saturating_sub(1),
        };
        self.history_pos = Some(pos);
        self.input = self.history[pos].clone();
    }

    fn history_next(&mut self) {
        match self.history_pos {
            Some(pos) if pos + 1 < self.history.len() => {
                self.history_pos = Some(pos + 1);
                self.input = self.history[pos + 1].clone();
            }
            _ => {
                self.history_pos = None;
                self.input.clear();
            }
        }
    }

    /// Completes the task name after start/stop/toggle/delete
    fn complete(&mut self) {
        let Some((command, prefix)) = self.input.split_once(' ') else {
            return;
        };
        if !NAME_COMMANDS.contains(&command.to_lowercase().as_str()) {
            return;
        }
        let command = command.to_string();
        let prefix = prefix.trim_start().to_string();

        match self.dispatcher.tracker().suggestions(&prefix) {
            Ok(names) => match names.as_slice() {
                [] => {}
                [only] => self.input = format!("{} {}", command, only),
                many => self
                    .pane
                    .line(&format!("Suggestions: {}", many.join(", "))),
            },
            Err(e) => self.pane.line(&format!("Error: {}", e)),
        }
    }

    /// Starts or stops the task selected in the task panel
    fn toggle_selected(&mut self) {
        let Some(task) = self.tasks.get(self.task_index) else {
            return;
        };

        let name = task.name.clone();
        self.pane.line(&format!("> toggle {}", name));
        self.dispatcher
            .run_command(Command::Toggle(name), &mut self.pane);
        self.refresh_tasks();
    }

    fn refresh_tasks(&mut self) {
        match self.dispatcher.tracker().list() {
            Ok(tasks) => {
                self.tasks = tasks;
                self.task_index = self.task_index.min(self.tasks.len().saturating_sub(1));
                self.refresh_failed = false;
            }
            Err(e) => {
                // Report once, not on every tick
                if !self.refresh_failed {
                    self.pane.line(&format!("Error: {}", e));
                }
                self.refresh_failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use crate::tracker::Tracker;
    use tempfile::TempDir;

    fn app(dir: &TempDir, history_limit: usize) -> App {
        let dispatcher = Dispatcher::new(
            Tracker::new(Store::open_in_memory().unwrap()),
            dir.path().join("template_report.html"),
            dir.path().to_path_buf(),
        );
        App::new(dispatcher, history_limit)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn submit(app: &mut App, line: &str) {
        type_text(app, line);
        press(app, KeyCode::Enter);
    }

    fn last_line(app: &App) -> &str {
        app.pane().lines().last().map(String::as_str).unwrap_or("")
    }

    #[test]
    fn echoes_and_runs_commands() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        assert_eq!(app.pane().lines(), [WELCOME]);

        submit(&mut app, "add writing 10");
        assert_eq!(
            app.pane().lines()[1..],
            [
                "> add writing 10",
                "Task 'writing' created (minimum 10 min)"
            ]
        );
        assert_eq!(app.input(), "");
        assert_eq!(app.tasks().len(), 1);
    }

    #[test]
    fn history_walks_both_ways() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "list");
        submit(&mut app, "help");

        press(&mut app, KeyCode::Up);
        assert_eq!(app.input(), "help");
        press(&mut app, KeyCode::Up);
        assert_eq!(app.input(), "list");
        press(&mut app, KeyCode::Up);
        assert_eq!(app.input(), "list");

        press(&mut app, KeyCode::Down);
        assert_eq!(app.input(), "help");
        press(&mut app, KeyCode::Down);
        assert_eq!(app.input(), "");
    }

    #[test]
    fn history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 2);
        submit(&mut app, "list");
        submit(&mut app, "help");
        submit(&mut app, "report");

        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.input(), "help");
    }

    #[test]
    fn tab_completes_single_match() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add writing");
        submit(&mut app, "add reading");

        type_text(&mut app, "start WR");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input(), "start writing");
    }

    #[test]
    fn tab_lists_several_matches() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add write");
        submit(&mut app, "add writing");

        type_text(&mut app, "stop wr");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input(), "stop wr");
        assert_eq!(last_line(&app), "Suggestions: write, writing");
    }

    #[test]
    fn tab_ignores_other_commands() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add writing");

        type_text(&mut app, "report w");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input(), "report w");
    }

    #[test]
    fn delete_waits_for_an_answer() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add old");

        submit(&mut app, "delete old");
        assert!(app.is_confirming());
        assert_eq!(last_line(&app), "Really delete task 'old'? (y/n)");

        submit(&mut app, "maybe");
        assert!(app.is_confirming());
        assert_eq!(last_line(&app), "Really delete task 'old'? (y/n)");
        assert_eq!(app.tasks().len(), 1);

        submit(&mut app, "n");
        assert!(!app.is_confirming());
        assert_eq!(last_line(&app), "Delete cancelled.");
        assert_eq!(app.tasks().len(), 1);

        submit(&mut app, "delete old");
        submit(&mut app, "YES");
        assert_eq!(last_line(&app), "Task 'old' deleted (0 sessions removed)");
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn collapsed_pane_opens_on_errors() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);

        submit(&mut app, "collwin");
        assert!(app.pane().is_collapsed());

        submit(&mut app, "list");
        assert!(app.pane().is_collapsed());

        submit(&mut app, "start ghost");
        assert!(!app.pane().is_collapsed());

        submit(&mut app, "collwin");
        submit(&mut app, "collwin");
        assert!(!app.pane().is_collapsed());
    }

    #[test]
    fn collapsed_pane_ignores_task_names() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);

        submit(&mut app, "collwin");
        submit(&mut app, "add \"error log\"");
        submit(&mut app, "add \"unknown cancelled\" 5");
        submit(&mut app, "list");
        assert!(app.pane().is_collapsed());

        submit(&mut app, "frobnicate");
        assert!(!app.pane().is_collapsed());

        submit(&mut app, "collwin");
        submit(&mut app, "report bogus");
        assert!(!app.pane().is_collapsed());
    }

    #[test]
    fn collapsed_pane_opens_on_cancelled_delete() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add old");

        submit(&mut app, "collwin");
        submit(&mut app, "delete old");
        assert!(app.pane().is_collapsed());

        submit(&mut app, "n");
        assert!(!app.pane().is_collapsed());
        assert_eq!(last_line(&app), "Delete cancelled.");
    }

    #[test]
    fn task_panel_toggles_selection() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, 50);
        submit(&mut app, "add a");
        submit(&mut app, "add b");

        press(&mut app, KeyCode::F(2));
        assert_eq!(app.focus(), Focus::Tasks);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);

        assert!(!app.tasks()[0].is_running());
        assert!(app.tasks()[1].is_running());

        press(&mut app, KeyCode::Enter);
        assert!(!app.tasks()[1].is_running());
        assert!(last_line(&app).starts_with("Task 'b' stopped"));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.focus(), Focus::Input);
    }

    #[test]
    fn exit_and_ctrl_c_quit() {
        let dir = TempDir::new().unwrap();

        let mut app1 = app(&dir, 50);
        submit(&mut app1, "exit");
        assert!(app1.should_quit);

        let mut app2 = app(&dir, 50);
        app2.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app2.should_quit);
    }
}
