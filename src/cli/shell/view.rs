//! Shell layout: output pane, task panel, input line and status bar

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::app::{App, Focus};
use crate::domain::format_duration;

const TASK_PANEL_WIDTH: u16 = 32;

pub fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Output + tasks
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    if app.pane().is_collapsed() {
        draw_tasks_panel(frame, app, rows[0]);
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(TASK_PANEL_WIDTH)])
            .split(rows[0]);

        draw_output(frame, app, columns[0]);
        draw_tasks_panel(frame, app, columns[1]);
    }

    draw_input(frame, app, rows[1]);
    draw_status_bar(frame, app, rows[2]);
}

fn draw_output(frame: &mut Frame, app: &App, area: Rect) {
    let lines = app.pane().lines();
    let visible = area.height.saturating_sub(2) as usize;
    let first = lines.len().saturating_sub(visible);

    let text: Vec<Line> = lines[first..]
        .iter()
        .map(|l| {
            if l.starts_with("> ") {
                Line::styled(l.as_str(), Style::default().fg(Color::Yellow))
            } else if l.starts_with("Error") {
                Line::styled(l.as_str(), Style::default().fg(Color::Red))
            } else {
                Line::raw(l.as_str())
            }
        })
        .collect();

    let output = Paragraph::new(text).block(Block::default().title("Output").borders(Borders::ALL));
    frame.render_widget(output, area);
}

fn draw_tasks_panel(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus() == Focus::Tasks;
    let now = app.now();

    let items: Vec<ListItem> = app
        .tasks()
        .iter()
        .map(|task| match task.state.started_at() {
            Some(since) => {
                let elapsed = (now - since).num_seconds().max(0);
                ListItem::new(format!("✓ {} {}", task.name, format_duration(elapsed as f64)))
                    .style(Style::default().fg(Color::Green))
            }
            None => ListItem::new(format!("  {}", task.name)),
        })
        .collect();

    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title("Tasks")
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

    let mut state = ListState::default();
    if focused && !app.tasks().is_empty() {
        state.select(Some(app.task_index()));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.is_confirming() { "Confirm (y/n)" } else { "Command" };
    let focused = app.focus() == Focus::Input;

    let input = Paragraph::new(format!("> {}", app.input())).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(if focused {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }),
    );
    frame.render_widget(input, area);

    if focused {
        let x = area.x + 3 + app.input().chars().count() as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hint = match app.focus() {
        Focus::Input => "Enter:run  Up/Down:history  Tab:complete  F2/Esc:tasks  Ctrl+C:quit",
        Focus::Tasks => "Up/Down:select  Enter:start/stop  F2/Esc:command line  Ctrl+C:quit",
    };
    let running = app.tasks().iter().filter(|t| t.is_running()).count();

    let status = Paragraph::new(format!(" {} running | {}", running, hint))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, area);
}
