//! Session reports
//!
//! A report groups the sessions matching a [`ReportFilter`] by task. Each
//! group carries its sessions in start order and a subtotal; the grand
//! total is only present when the filter does not pick a single task.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::clock::Clock;
use super::error::TrackerResult;
use super::lifecycle::Tracker;
use crate::domain::{format_duration, timestamp, ReportFilter, SessionRecord};

/// One session line of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_sec: i64,
}

/// Sessions of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub sessions: Vec<ReportLine>,
    pub subtotal_sec: i64,
}

/// Aggregated sessions for a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub filter: ReportFilter,
    pub tasks: Vec<TaskReport>,
    pub grand_total_sec: Option<i64>,
}

impl Report {
    /// Groups session records by task
    ///
    /// Records must be ordered by task name, then start time (the order
    /// the store returns them in).
    pub fn from_records(filter: ReportFilter, records: Vec<SessionRecord>) -> Self {
        let mut tasks: Vec<TaskReport> = Vec::new();

        for record in records {
            let line = ReportLine {
                start: record.session.start,
                end: record.session.end,
                duration_sec: record.session.duration_sec,
            };

            match tasks.last_mut() {
                Some(group) if group.name == record.task_name => {
                    group.subtotal_sec += line.duration_sec;
                    group.sessions.push(line);
                }
                _ => tasks.push(TaskReport {
                    name: record.task_name,
                    subtotal_sec: line.duration_sec,
                    sessions: vec![line],
                }),
            }
        }

        let grand_total_sec = if filter.is_single_task() {
            None
        } else {
            Some(tasks.iter().map(|t| t.subtotal_sec).sum())
        };

        Self {
            filter,
            tasks,
            grand_total_sec,
        }
    }

    /// Returns true if no session matched
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of matching sessions
    pub fn session_count(&self) -> usize {
        self.tasks.iter().map(|t| t.sessions.len()).sum()
    }

    /// Sum of all subtotals
    pub fn total_sec(&self) -> i64 {
        self.tasks.iter().map(|t| t.subtotal_sec).sum()
    }

    /// Renders the report as text lines
    pub fn render_text(&self) -> Vec<String> {
        let mut lines = vec![format!("Report ({}):", self.filter.describe())];

        for task in &self.tasks {
            lines.push(String::new());
            lines.push(format!("=== {} ===", task.name));
            for session in &task.sessions {
                lines.push(format!(
                    "  {} - {} | {}",
                    timestamp::to_display(&session.start),
                    timestamp::to_display(&session.end),
                    format_duration(session.duration_sec as f64)
                ));
            }
            lines.push(format!(
                "  Total for '{}': {}",
                task.name,
                format_duration(task.subtotal_sec as f64)
            ));
        }

        if let Some(total) = self.grand_total_sec {
            lines.push(String::new());
            lines.push(format!("Grand total: {}", format_duration(total as f64)));
        }

        lines
    }
}

impl<C: Clock> Tracker<C> {
    /// Builds a report for the given filter
    pub fn report(&self, filter: &ReportFilter) -> TrackerResult<Report> {
        let records = self.store().sessions(filter)?;
        Ok(Report::from_records(filter.clone(), records))
    }
}
