//! HTML export
//!
//! Reports are exported by filling a user-editable template. The template
//! language is intentionally small:
//!
//! - `{{ name }}` inserts a value (HTML-escaped, unknown names render empty)
//! - `{{#sessions}} ... {{/sessions}}` repeats its body once per session
//!
//! Values available everywhere: `generated_at`, `filter`, `total`,
//! `total_sec`. Inside the sessions section additionally: `task`, `start`,
//! `end`, `duration`, `duration_sec`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use super::clock::Clock;
use super::error::{TrackerError, TrackerResult};
use super::lifecycle::Tracker;
use super::report::Report;
use crate::domain::{format_duration, timestamp, ReportFilter};

const SECTION: &str = "sessions";

/// What to export and where
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub destination: PathBuf,
    pub template: PathBuf,
    pub filter: ReportFilter,
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub destination: PathBuf,
    pub sessions: usize,
    pub total_sec: i64,
}

/// Default export file name for a point in time
pub fn default_file_name(now: &NaiveDateTime) -> String {
    format!("report_{}.html", now.format("%Y%m%d%H%M%S"))
}

impl<C: Clock> Tracker<C> {
    /// Exports the filtered report through the template
    ///
    /// Never overwrites: an existing destination fails before anything is
    /// read, and the file itself is created with create-new semantics.
    /// Nothing is written when no session matches.
    pub fn export(&self, request: &ExportRequest) -> TrackerResult<ExportSummary> {
        if request.destination.exists() {
            return Err(TrackerError::DestinationExists(request.destination.clone()));
        }

        let report = self.report(&request.filter)?;
        if report.is_empty() {
            return Err(TrackerError::NoMatchingSessions);
        }

        let template = Template::load(&request.template)?;
        let html = template.render(&report, &self.clock().now());

        write_new(&request.destination, &html)?;

        Ok(ExportSummary {
            destination: request.destination.clone(),
            sessions: report.session_count(),
            total_sec: report.total_sec(),
        })
    }
}

fn write_new(path: &Path, content: &str) -> TrackerResult<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(TrackerError::DestinationExists(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Value(String),
    Sessions(Vec<Segment>),
}

/// A parsed report template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// One session row as seen by the template
struct Row {
    task: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    duration_sec: i64,
}

impl Template {
    /// Reads and parses a template file
    pub fn load(path: &Path) -> TrackerResult<Self> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TrackerError::TemplateMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse(&source)
    }

    /// Parses template source
    pub fn parse(source: &str) -> TrackerResult<Self> {
        let mut top: Vec<Segment> = Vec::new();
        let mut section: Option<Vec<Segment>> = None;
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let (text, after_open) = rest.split_at(open);
            let after_open = &after_open[2..];
            let close = after_open
                .find("}}")
                .ok_or_else(|| TrackerError::InvalidTemplate("unclosed '{{' tag".to_string()))?;
            let tag = after_open[..close].trim();
            rest = &after_open[close + 2..];

            let target = section.as_mut().unwrap_or(&mut top);
            if !text.is_empty() {
                target.push(Segment::Text(text.to_string()));
            }

            if let Some(name) = tag.strip_prefix('#') {
                let name = name.trim();
                if name != SECTION {
                    return Err(TrackerError::InvalidTemplate(format!(
                        "unknown section '{}'",
                        name
                    )));
                }
                if section.is_some() {
                    return Err(TrackerError::InvalidTemplate(
                        "sections cannot be nested".to_string(),
                    ));
                }
                section = Some(Vec::new());
            } else if let Some(name) = tag.strip_prefix('/') {
                let body = section.take().filter(|_| name.trim() == SECTION).ok_or_else(|| {
                    TrackerError::InvalidTemplate(format!("unexpected '{{{{/{}}}}}'", name.trim()))
                })?;
                top.push(Segment::Sessions(body));
            } else {
                target.push(Segment::Value(tag.to_string()));
            }
        }

        if section.is_some() {
            return Err(TrackerError::InvalidTemplate(
                "missing '{{/sessions}}'".to_string(),
            ));
        }
        if !rest.is_empty() {
            top.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments: top })
    }

    /// Renders a report
    ///
    /// Session rows are listed in chronological order across all tasks.
    pub fn render(&self, report: &Report, generated_at: &NaiveDateTime) -> String {
        let mut rows: Vec<Row> = report
            .tasks
            .iter()
            .flat_map(|task| {
                task.sessions.iter().map(move |s| Row {
                    task: task.name.clone(),
                    start: s.start,
                    end: s.end,
                    duration_sec: s.duration_sec,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task.cmp(&b.task)));

        let globals = Globals {
            generated_at: timestamp::to_display(generated_at),
            filter: report.filter.describe(),
            total_sec: report.total_sec(),
        };

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Sessions(body) => {
                    for row in &rows {
                        render_segments(&mut out, body, &globals, Some(row));
                    }
                }
                other => render_segments(&mut out, std::slice::from_ref(other), &globals, None),
            }
        }
        out
    }
}

struct Globals {
    generated_at: String,
    filter: String,
    total_sec: i64,
}

fn render_segments(out: &mut String, segments: &[Segment], globals: &Globals, row: Option<&Row>) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Value(name) => out.push_str(&escape_html(&lookup(name, globals, row))),
            // Parsing never produces a nested section
            Segment::Sessions(_) => {}
        }
    }
}

fn lookup(name: &str, globals: &Globals, row: Option<&Row>) -> String {
    if let Some(row) = row {
        match name {
            "task" => return row.task.clone(),
            "start" => return timestamp::to_display(&row.start),
            "end" => return timestamp::to_display(&row.end),
            "duration" => return format_duration(row.duration_sec as f64),
            "duration_sec" => return row.duration_sec.to_string(),
            _ => {}
        }
    }

    match name {
        "generated_at" => globals.generated_at.clone(),
        "filter" => globals.filter.clone(),
        "total" => format_duration(globals.total_sec as f64),
        "total_sec" => globals.total_sec.to_string(),
        _ => String::new(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
