//! Command dispatcher
//!
//! Turns a command line such as `add writing 10` or
//! `report start=2025-01-01 task=writing` into a [`Command`], runs it
//! against the [`Tracker`] and renders the [`Reply`] as text lines.
//! The shell feeds it raw input lines; the CLI builds [`Command`]s from
//! its clap arguments and uses [`Dispatcher::execute`] directly.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use super::output::Sink;
use crate::domain::{format_duration, timestamp, ReportFilter, Session, Task, TimestampError};
use crate::storage::Workspace;
use crate::tracker::{
    default_file_name, Clock, DeleteOutcome, DeleteToken, ExportRequest, ExportSummary, Report,
    SystemClock, Toggled, Tracker, TrackerResult,
};

const HELP: &[&str] = &[
    "Available commands:",
    "  add <name> [minutes]             create a task (minimum minutes per session, 1-60)",
    "                                   quote names with spaces: add \"deep work\" 10",
    "  start <name>                     start the timer of a task",
    "  stop <name>                      stop the timer and record the session",
    "  toggle <name>                    start or stop a task",
    "  delete <name>                    delete a task and its sessions",
    "  list                             list all tasks",
    "  report [start=.. end=.. task=..] show recorded sessions",
    "  export [path] [start=.. end=.. task=..]",
    "                                   export the report as HTML",
    "  collwin                          collapse or expand the output (shell only)",
    "  exit                             leave the shell",
    "  help                             show this help",
];

const ADD_USAGE: &str = "add <name> [minutes] (quote names with spaces)";
const START_USAGE: &str = "start <name>";
const STOP_USAGE: &str = "stop <name>";
const TOGGLE_USAGE: &str = "toggle <name>";
const DELETE_USAGE: &str = "delete <name>";

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Add {
        name: String,
        minutes: Option<String>,
    },
    Start(String),
    Stop(String),
    Toggle(String),
    Delete(String),
    List,
    Report {
        filter: ReportFilter,
        unknown: Vec<String>,
    },
    Export {
        destination: Option<PathBuf>,
        filter: ReportFilter,
        unknown: Vec<String>,
    },
    /// Collapse or expand the shell's output pane
    Collapse,
    Exit,
}

/// A command line that could not be turned into a [`Command`]
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Syntax: {0}")]
    Usage(&'static str),

    #[error("Unknown command: {0} (type 'help' for a list of commands)")]
    Unknown(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

impl Command {
    /// Parses a command line; blank input yields `None`
    ///
    /// Words are split on whitespace; double quotes group words, so
    /// `add "deep work" 10` names a task with a space in it. Task names for
    /// start, stop, toggle and delete take the rest of the line and need
    /// no quotes.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = split_words(line).into_iter();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "help" => Command::Help,
            "add" => Self::add(&args)?,
            "start" => Command::Start(rest_of_line(&args, START_USAGE)?),
            "stop" => Command::Stop(rest_of_line(&args, STOP_USAGE)?),
            "toggle" => Command::Toggle(rest_of_line(&args, TOGGLE_USAGE)?),
            "delete" => Command::Delete(rest_of_line(&args, DELETE_USAGE)?),
            "list" => Command::List,
            "report" => Self::report(&args)?,
            "export" => Self::export(&args)?,
            "collwin" => Command::Collapse,
            "exit" | "quit" => Command::Exit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }

    /// Builds an add command from `<name> [minutes]`
    ///
    /// The second word is always the minute floor; anything that is not a
    /// whole number credits sessions to the second.
    pub fn add<S: AsRef<str>>(words: &[S]) -> Result<Self, CommandError> {
        match words {
            [name] => Ok(Command::Add {
                name: name.as_ref().to_string(),
                minutes: None,
            }),
            [name, minutes] => Ok(Command::Add {
                name: name.as_ref().to_string(),
                minutes: Some(minutes.as_ref().to_string()),
            }),
            _ => Err(CommandError::Usage(ADD_USAGE)),
        }
    }

    /// Builds a report command from filter words
    pub fn report<S: AsRef<str>>(words: &[S]) -> Result<Self, CommandError> {
        let parsed = ReportFilter::parse(words)?;
        Ok(Command::Report {
            filter: parsed.filter,
            unknown: parsed.unknown,
        })
    }

    /// Builds an export command
    ///
    /// The first word is the destination unless it looks like a filter.
    pub fn export<S: AsRef<str>>(words: &[S]) -> Result<Self, CommandError> {
        let (destination, filters) = match words.split_first() {
            Some((first, rest)) if !ReportFilter::is_filter_word(first.as_ref()) => {
                (Some(PathBuf::from(first.as_ref())), rest)
            }
            _ => (None, words),
        };

        let parsed = ReportFilter::parse(filters)?;
        Ok(Command::Export {
            destination,
            filter: parsed.filter,
            unknown: parsed.unknown,
        })
    }

    /// Arguments that were ignored because they are not filters
    pub fn unknown_args(&self) -> &[String] {
        match self {
            Command::Report { unknown, .. } | Command::Export { unknown, .. } => unknown,
            _ => &[],
        }
    }
}

fn rest_of_line(args: &[String], usage: &'static str) -> Result<String, CommandError> {
    if args.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(args.join(" "))
    }
}

/// Splits a line into words, keeping double-quoted text together
///
/// Quotes may open mid-word (`task="deep work"`) and are dropped from the
/// result. An unclosed quote runs to the end of the line.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }

    words
}

/// Result of a successfully executed command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Help,
    Created { task: Task },
    Started { task: Task },
    Stopped { name: String, session: Session },
    /// Deletion requested; the caller must ask the user and confirm
    ConfirmDelete { token: DeleteToken },
    Deleted { outcome: DeleteOutcome },
    Tasks { tasks: Vec<Task> },
    Report { report: Report },
    Exported { summary: ExportSummary },
    Collapse,
    Exit,
}

impl Reply {
    /// Renders the reply as human-readable lines
    pub fn lines(&self) -> Vec<String> {
        match self {
            Reply::Help => HELP.iter().map(|l| l.to_string()).collect(),
            Reply::Created { task } => vec![format!(
                "Task '{}' created ({})",
                task.name,
                task.policy_label()
            )],
            Reply::Started { task } => {
                let since = task
                    .state
                    .started_at()
                    .map(|t| timestamp::to_display(&t))
                    .unwrap_or_default();
                vec![format!("Task '{}' started at {}", task.name, since)]
            }
            Reply::Stopped { name, session } => vec![format!(
                "Task '{}' stopped. Recorded {}",
                name,
                format_duration(session.duration_sec as f64)
            )],
            Reply::ConfirmDelete { token } => vec![delete_prompt(token)],
            Reply::Deleted { outcome } => match outcome {
                DeleteOutcome::Deleted {
                    name,
                    sessions_removed,
                } => vec![format!(
                    "Task '{}' deleted ({} sessions removed)",
                    name, sessions_removed
                )],
                DeleteOutcome::Cancelled { .. } => vec!["Delete cancelled.".to_string()],
            },
            Reply::Tasks { tasks } => list_lines(tasks),
            Reply::Report { report } => {
                if report.is_empty() {
                    vec!["No sessions found.".to_string()]
                } else {
                    report.render_text()
                }
            }
            Reply::Exported { summary } => vec![format!(
                "Report exported to {} ({} sessions, total {})",
                summary.destination.display(),
                summary.sessions,
                format_duration(summary.total_sec as f64)
            )],
            Reply::Collapse | Reply::Exit => Vec::new(),
        }
    }
}

/// Question asked before a deletion is confirmed
pub fn delete_prompt(token: &DeleteToken) -> String {
    format!("Really delete task '{}'? (y/n)", token.name())
}

fn list_lines(tasks: &[Task]) -> Vec<String> {
    if tasks.is_empty() {
        return vec!["No tasks yet. Use 'add <name>' to create one.".to_string()];
    }

    let mut lines = vec!["Tasks:".to_string()];
    for task in tasks {
        let state = match task.state.started_at() {
            Some(since) => format!("running since {}", timestamp::to_display(&since)),
            None => task.state.label().to_string(),
        };
        let marker = if task.is_running() { "✓" } else { " " };
        lines.push(format!(
            "  {} {} ({}, {})",
            marker,
            task.name,
            state,
            task.policy_label()
        ));
    }
    lines
}

/// Executes commands against a tracker
pub struct Dispatcher<C: Clock = SystemClock> {
    tracker: Tracker<C>,
    template: PathBuf,
    export_dir: PathBuf,
}

impl Dispatcher<SystemClock> {
    /// Opens the workspace's store and export settings
    pub fn open(workspace: &Workspace) -> Result<Self> {
        let tracker = Tracker::new(workspace.store()?);
        Ok(Self::new(
            tracker,
            workspace.template_path(),
            workspace.export_dir(),
        ))
    }
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(tracker: Tracker<C>, template: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            tracker,
            template,
            export_dir,
        }
    }

    pub fn tracker(&self) -> &Tracker<C> {
        &self.tracker
    }

    /// Runs a command
    ///
    /// `delete` only checks that the task exists and returns
    /// [`Reply::ConfirmDelete`]; nothing is removed until
    /// [`Dispatcher::confirm_delete`] is called with the token.
    pub fn execute(&mut self, command: Command) -> TrackerResult<Reply> {
        let reply = match command {
            Command::Help => Reply::Help,
            Command::Add { name, minutes } => Reply::Created {
                task: self.tracker.create(&name, minutes.as_deref())?,
            },
            Command::Start(name) => Reply::Started {
                task: self.tracker.start(&name)?,
            },
            Command::Stop(name) => {
                let session = self.tracker.stop(&name)?;
                Reply::Stopped { name, session }
            }
            Command::Toggle(name) => match self.tracker.toggle(&name)? {
                Toggled::Started { task } => Reply::Started { task },
                Toggled::Stopped { task, session } => Reply::Stopped {
                    name: task.name,
                    session,
                },
            },
            Command::Delete(name) => Reply::ConfirmDelete {
                token: self.tracker.request_delete(&name)?,
            },
            Command::List => Reply::Tasks {
                tasks: self.tracker.list()?,
            },
            Command::Report { filter, .. } => Reply::Report {
                report: self.tracker.report(&filter)?,
            },
            Command::Export {
                destination,
                filter,
                ..
            } => {
                let destination = destination.unwrap_or_else(|| {
                    self.export_dir
                        .join(default_file_name(&self.tracker.clock().now()))
                });
                let request = ExportRequest {
                    destination,
                    template: self.template.clone(),
                    filter,
                };
                Reply::Exported {
                    summary: self.tracker.export(&request)?,
                }
            }
            Command::Collapse => Reply::Collapse,
            Command::Exit => Reply::Exit,
        };

        Ok(reply)
    }

    /// Completes a deletion started by `delete`
    pub fn confirm_delete(&mut self, token: DeleteToken, approved: bool) -> TrackerResult<Reply> {
        Ok(Reply::Deleted {
            outcome: self.tracker.confirm_delete(token, approved)?,
        })
    }

    /// Parses and runs one input line, writing every result to `sink`
    ///
    /// Errors never escape: each becomes a single line. Returns the reply
    /// so the caller can react to confirmations, collapse and exit.
    pub fn run<S: Sink>(&mut self, line: &str, sink: &mut S) -> Option<Reply> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e @ CommandError::Timestamp(_)) => {
                sink.line(&format!("Error: {}", e));
                return None;
            }
            Err(e) => {
                sink.line(&e.to_string());
                return None;
            }
        };

        self.run_command(command, sink)
    }

    /// Runs an already parsed command, writing every result to `sink`
    pub fn run_command<S: Sink>(&mut self, command: Command, sink: &mut S) -> Option<Reply> {
        for arg in command.unknown_args() {
            sink.line(&format!("Unknown argument: {}", arg));
        }

        let result = self.execute(command);
        emit(result, sink)
    }

    /// Answers a pending deletion, writing the result to `sink`
    pub fn confirm<S: Sink>(&mut self, token: DeleteToken, approved: bool, sink: &mut S) {
        let result = self.confirm_delete(token, approved);
        emit(result, sink);
    }
}

fn emit<S: Sink>(result: TrackerResult<Reply>, sink: &mut S) -> Option<Reply> {
    match result {
        Ok(reply) => {
            for line in reply.lines() {
                sink.line(&line);
            }
            Some(reply)
        }
        Err(e) => {
            sink.line(&format!("Error: {}", e));
            None
        }
    }
}
