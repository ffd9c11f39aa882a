//! Report filters
//!
//! Filters are written as `key=value` words on the command line:
//! `start=<ts>`, `end=<ts>` and `task=<name>`. All present conditions
//! must hold (AND).

use chrono::NaiveDateTime;
use serde::Serialize;

use super::timestamp::{self, BoundSide, TimestampError};

/// Conjunctive session filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportFilter {
    /// Exact task name
    pub task: Option<String>,
    /// Sessions starting at or after this time
    pub start: Option<NaiveDateTime>,
    /// Sessions ending at or before this time
    pub end: Option<NaiveDateTime>,
}

/// Result of parsing filter words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFilter {
    pub filter: ReportFilter,
    /// Words that were not recognized as filters
    pub unknown: Vec<String>,
}

impl ReportFilter {
    /// Returns true if the word looks like a filter (`start=`, `end=`, `task=`)
    pub fn is_filter_word(word: &str) -> bool {
        ["start=", "end=", "task="].iter().any(|p| word.starts_with(p))
    }

    /// Parses filter words, collecting anything unrecognized
    ///
    /// A task name runs until the next filter word, so `task=deep work`
    /// selects the task `deep work`.
    pub fn parse<I, S>(words: I) -> Result<ParsedFilter, TimestampError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ParsedFilter::default();
        let mut in_task = false;

        for word in words {
            let word = word.as_ref();
            match word.split_once('=') {
                Some(("start", value)) => {
                    in_task = false;
                    parsed.filter.start = Some(timestamp::parse_bound(value, BoundSide::Start)?);
                }
                Some(("end", value)) => {
                    in_task = false;
                    parsed.filter.end = Some(timestamp::parse_bound(value, BoundSide::End)?);
                }
                Some(("task", value)) if !value.is_empty() => {
                    in_task = true;
                    parsed.filter.task = Some(value.to_string());
                }
                Some(("task", _)) => {
                    in_task = false;
                    parsed.unknown.push(word.to_string());
                }
                _ => match parsed.filter.task {
                    Some(ref mut task) if in_task => {
                        task.push(' ');
                        task.push_str(word);
                    }
                    _ => parsed.unknown.push(word.to_string()),
                },
            }
        }

        Ok(parsed)
    }

    /// Returns true if no condition is set
    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.start.is_none() && self.end.is_none()
    }

    /// Returns true if the filter narrows the report to one task
    pub fn is_single_task(&self) -> bool {
        self.task.is_some()
    }

    /// Human description, e.g. `task=writing start=2025-01-01 00:00:00`
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref task) = self.task {
            parts.push(format!("task={}", task));
        }
        if let Some(ref start) = self.start {
            parts.push(format!("start={}", timestamp::to_display(start)));
        }
        if let Some(ref end) = self.end {
            parts.push(format!("end={}", timestamp::to_display(end)));
        }

        if parts.is_empty() {
            "all sessions".to_string()
        } else {
            parts.join(" ")
        }
    }
}
