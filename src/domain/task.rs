//! Task and session domain models
//!
//! A task is a named timer subject that is either idle or running. Each
//! completed start→stop interval is recorded as an immutable session.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Storage identity of a task
pub type TaskId = i64;

/// Storage identity of a session
pub type SessionId = i64;

/// Running state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Running { since: NaiveDateTime },
}

impl TaskState {
    /// Returns true while a session is open
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running { .. })
    }

    /// Start of the open interval, if any
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        match self {
            TaskState::Idle => None,
            TaskState::Running { since } => Some(*since),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Idle => "idle",
            TaskState::Running { .. } => "running",
        }
    }
}

/// A named timer subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(flatten)]
    pub state: TaskState,
    /// Minimum billed minutes per session, 0 records to the second
    pub minimum_minutes: u32,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Minimum credited seconds per session
    pub fn floor_seconds(&self) -> i64 {
        i64::from(self.minimum_minutes) * 60
    }

    /// Human description of the recording policy
    pub fn policy_label(&self) -> String {
        if self.minimum_minutes > 0 {
            format!("minimum {} min", self.minimum_minutes)
        } else {
            "to the second".to_string()
        }
    }
}

/// One completed interval recorded against a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub task_id: TaskId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Credited seconds, may exceed `end - start` when the floor applied
    pub duration_sec: i64,
}

/// A session joined with the name of its task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub task_name: String,
    #[serde(flatten)]
    pub session: Session,
}
