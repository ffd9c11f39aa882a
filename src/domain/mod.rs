//! Domain models for tasktimer
//!
//! Contains the core business logic without any I/O concerns.

mod duration;
mod filter;
mod task;
pub mod timestamp;

pub use duration::{
    clamp_minimum_minutes, credited_seconds, format_duration, parse_minimum_minutes,
    MAX_MINIMUM_MINUTES,
};
pub use filter::{ParsedFilter, ReportFilter};
pub use task::{Session, SessionId, SessionRecord, Task, TaskId, TaskState};
pub use timestamp::TimestampError;
