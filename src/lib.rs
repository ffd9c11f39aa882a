//! tasktimer - track the time you spend on named tasks
//!
//! Tasks are started and stopped like stopwatches; every start-to-stop
//! interval is stored as a session in a local SQLite database. Sessions can
//! be reported per task or exported as HTML, from the command line or an
//! interactive terminal shell.

pub mod cli;
pub mod domain;
pub mod storage;
pub mod tracker;

pub use domain::{Session, Task, TaskId, TaskState};
pub use tracker::{Tracker, TrackerError};
