//! # Tracker
//!
//! Task lifecycle, reports and export on top of the [`Store`](crate::storage::Store).
//!
//! ## Key Types
//!
//! - [`Tracker`] - Owns the store and a [`Clock`]; every operation goes through it
//! - [`Report`] - Sessions grouped per task with subtotals
//! - [`ExportRequest`] - Destination, template and filter for an HTML export
//! - [`TrackerError`] - Refused requests and storage failures
//!
//! Deletion is two-phase: [`Tracker::request_delete`] returns a
//! [`DeleteToken`] that must be handed back to [`Tracker::confirm_delete`]
//! together with the user's answer.

mod clock;
mod error;
mod export;
mod lifecycle;
mod report;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{TrackerError, TrackerResult};
pub use export::{default_file_name, ExportRequest, ExportSummary, Template};
pub use lifecycle::{DeleteOutcome, DeleteToken, Toggled, Tracker};
pub use report::{Report, ReportLine, TaskReport};
