//! Timestamp storage format
//!
//! Timestamps are local wall-clock times stored as text. The stored form
//! sorts lexicographically in time order, which is what the report filters
//! rely on.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Format written to the store
pub const STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format used when showing a timestamp to the user
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid timestamp '{0}' (expected YYYY-MM-DD or YYYY-MM-DD HH:MM[:SS])")]
pub struct TimestampError(pub String);

/// Formats a timestamp for storage
pub fn to_store(ts: &NaiveDateTime) -> String {
    ts.format(STORE_FORMAT).to_string()
}

/// Formats a timestamp for display
pub fn to_display(ts: &NaiveDateTime) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Parses a stored timestamp
///
/// Accepts the current form as well as rows written by older versions
/// (microsecond fraction, no fraction, or a `T` separator).
pub fn from_store(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| TimestampError(raw.to_string()))
}

/// Which side of a range a user-supplied bound sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Start,
    End,
}

/// Parses a user-supplied report bound
///
/// A bare date expands to midnight for a start bound and to the last
/// millisecond of that day for an end bound, so `end=2025-01-31` includes
/// sessions finishing on the 31st.
pub fn parse_bound(raw: &str, side: BoundSide) -> Result<NaiveDateTime, TimestampError> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match side {
            BoundSide::Start => NaiveTime::MIN,
            BoundSide::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .ok_or_else(|| TimestampError(raw.to_string()))?,
        };
        return Ok(date.and_time(time));
    }

    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .ok_or_else(|| TimestampError(raw.to_string()))
}
