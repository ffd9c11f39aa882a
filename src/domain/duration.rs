//! Duration formatting and the per-task minimum-minutes floor

/// Upper bound for a task's minimum billed minutes
pub const MAX_MINIMUM_MINUTES: u32 = 60;

/// Formats a second count as `HH:MM:SS`
///
/// The input is rounded to the nearest whole second first. Hours are padded
/// to two digits but otherwise grow without bound (`100:00:00`).
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Clamps a raw minute value into `0..=60`
///
/// Values below 1 mean "record to the second" and collapse to 0.
pub fn clamp_minimum_minutes(value: i64) -> u32 {
    if value < 1 {
        0
    } else if value > i64::from(MAX_MINIMUM_MINUTES) {
        MAX_MINIMUM_MINUTES
    } else {
        value as u32
    }
}

/// Parses the optional minute floor argument of `add`
///
/// Missing or non-numeric input degrades to 0 instead of failing.
pub fn parse_minimum_minutes(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(clamp_minimum_minutes)
        .unwrap_or(0)
}

/// Credited seconds for an interval under a minute floor
///
/// The elapsed time is rounded to the nearest second; a negative elapsed
/// time (clock moved backwards) counts as zero.
pub fn credited_seconds(elapsed_ms: i64, minimum_minutes: u32) -> i64 {
    let elapsed = ((elapsed_ms.max(0) as f64) / 1000.0).round() as i64;
    elapsed.max(i64::from(minimum_minutes) * 60)
}
