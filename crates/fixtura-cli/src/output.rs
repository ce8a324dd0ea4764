//! Formatted output helpers for CLI commands.
//!
//! ANSI styling constants and human-readable duration formatting.

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const CYAN: &str = "\x1b[36m";
pub const RESET: &str = "\x1b[0m";

/// Formats a duration with one decimal of seconds (e.g. "2.4s"), or in
/// milliseconds below one second.
#[must_use]
pub fn format_duration(d: std::time::Duration) -> String {
    if d.as_secs() == 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Formats a container age (e.g. "3m old", "2h old").
#[must_use]
pub fn format_age(age: chrono::TimeDelta) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s old")
    } else if secs < 3600 {
        format!("{}m old", secs / 60)
    } else if secs < 86_400 {
        format!("{}h old", secs / 3600)
    } else {
        format!("{}d old", secs / 86_400)
    }
}
