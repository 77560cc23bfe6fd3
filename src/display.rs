//! Colored terminal output for the `check` command.

use owo_colors::OwoColorize;

use crate::watcher::{LogEvent, RejectReason};

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Print a line that parsed into an event.
pub fn print_parsed(line_no: usize, event: &LogEvent) {
    println!(
        "{} {} time={} source={} event_id={} message={}",
        format!("{line_no:>5}").dimmed(),
        "[OK]".green().bold(),
        event.timestamp().format("%Y-%m-%d %H:%M:%S%.3f"),
        event.source().cyan(),
        event.event_id(),
        truncate(event.message(), DEFAULT_MAX_LEN),
    );
}

/// Print a line the parser rejected.
pub fn print_rejected(line_no: usize, line: &str, reason: RejectReason) {
    println!(
        "{} {} {}: {}",
        format!("{line_no:>5}").dimmed(),
        "[REJECTED]".red().bold(),
        reason.yellow(),
        truncate(line, DEFAULT_MAX_LEN).dimmed(),
    );
}

/// Print totals after a check run.
pub fn print_summary(parsed: usize, rejected: usize) {
    println!(
        "{} {} parsed, {} rejected",
        "[SUMMARY]".blue().bold(),
        parsed.to_string().green(),
        rejected.to_string().red(),
    );
}
