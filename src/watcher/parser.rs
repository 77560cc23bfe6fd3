//! Line parser for the event log grammar.
//!
//! Accepted lines look like:
//!
//! ```text
//! 01.02.2024 10:00:00,123 SOURCE=svc1 EVENTID=42 MESSAGE=disk full
//! ```

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

use super::event::{LogEvent, ParseOutcome, RejectReason};

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<day>\d{2})\.(?P<month>\d{2})\.(?P<year>\d{4}) ",
        r"(?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2}),(?P<frac>\d{1,3})",
        r"\s+SOURCE=(?P<src>\S+)",
        r"\s+EVENTID=(?P<id>\d+)",
        r"\s+MESSAGE=(?P<msg>.*)$",
    ))
    .expect("event line regex is valid")
});

/// Parse one log line.
///
/// Never panics on input; every failure is reported as a
/// [`ParseOutcome::Rejected`] and no partial event is produced.
#[must_use]
pub fn parse_line(line: &str) -> ParseOutcome {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return ParseOutcome::Rejected(RejectReason::Empty);
    }

    let Some(caps) = LINE_RE.captures(line) else {
        return ParseOutcome::Rejected(RejectReason::GrammarMismatch);
    };

    let Some(timestamp) = parse_timestamp(&caps) else {
        return ParseOutcome::Rejected(RejectReason::InvalidTimestamp);
    };

    let Ok(event_id) = caps["id"].parse::<u32>() else {
        return ParseOutcome::Rejected(RejectReason::InvalidEventId);
    };

    ParseOutcome::Parsed(LogEvent::new(
        timestamp,
        caps["src"].to_string(),
        event_id,
        caps["msg"].to_string(),
        line.to_string(),
    ))
}

/// Build a timestamp from `dd.MM.yyyy HH:mm:ss,f{1,3}` components.
///
/// The fraction is decimal: `,1` is 100 ms and `,12` is 120 ms.
fn parse_timestamp(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(
        caps["year"].parse().ok()?,
        caps["month"].parse().ok()?,
        caps["day"].parse().ok()?,
    )?;

    let frac = &caps["frac"];
    let millis: u32 = frac.parse().ok()?;
    let scale = match frac.len() {
        1 => 100,
        2 => 10,
        _ => 1,
    };

    let time = NaiveTime::from_hms_milli_opt(
        caps["hour"].parse().ok()?,
        caps["minute"].parse().ok()?,
        caps["second"].parse().ok()?,
        millis * scale,
    )?;

    Some(date.and_time(time))
}
