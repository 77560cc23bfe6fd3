//! Structured incident records parsed from the event log.

use chrono::NaiveDateTime;
use serde::Serialize;

/// A single event line that matched the log grammar.
///
/// Only the parser constructs these, so every `LogEvent` carries a
/// non-empty `raw_line` alongside its extracted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    timestamp: NaiveDateTime,
    source: String,
    event_id: u32,
    message: String,
    raw_line: String,
}

impl LogEvent {
    pub(crate) fn new(
        timestamp: NaiveDateTime,
        source: String,
        event_id: u32,
        message: String,
        raw_line: String,
    ) -> Self {
        Self {
            timestamp,
            source,
            event_id,
            message,
            raw_line,
        }
    }

    /// Producer-local time of the event.
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Token naming the subsystem that emitted the event.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn event_id(&self) -> u32 {
        self.event_id
    }

    /// Free-text message; may itself contain `KEY=value` text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original line, exactly as read from the log.
    #[must_use]
    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }
}

/// Why a line was not turned into a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Line was empty or whitespace only.
    Empty,
    /// Fields missing, out of order, or malformed.
    GrammarMismatch,
    /// Timestamp had the right shape but is not a real date/time.
    InvalidTimestamp,
    /// Event id does not fit a non-negative 32-bit integer.
    InvalidEventId,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Empty => "empty line",
            Self::GrammarMismatch => "line does not match event grammar",
            Self::InvalidTimestamp => "invalid timestamp",
            Self::InvalidEventId => "invalid event id",
        };
        f.write_str(text)
    }
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(LogEvent),
    Rejected(RejectReason),
}

impl ParseOutcome {
    /// Returns the parsed event, if any.
    #[must_use]
    pub fn event(self) -> Option<LogEvent> {
        match self {
            Self::Parsed(event) => Some(event),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}
