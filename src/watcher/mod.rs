//! Event log tailing.
//!
//! Tracks a byte offset into the log file, parses appended lines, and
//! hands each parsed event to an [`EventSink`].

mod cursor;
mod error;
mod event;
mod log_watcher;
mod parser;

pub use cursor::{Chunk, Poll, TailCursor};
pub use error::WatcherError;
pub use event::{LogEvent, ParseOutcome, RejectReason};
pub use log_watcher::{EventSink, LogWatcher, PollReport};
pub use parser::parse_line;
