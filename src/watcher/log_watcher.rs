//! Poll loop that turns appended log lines into forwarded events.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::cursor::{Chunk, Poll, TailCursor};
use super::error::WatcherError;
use super::event::{LogEvent, ParseOutcome};
use super::parser::parse_line;
use crate::config::WatcherConfig;
use crate::monitor::MetricsService;

/// Receiver of parsed events, called once per event in file order.
#[async_trait]
pub trait EventSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle one event. A returned error is logged by the watcher and the
    /// event is dropped.
    async fn handle(&self, event: &LogEvent) -> Result<(), Self::Error>;
}

/// Counts from one or more poll iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Non-empty lines read from the file.
    pub lines: u64,
    pub parsed: u64,
    pub rejected: u64,
    /// Events the sink accepted.
    pub forwarded: u64,
    /// Events the sink failed on.
    pub failed: u64,
    /// Number of truncations observed.
    pub truncations: u64,
}

impl PollReport {
    fn absorb(&mut self, other: PollReport) {
        self.lines += other.lines;
        self.parsed += other.parsed;
        self.rejected += other.rejected;
        self.forwarded += other.forwarded;
        self.failed += other.failed;
        self.truncations += other.truncations;
    }
}

/// Watches one log file and hands every parsed line to an [`EventSink`].
///
/// Events are delivered strictly in file order, one at a time: a slow sink
/// delays every later line of the same file.
pub struct LogWatcher<S> {
    path: PathBuf,
    /// `None` until the file's length could be read once.
    cursor: Option<TailCursor>,
    sink: S,
    poll_interval: Duration,
    metrics: Option<Arc<MetricsService>>,
}

impl<S: EventSink> LogWatcher<S> {
    /// Create a watcher positioned at the current end of the configured
    /// log file. The parent directory is created if it is missing.
    ///
    /// If the file's size cannot be read yet (for example a parent path
    /// that is not a directory), the watcher starts unpositioned and every
    /// poll retries until it succeeds. It never falls back to offset 0.
    pub async fn new(config: &WatcherConfig, sink: S) -> Self {
        let path = config.log_file.clone();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to create log directory");
            }
        }

        let cursor = match TailCursor::open(&path).await {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot position on log file yet, will retry"
                );
                None
            }
        };

        Self {
            path,
            cursor,
            sink,
            poll_interval: config.poll_interval(),
            metrics: None,
        }
    }

    /// Create a watcher around an existing cursor.
    #[must_use]
    pub fn from_cursor(cursor: TailCursor, sink: S, poll_interval: Duration) -> Self {
        Self {
            path: cursor.path().to_path_buf(),
            cursor: Some(cursor),
            sink,
            poll_interval,
            metrics: None,
        }
    }

    /// Report line counts and I/O failures to a metrics service.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsService>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The cursor, once the watcher has positioned itself on the file.
    #[must_use]
    pub fn cursor(&self) -> Option<&TailCursor> {
        self.cursor.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one iteration: read new bytes, parse them, forward each event.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, or if the
    /// watcher is still unpositioned and the file's size is still
    /// unreadable. The cursor is left where it was, so the same bytes are
    /// retried next time.
    pub async fn poll_once(&mut self) -> Result<PollReport, WatcherError> {
        let mut report = PollReport::default();

        let Some(cursor) = self.cursor.as_mut() else {
            // Positioning at EOF is the whole iteration: lines present at
            // this moment count as history.
            self.cursor = Some(TailCursor::open(&self.path).await?);
            return Ok(report);
        };

        let chunk = match cursor.poll().await? {
            Poll::Missing => return Ok(report),
            Poll::Unchanged { truncated_from } => {
                report.truncations += u64::from(truncated_from.is_some());
                return Ok(report);
            }
            Poll::Read(chunk) => chunk,
        };
        report.truncations += u64::from(chunk.truncated_from.is_some());

        self.process_chunk(&chunk, &mut report).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_lines(report.lines, report.rejected);
        }
        Ok(report)
    }

    async fn process_chunk(&self, chunk: &Chunk, report: &mut PollReport) {
        if chunk.text.trim().is_empty() {
            return;
        }

        let lines: Vec<&str> = chunk.text.lines().filter(|l| !l.is_empty()).collect();
        tracing::info!(
            count = lines.len(),
            start = chunk.start,
            end = chunk.end,
            "Detected new line(s) in log"
        );

        for line in lines {
            report.lines += 1;
            let event = match parse_line(line) {
                ParseOutcome::Parsed(event) => event,
                ParseOutcome::Rejected(reason) => {
                    report.rejected += 1;
                    tracing::warn!(line = %line, reason = %reason, "Unparsed log line");
                    continue;
                }
            };
            report.parsed += 1;

            tracing::info!(
                time = %event.timestamp(),
                source = %event.source(),
                event_id = event.event_id(),
                message = %event.message(),
                "Parsed event"
            );

            match self.sink.handle(&event).await {
                Ok(()) => report.forwarded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        source = %event.source(),
                        event_id = event.event_id(),
                        error = %e,
                        "Failed to forward event, dropping it"
                    );
                }
            }
        }
    }

    /// Poll until `cancel` fires, sleeping `poll_interval` between
    /// iterations. Errors are logged and never end the loop.
    ///
    /// Returns the totals over every iteration.
    pub async fn run(&mut self, cancel: CancellationToken) -> PollReport {
        tracing::info!(
            path = %self.path.display(),
            interval_ms = self.poll_interval.as_millis(),
            "Log watcher started"
        );

        let mut totals = PollReport::default();
        while !cancel.is_cancelled() {
            match self.poll_once().await {
                Ok(report) => totals.absorb(report),
                Err(e) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_exception();
                    }
                    if self.cursor.is_none() {
                        tracing::warn!(
                            path = %self.path.display(),
                            error = %e,
                            "Log file still unreadable, retrying"
                        );
                    } else {
                        tracing::error!(
                            path = %self.path.display(),
                            error = %e,
                            "Log watcher iteration failed"
                        );
                    }
                }
            }

            tokio::select! {
                biased;

                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!(
            path = %self.path.display(),
            lines = totals.lines,
            forwarded = totals.forwarded,
            "Log watcher stopped"
        );
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, thiserror::Error)]
    #[error("sink rejected event {0}")]
    struct Rejected(u32);

    /// Records events and fails on ids listed in `fail_on`.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<LogEvent>>,
        fail_on: Vec<u32>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        type Error = Rejected;

        async fn handle(&self, event: &LogEvent) -> Result<(), Rejected> {
            self.seen.lock().unwrap().push(event.clone());
            if self.fail_on.contains(&event.event_id()) {
                return Err(Rejected(event.event_id()));
            }
            Ok(())
        }
    }

    fn line(id: u32) -> String {
        format!("01.02.2024 10:00:00,123 SOURCE=svc1 EVENTID={id} MESSAGE=event {id}\n")
    }

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    async fn watcher(path: &Path, sink: RecordingSink) -> LogWatcher<RecordingSink> {
        let config = WatcherConfig {
            log_file: path.to_path_buf(),
            poll_interval_ms: 10,
        };
        LogWatcher::new(&config, sink).await
    }

    #[tokio::test]
    async fn test_forwards_events_in_file_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "").unwrap();

        let mut watcher = watcher(&path, RecordingSink::default()).await;
        append(&path, &format!("{}{}", line(1), line(2)));

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.parsed, 2);
        assert_eq!(report.forwarded, 2);

        let ids: Vec<u32> = watcher
            .sink()
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(LogEvent::event_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_preexisting_lines_not_forwarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, line(1)).unwrap();

        let mut watcher = watcher(&path, RecordingSink::default()).await;
        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report, PollReport::default());
        assert!(watcher.sink().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_and_failed_lines_are_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "").unwrap();

        let sink = RecordingSink {
            fail_on: vec![2],
            ..Default::default()
        };
        let mut watcher = watcher(&path, sink).await;
        append(
            &path,
            &format!("garbage\n\n{}{}\r\n{}", line(1), line(2).trim_end(), line(3)),
        );

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.parsed, 3);
        assert_eq!(report.forwarded, 2);
        assert_eq!(report.failed, 1);

        // Nothing is retried on the next poll.
        let again = watcher.poll_once().await.unwrap();
        assert_eq!(again, PollReport::default());
        assert_eq!(watcher.sink().seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("events.log");

        let mut watcher = watcher(&path, RecordingSink::default()).await;
        assert!(path.parent().unwrap().is_dir());
        assert_eq!(watcher.poll_once().await.unwrap(), PollReport::default());

        append(&path, &line(5));
        assert_eq!(watcher.poll_once().await.unwrap().forwarded, 1);
    }

    #[tokio::test]
    async fn test_metrics_receive_line_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "").unwrap();

        let metrics = Arc::new(MetricsService::default());
        let mut watcher = watcher(&path, RecordingSink::default())
            .await
            .with_metrics(Arc::clone(&metrics));
        append(&path, &format!("bad line\n{}", line(1)));
        watcher.poll_once().await.unwrap();

        let sample = metrics.collect_sample();
        assert_eq!(sample.lines_read, 2);
        assert_eq!(sample.lines_rejected, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "").unwrap();

        let mut watcher = watcher(&path, RecordingSink::default()).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            append(&writer_path, &line(9));
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let totals = tokio::time::timeout(Duration::from_secs(2), watcher.run(cancel))
            .await
            .expect("watcher should stop after cancellation");
        assert_eq!(totals.forwarded, 1);
    }

    #[tokio::test]
    async fn test_unreadable_parent_retries_without_rereading_history() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("events.log");

        let mut watcher = watcher(&path, RecordingSink::default()).await;
        assert!(watcher.cursor().is_none());
        assert!(watcher.poll_once().await.is_err());

        std::fs::remove_file(&blocker).unwrap();
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(&path, line(1)).unwrap();

        assert_eq!(watcher.poll_once().await.unwrap(), PollReport::default());
        assert_eq!(
            watcher.cursor().map(TailCursor::position),
            Some(line(1).len() as u64)
        );

        append(&path, &line(2));
        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.forwarded, 1);
        let ids: Vec<u32> = watcher
            .sink()
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(LogEvent::event_id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_run_keeps_polling_through_read_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "").unwrap();

        let metrics = Arc::new(MetricsService::default());
        let mut watcher = watcher(&path, RecordingSink::default())
            .await
            .with_metrics(Arc::clone(&metrics));

        // Opening a directory succeeds, reading from it does not.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), "x").unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let totals = tokio::time::timeout(Duration::from_secs(2), watcher.run(cancel))
            .await
            .expect("watcher should stop after cancellation");
        assert_eq!(totals, PollReport::default());
        assert!(metrics.collect_sample().exceptions > 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_while_unpositioned() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "").unwrap();

        let mut watcher = watcher(&blocker.join("events.log"), RecordingSink::default()).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let totals = tokio::time::timeout(Duration::from_secs(2), watcher.run(cancel))
            .await
            .expect("watcher should stop after cancellation");
        assert_eq!(totals, PollReport::default());
        assert!(watcher.cursor().is_none());
    }
}
