//! Pipeline counters with a bounded sample history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::alerts::{Alert, AlertLevel, NotificationService};
use crate::config::MonitoringConfig;

/// Maximum samples retained; older ones are discarded first.
pub const MAX_SAMPLES: usize = 100;

/// Length of the window over which `requests` and `exceptions` are counted.
pub const COUNTER_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub timestamp: DateTime<Utc>,
    /// Ticket creations attempted in the current window.
    pub requests: u64,
    /// Failures in the current window.
    pub exceptions: u64,
    /// Non-empty lines read since start.
    pub lines_read: u64,
    /// Lines rejected by the parser since start.
    pub lines_rejected: u64,
    /// Tickets created since start.
    pub tickets_created: u64,
}

#[derive(Debug)]
struct MetricsState {
    requests: u64,
    exceptions: u64,
    lines_read: u64,
    lines_rejected: u64,
    tickets_created: u64,
    window_started: Instant,
    history: VecDeque<MetricsSample>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            requests: 0,
            exceptions: 0,
            lines_read: 0,
            lines_rejected: 0,
            tickets_created: 0,
            window_started: Instant::now(),
            history: VecDeque::with_capacity(MAX_SAMPLES),
        }
    }
}

/// Counters shared by the watcher and the forwarder.
///
/// All state sits behind one mutex; construct it once and share it with
/// `Arc`.
#[derive(Debug)]
pub struct MetricsService {
    state: Mutex<MetricsState>,
    notifier: Option<Arc<NotificationService>>,
    exception_threshold: u64,
    window: Duration,
}

impl Default for MetricsService {
    fn default() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
            notifier: None,
            exception_threshold: MonitoringConfig::default().exception_threshold_per_minute,
            window: COUNTER_WINDOW,
        }
    }
}

impl MetricsService {
    /// Create a service that raises threshold alerts through `notifier`.
    #[must_use]
    pub fn new(config: &MonitoringConfig, notifier: Arc<NotificationService>) -> Self {
        Self {
            notifier: Some(notifier),
            exception_threshold: config.exception_threshold_per_minute,
            ..Self::default()
        }
    }

    /// Override the counter window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsState> {
        self.state.lock().expect("Mutex poisoned")
    }

    pub fn record_request(&self) {
        self.lock().requests += 1;
    }

    pub fn record_exception(&self) {
        self.lock().exceptions += 1;
    }

    pub fn record_ticket_created(&self) {
        self.lock().tickets_created += 1;
    }

    pub fn record_lines(&self, read: u64, rejected: u64) {
        let mut state = self.lock();
        state.lines_read += read;
        state.lines_rejected += rejected;
    }

    /// Take a sample, append it to the history, and raise an alert if the
    /// failure count in the current window is over the threshold. The
    /// window counters reset once the window has elapsed.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn collect_sample(&self) -> MetricsSample {
        let sample = {
            let mut state = self.lock();
            let sample = MetricsSample {
                timestamp: Utc::now(),
                requests: state.requests,
                exceptions: state.exceptions,
                lines_read: state.lines_read,
                lines_rejected: state.lines_rejected,
                tickets_created: state.tickets_created,
            };

            state.history.push_back(sample.clone());
            while state.history.len() > MAX_SAMPLES {
                state.history.pop_front();
            }

            if state.window_started.elapsed() >= self.window {
                state.requests = 0;
                state.exceptions = 0;
                state.window_started = Instant::now();
            }
            sample
        };

        tracing::debug!(
            requests = sample.requests,
            exceptions = sample.exceptions,
            tickets_created = sample.tickets_created,
            "Metrics sample collected"
        );
        self.check_thresholds(&sample);
        sample
    }

    fn check_thresholds(&self, sample: &MetricsSample) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if sample.exceptions > self.exception_threshold {
            notifier.send_alert(Alert::new(
                AlertLevel::Error,
                "Exceptions",
                "Too many failures",
                format!(
                    "Failures in window: {} (threshold: {})",
                    sample.exceptions, self.exception_threshold
                ),
            ));
        }
    }

    /// Samples oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn history(&self) -> Vec<MetricsSample> {
        self.lock().history.iter().cloned().collect()
    }

    /// Most recent sample, if any has been taken.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn current(&self) -> Option<MetricsSample> {
        self.lock().history.back().cloned()
    }
}

/// Call [`MetricsService::collect_sample`] every `interval` until `cancel`
/// fires.
pub async fn run_sampler(
    metrics: Arc<MetricsService>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Metrics sampler started");
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {
                metrics.collect_sample();
            }
        }
    }
    tracing::info!("Metrics sampler stopped");
}
