//! In-process metrics and alerting.
//!
//! Both services are constructed once at startup and shared with `Arc`.

mod alerts;
mod metrics;

pub use alerts::{Alert, AlertLevel, NotificationService, MAX_ALERTS};
pub use metrics::{run_sampler, MetricsSample, MetricsService, COUNTER_WINDOW, MAX_SAMPLES};
