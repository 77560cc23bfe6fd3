//! In-memory alert history.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum alerts retained; older ones are discarded first.
pub const MAX_ALERTS: usize = 50;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

/// A raised alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub message: String,
    pub level: AlertLevel,
    pub category: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create an unresolved alert stamped with the current time.
    #[must_use]
    pub fn new(
        level: AlertLevel,
        category: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            title: title.into(),
            message: message.into(),
            level,
            category: category.into(),
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Bounded alert store.
#[derive(Debug)]
pub struct NotificationService {
    alerts: Mutex<VecDeque<Alert>>,
    enable_logging: bool,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NotificationService {
    #[must_use]
    pub fn new(enable_logging: bool) -> Self {
        Self {
            alerts: Mutex::new(VecDeque::with_capacity(MAX_ALERTS)),
            enable_logging,
        }
    }

    /// Record an alert, evicting the oldest beyond [`MAX_ALERTS`].
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn send_alert(&self, alert: Alert) {
        if self.enable_logging {
            let category = alert.category.as_str();
            match alert.level {
                AlertLevel::Info => {
                    tracing::info!(category, title = %alert.title, "{}", alert.message);
                }
                AlertLevel::Warning => {
                    tracing::warn!(category, title = %alert.title, "{}", alert.message);
                }
                AlertLevel::Error | AlertLevel::Critical => {
                    tracing::error!(
                        category,
                        level = ?alert.level,
                        title = %alert.title,
                        "{}",
                        alert.message
                    );
                }
            }
        }

        let mut alerts = self.alerts.lock().expect("Mutex poisoned");
        alerts.push_back(alert);
        while alerts.len() > MAX_ALERTS {
            alerts.pop_front();
        }
    }

    /// Alerts oldest first, optionally including resolved ones.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    pub fn alerts(&self, include_resolved: bool) -> Vec<Alert> {
        let alerts = self.alerts.lock().expect("Mutex poisoned");
        alerts
            .iter()
            .filter(|a| include_resolved || !a.resolved)
            .cloned()
            .collect()
    }

    /// Mark an alert resolved. Returns `false` if no alert has `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal `Mutex` is poisoned.
    pub fn mark_resolved(&self, id: Uuid) -> bool {
        let mut alerts = self.alerts.lock().expect("Mutex poisoned");
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.alerts(false).len()
    }
}
