//! Maps parsed log events onto tickets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TicketDefaults;
use crate::monitor::MetricsService;
use crate::ticket::{NewTicket, TicketApi, TicketError, TicketId};
use crate::watcher::{EventSink, LogEvent};

/// Errors from forwarding an event.
#[derive(thiserror::Error, Debug)]
pub enum ForwardError {
    #[error("Ticket creation failed: {0}")]
    Ticket(#[from] TicketError),
}

/// Title used for the ticket raised from `event`.
#[must_use]
pub fn ticket_title(event: &LogEvent) -> String {
    format!("{} (EventId={})", event.source(), event.event_id())
}

/// Multi-line ticket body describing `event`.
#[must_use]
pub fn ticket_content(event: &LogEvent) -> String {
    format!(
        "Time: {}\nSource: {}\nEventId: {}\nMessage: {}\nRaw: {}",
        event.timestamp().format("%Y-%m-%d %H:%M:%S"),
        event.source(),
        event.event_id(),
        event.message(),
        event.raw_line(),
    )
}

/// Creates one ticket per event, with category, recipient, entity,
/// status and priority taken from configuration.
pub struct IncidentForwarder<T> {
    api: T,
    defaults: TicketDefaults,
    metrics: Option<Arc<MetricsService>>,
}

impl<T: TicketApi> IncidentForwarder<T> {
    #[must_use]
    pub fn new(api: T, defaults: TicketDefaults) -> Self {
        Self {
            api,
            defaults,
            metrics: None,
        }
    }

    /// Count each ticket attempt and failure in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsService>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn api(&self) -> &T {
        &self.api
    }

    /// Build the ticket for `event` without sending it.
    #[must_use]
    pub fn ticket_for(&self, event: &LogEvent) -> NewTicket {
        NewTicket {
            title: ticket_title(event),
            content: ticket_content(event),
            category_id: self.defaults.category_id,
            recipient_user_id: self.defaults.recipient_user_id,
            entity_id: self.defaults.entity_id,
            status: self.defaults.status,
            priority: self.defaults.priority,
        }
    }

    /// Create a ticket for `event`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Ticket` if the ticket API call fails. The
    /// event is not retried.
    pub async fn forward(&self, event: &LogEvent) -> Result<TicketId, ForwardError> {
        let ticket = self.ticket_for(event);
        tracing::info!(title = %ticket.title, "Creating ticket from log event");

        if let Some(metrics) = &self.metrics {
            metrics.record_request();
        }

        match self.api.create_ticket(&ticket).await {
            Ok(id) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_ticket_created();
                }
                tracing::info!(ticket_id = %id, title = %ticket.title, "Ticket created");
                Ok(id)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_exception();
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<T: TicketApi> EventSink for IncidentForwarder<T> {
    type Error = ForwardError;

    async fn handle(&self, event: &LogEvent) -> Result<(), ForwardError> {
        self.forward(event).await.map(|_| ())
    }
}
