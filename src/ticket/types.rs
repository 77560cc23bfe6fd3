//! Ticket request and response shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub i64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short-lived credential valid for one unit of work.
#[derive(Clone, PartialEq, Eq)]
pub struct TicketSession {
    token: String,
}

impl TicketSession {
    pub(crate) fn new(token: String) -> Self {
        Self { token }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for TicketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketSession")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Fields of a ticket to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub content: String,
    pub category_id: u32,
    pub recipient_user_id: u32,
    pub entity_id: u32,
    pub status: u32,
    pub priority: u32,
}

/// Wire body for the create call: `{ "input": { ... } }`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateTicketRequest<'a> {
    input: TicketInput<'a>,
}

#[derive(Debug, Serialize)]
struct TicketInput<'a> {
    name: &'a str,
    content: &'a str,
    itilcategories_id: u32,
    users_id_recipient: u32,
    entities_id: u32,
    status: u32,
    priority: u32,
}

impl<'a> From<&'a NewTicket> for CreateTicketRequest<'a> {
    fn from(ticket: &'a NewTicket) -> Self {
        Self {
            input: TicketInput {
                name: &ticket.title,
                content: &ticket.content,
                itilcategories_id: ticket.category_id,
                users_id_recipient: ticket.recipient_user_id,
                entities_id: ticket.entity_id,
                status: ticket.status,
                priority: ticket.priority,
            },
        }
    }
}

/// Find the ticket id in a create response.
///
/// Checks a top-level integer `id` first, then `data.id`.
pub(crate) fn extract_ticket_id(body: &serde_json::Value) -> Option<TicketId> {
    body.get("id")
        .and_then(serde_json::Value::as_i64)
        .or_else(|| {
            body.get("data")
                .filter(|data| data.is_object())
                .and_then(|data| data.get("id"))
                .and_then(serde_json::Value::as_i64)
        })
        .map(TicketId)
}

/// Find a non-blank `session_token` in an `initSession` response.
pub(crate) fn extract_session_token(body: &serde_json::Value) -> Option<String> {
    body.get("session_token")
        .and_then(serde_json::Value::as_str)
        .filter(|token| !token.trim().is_empty())
        .map(String::from)
}
