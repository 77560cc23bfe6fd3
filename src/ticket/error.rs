//! Ticket API error types.

use thiserror::Error;

/// Errors from the ticketing API client.
#[derive(Error, Debug)]
pub enum TicketError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Session could not be opened; no ticket was attempted.
    #[error("Session handshake failed: {0}")]
    Handshake(String),

    /// The create call returned a non-success status.
    #[error("Ticket creation failed with HTTP {status}: {body}")]
    CreateFailed { status: u16, body: String },

    /// The create call succeeded but no ticket id could be found.
    #[error("Ticket id not found in response: {0}")]
    MissingTicketId(String),

    /// A response body was not valid JSON.
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
}
