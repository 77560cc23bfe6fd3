//! Session-based client for the remote ticketing API.
//!
//! Every ticket is created inside its own session:
//! `initSession` → `POST Ticket` → `killSession`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use super::error::TicketError;
use super::types::{
    extract_session_token, extract_ticket_id, CreateTicketRequest, NewTicket, TicketId,
    TicketSession,
};
use crate::config::TicketingConfig;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can turn a [`NewTicket`] into a remote ticket.
#[async_trait]
pub trait TicketApi: Send + Sync {
    /// Create one ticket and return its id.
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketId, TicketError>;
}

/// Build an HTTP client with proper timeout configuration.
fn build_http_client(request_timeout: Duration) -> Result<Client, TicketError> {
    Ok(Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()?)
}

/// Client for a GLPI-style REST API.
///
/// Holds no session state between calls.
#[derive(Debug, Clone)]
pub struct TicketClient {
    http: Client,
    base_url: String,
    app_token: String,
    user_token: String,
}

impl TicketClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::InvalidBaseUrl` if the base URL does not parse,
    /// or `TicketError::Http` if the HTTP client cannot be built.
    pub fn new(config: &TicketingConfig) -> Result<Self, TicketError> {
        url::Url::parse(&config.base_url).map_err(|source| TicketError::InvalidBaseUrl {
            url: config.base_url.clone(),
            source,
        })?;

        Ok(Self {
            http: build_http_client(config.request_timeout())?,
            base_url: config.base_url.clone(),
            app_token: config.app_token.clone(),
            user_token: config.user_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Open a session with the application and user tokens.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::Handshake` on a non-success status or when the
    /// body carries no usable `session_token`.
    pub async fn init_session(&self) -> Result<TicketSession, TicketError> {
        let url = self.endpoint("initSession");
        tracing::info!(url = %url, "initSession ->");

        let response = self
            .http
            .get(&url)
            .header("App-Token", &self.app_token)
            .header("Authorization", format!("user_token {}", self.user_token))
            .send()
            .await?;

        let (status, text) = read_body(response).await?;
        tracing::info!(status, "initSession <-");
        tracing::debug!(body = %text, "initSession response body");

        if !(200..300).contains(&status) {
            return Err(TicketError::Handshake(format!("HTTP {status}: {text}")));
        }

        let body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TicketError::Handshake(format!("invalid JSON ({e}): {text}")))?;

        extract_session_token(&body)
            .map(TicketSession::new)
            .ok_or_else(|| TicketError::Handshake(format!("session_token missing or empty: {text}")))
    }

    /// Close a session. Failures are logged and otherwise ignored.
    pub async fn kill_session(&self, session: &TicketSession) {
        let url = self.endpoint("killSession");
        tracing::info!(url = %url, "killSession ->");

        let result = self
            .http
            .get(&url)
            .header("App-Token", &self.app_token)
            .header("Session-Token", session.token())
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    tracing::info!(status, "killSession <-");
                } else {
                    tracing::warn!(status, "killSession returned non-success status");
                }
            }
            Err(e) => tracing::warn!(error = %e, "killSession failed"),
        }
    }

    /// Run `work` inside a fresh session, releasing it afterwards whatever
    /// `work` returns.
    ///
    /// # Errors
    ///
    /// Returns the handshake error without running `work`, or whatever
    /// `work` returns.
    pub async fn with_session<T, F, Fut>(&self, work: F) -> Result<T, TicketError>
    where
        F: FnOnce(TicketSession) -> Fut + Send,
        Fut: Future<Output = Result<T, TicketError>> + Send,
    {
        let session = self.init_session().await?;
        let result = work(session.clone()).await;
        self.kill_session(&session).await;
        result
    }

    async fn post_ticket(
        &self,
        session: TicketSession,
        ticket: &NewTicket,
    ) -> Result<TicketId, TicketError> {
        let url = self.endpoint("Ticket");
        let payload = CreateTicketRequest::from(ticket);
        tracing::info!(url = %url, title = %ticket.title, "create Ticket ->");
        tracing::debug!(
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "create Ticket payload"
        );

        let response = self
            .http
            .post(&url)
            .header("App-Token", &self.app_token)
            .header("Session-Token", session.token())
            .json(&payload)
            .send()
            .await?;

        let (status, text) = read_body(response).await?;
        tracing::info!(status, "create Ticket <-");
        tracing::debug!(body = %text, "create Ticket response body");

        if !(200..300).contains(&status) {
            return Err(TicketError::CreateFailed { status, body: text });
        }

        let body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TicketError::InvalidResponse(format!("{e}: {text}")))?;

        extract_ticket_id(&body).ok_or(TicketError::MissingTicketId(text))
    }
}

async fn read_body(response: Response) -> Result<(u16, String), TicketError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    Ok((status, text))
}

#[async_trait]
impl TicketApi for TicketClient {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketId, TicketError> {
        self.with_session(|session| self.post_ticket(session, ticket))
            .await
    }
}
