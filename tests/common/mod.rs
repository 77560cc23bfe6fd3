//! In-process fake of the ticketing REST API.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use incident_relay::config::TicketingConfig;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// One request observed by the fake server.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub endpoint: &'static str,
    pub app_token: Option<String>,
    pub authorization: Option<String>,
    pub session_token: Option<String>,
    pub body: Option<Value>,
}

/// Canned responses; change them between requests to script failures.
#[derive(Debug, Clone)]
pub struct Responses {
    pub init_status: StatusCode,
    /// `None` returns a fresh `sess-N` token per handshake.
    pub init_body: Option<Value>,
    pub create_status: StatusCode,
    /// `None` returns `{"id": N}` with an increasing N.
    pub create_body: Option<Value>,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            init_status: StatusCode::OK,
            init_body: None,
            create_status: StatusCode::CREATED,
            create_body: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    responses: Responses,
    sessions: u64,
    tickets: i64,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    inner: Arc<Mutex<Inner>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn call(endpoint: &'static str, headers: &HeaderMap, body: Option<Value>) -> Call {
    Call {
        endpoint,
        app_token: header(headers, "App-Token"),
        authorization: header(headers, "Authorization"),
        session_token: header(headers, "Session-Token"),
        body,
    }
}

async fn init_session(State(api): State<FakeApi>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let mut inner = api.inner.lock().unwrap();
    inner.calls.push(call("initSession", &headers, None));
    inner.sessions += 1;
    let body = inner
        .responses
        .init_body
        .clone()
        .unwrap_or_else(|| json!({ "session_token": format!("sess-{}", inner.sessions) }));
    (inner.responses.init_status, Json(body))
}

async fn kill_session(State(api): State<FakeApi>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let mut inner = api.inner.lock().unwrap();
    inner.calls.push(call("killSession", &headers, None));
    (StatusCode::OK, Json(json!([])))
}

async fn create_ticket(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut inner = api.inner.lock().unwrap();
    inner.calls.push(call("Ticket", &headers, Some(body)));
    inner.tickets += 1;
    let body = inner
        .responses
        .create_body
        .clone()
        .unwrap_or_else(|| json!({ "id": inner.tickets, "message": "Item successfully added" }));
    (inner.responses.create_status, Json(body))
}

impl FakeApi {
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/apirest.php/initSession", get(init_session))
            .route("/apirest.php/killSession", get(kill_session))
            .route("/apirest.php/Ticket", post(create_ticket))
            .with_state(self.clone())
    }

    pub fn set_responses(&self, responses: Responses) {
        self.inner.lock().unwrap().responses = responses;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn endpoints(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.endpoint).collect()
    }
}

/// A running fake server; stops when dropped.
pub struct FakeServer {
    pub api: FakeApi,
    pub addr: SocketAddr,
    cancel: CancellationToken,
}

impl FakeServer {
    pub async fn start() -> Self {
        let api = FakeApi::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let router = api.router();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        Self { api, addr, cancel }
    }

    #[must_use]
    pub fn config(&self) -> TicketingConfig {
        TicketingConfig {
            base_url: format!("http://{}/apirest.php/", self.addr),
            app_token: "app-token".to_string(),
            user_token: "user-token".to_string(),
            request_timeout_secs: 5,
            ..TicketingConfig::default()
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
