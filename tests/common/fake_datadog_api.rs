//! Fake Datadog Logs API server for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves `GET /api/v2/logs/events` from a queue of canned
//! responses (an empty page once the queue is drained) and records the query
//! parameters and auth headers of every request.
//!
//! # Example
//!
//! ```rust,no_run
//! let api = FakeDatadogApi::start().await.unwrap();
//! api.respond(200, dd_page(&[dd_entry("a", "2024-01-15T10:00:00Z", "info", "hi")])).await;
//!
//! // Point the source at api.base_url()
//! let url = api.base_url();
//! ```

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::fixtures::DD_EMPTY_PAGE;

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub params: HashMap<String, String>,
    pub api_key: Option<String>,
    pub application_key: Option<String>,
    pub accept: Option<String>,
}

impl SeenRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct ApiState {
    responses: VecDeque<(u16, String)>,
    requests: Vec<SeenRequest>,
    delay: Option<Duration>,
}

/// Handle to the running fake API server.
pub struct FakeDatadogApi {
    addr: SocketAddr,
    state: Arc<Mutex<ApiState>>,
}

impl FakeDatadogApi {
    /// Start the server on a random port. Returns once it is listening.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ApiState::default()));

        let app = Router::new()
            .route("/api/v2/logs/events", get(search_events))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self { addr, state })
    }

    /// Base URL for the API (e.g. `http://127.0.0.1:PORT`).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a response for the next unanswered request.
    pub async fn respond(&self, status: u16, body: impl Into<String>) {
        self.state.lock().await.responses.push_back((status, body.into()));
    }

    /// Hold every response for `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    pub async fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().await.requests.clone()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn search_events(
    State(state): State<Arc<Mutex<ApiState>>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (delay, (status, body)) = {
        let mut state = state.lock().await;
        state.requests.push(SeenRequest {
            params,
            api_key: header(&headers, "dd-api-key"),
            application_key: header(&headers, "dd-application-key"),
            accept: header(&headers, "accept"),
        });
        let response = state
            .responses
            .pop_front()
            .unwrap_or_else(|| (200, DD_EMPTY_PAGE.to_string()));
        (state.delay, response)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [("content-type", "application/json")], body)
}
