//! Mock OpenSky identity and states endpoints for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use skytrack_core::{BoundingBoxControl, Credentials};
use skytrack_opensky::{RetryingFetcher, Sleeper, TokenManager};
use skytrack_tracker::loops::poll_loop::PollOrchestrator;
use skytrack_tracker::state::Session;

#[derive(Clone, Default)]
pub struct MockOpenSky {
    pub token_calls: Arc<AtomicUsize>,
    pub states_calls: Arc<AtomicUsize>,
    pub queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub script: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    /// When set, each states request waits for a permit before answering.
    pub gate: Option<Arc<Semaphore>>,
    /// When set, each token request waits for a permit before answering.
    pub token_gate: Option<Arc<Semaphore>>,
}

impl MockOpenSky {
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn token_gated() -> Self {
        Self {
            token_gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release_token(&self) {
        if let Some(gate) = &self.token_gate {
            gate.add_permits(1);
        }
    }

    pub fn push(&self, status: StatusCode, body: Value) {
        self.script.lock().unwrap().push_back((status, body));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn states_calls(&self) -> usize {
        self.states_calls.load(Ordering::SeqCst)
    }

    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/token", post(issue_token))
            .route("/states", get(serve_states))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        format!("http://{}", addr)
    }

    /// Wait until the states endpoint has seen `n` requests.
    pub async fn wait_for_states_calls(&self, n: usize) {
        wait_for(|| self.states_calls() >= n, "states endpoint calls").await;
    }

    /// Wait until the token endpoint has seen `n` requests.
    pub async fn wait_for_token_calls(&self, n: usize) {
        wait_for(|| self.token_calls() >= n, "token endpoint calls").await;
    }
}

async fn wait_for(done: impl Fn() -> bool, what: &str) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn issue_token(
    State(mock): State<MockOpenSky>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.token_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &mock.token_gate {
        gate.acquire().await.expect("token gate open").forget();
    }
    if form.get("client_secret").map(String::as_str) != Some("secret") {
        return (StatusCode::UNAUTHORIZED, "invalid_client").into_response();
    }
    Json(json!({"access_token": "tok", "expires_in": 1800})).into_response()
}

async fn serve_states(
    State(mock): State<MockOpenSky>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    mock.states_calls.fetch_add(1, Ordering::SeqCst);
    mock.queries.lock().unwrap().push(query);

    if let Some(gate) = &mock.gate {
        gate.acquire().await.expect("gate open").forget();
    }

    let next = mock.script.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => Json(json!({"time": 0, "states": []})).into_response(),
    }
}

pub fn states(vectors: Vec<Value>) -> Value {
    json!({"time": 1_700_000_000, "states": vectors})
}

pub fn state_vector(id: &str, lat: f64, lon: f64) -> Value {
    json!([id, "TEST1 ", "United States", 1_700_000_000, 1_700_000_000, lon, lat, 3048.0, false, 100.0, 45.0])
}

pub fn no_wait() -> Sleeper {
    Arc::new(|_| Box::pin(async {}))
}

pub async fn orchestrator(base: &str, credentials: Option<Credentials>) -> Arc<PollOrchestrator> {
    let client = reqwest::Client::new();
    let session = Arc::new(Session::new(
        TokenManager::new(client.clone(), format!("{}/token", base)),
        BoundingBoxControl::default(),
    ));
    if let Some(credentials) = credentials {
        session.login(credentials).await;
    }
    let fetcher = RetryingFetcher::new(client).with_sleeper(no_wait());
    Arc::new(PollOrchestrator::new(session, fetcher, format!("{}/states", base)))
}
