//! In-process stand-ins for the identity and states endpoints.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use skytrack_opensky::Sleeper;

pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
pub struct TokenEndpoint {
    pub calls: Arc<AtomicUsize>,
    pub forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl TokenEndpoint {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/token", post(issue_token))
            .with_state(self.clone())
    }
}

/// Accepts `client`/`secret`, rejects anything else with 401.
async fn issue_token(
    State(endpoint): State<TokenEndpoint>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    endpoint.calls.fetch_add(1, Ordering::SeqCst);
    endpoint.forms.lock().unwrap().push(form.clone());

    let valid = form.get("grant_type").map(String::as_str) == Some("client_credentials")
        && form.get("client_id").map(String::as_str) == Some("client")
        && form.get("client_secret").map(String::as_str) == Some("secret");
    if !valid {
        return (StatusCode::UNAUTHORIZED, "invalid_client").into_response();
    }

    let n = endpoint.calls();
    Json(json!({
        "access_token": format!("token-{}", n),
        "expires_in": 3600,
        "token_type": "Bearer"
    }))
    .into_response()
}

pub struct Scripted {
    pub status: StatusCode,
    pub retry_after: Option<&'static str>,
    pub body: Value,
}

impl Scripted {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            retry_after: None,
            body: json!({}),
        }
    }

    pub fn rate_limited(retry_after: Option<&'static str>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after,
            body: json!({}),
        }
    }
}

#[derive(Clone, Default)]
pub struct StatesEndpoint {
    pub script: Arc<Mutex<VecDeque<Scripted>>>,
    pub calls: Arc<AtomicUsize>,
    pub auth_headers: Arc<Mutex<Vec<String>>>,
    pub queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl StatesEndpoint {
    pub fn scripted(responses: Vec<Scripted>) -> Self {
        let endpoint = Self::default();
        endpoint.script.lock().unwrap().extend(responses);
        endpoint
    }

    pub fn push(&self, response: Scripted) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/states", get(serve_states))
            .with_state(self.clone())
    }
}

/// Pops the next scripted response; an empty script serves an empty update.
async fn serve_states(
    State(endpoint): State<StatesEndpoint>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    endpoint.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        endpoint.auth_headers.lock().unwrap().push(auth.to_string());
    }
    endpoint.queries.lock().unwrap().push(query);

    let next = endpoint.script.lock().unwrap().pop_front();
    let Some(scripted) = next else {
        return Json(json!({"time": 0, "states": []})).into_response();
    };

    let mut response = (scripted.status, Json(scripted.body)).into_response();
    if let Some(value) = scripted.retry_after {
        response
            .headers_mut()
            .insert("retry-after", value.parse().unwrap());
    }
    response
}

/// Sleeper that records requested delays and returns immediately.
pub fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let sleeper: Sleeper = Arc::new(move |delay| {
        sink.lock().unwrap().push(delay);
        Box::pin(async {})
    });
    (sleeper, log)
}

pub fn state_vector(id: &str, lat: f64, lon: f64) -> Value {
    json!([id, "TEST1 ", "United States", 1_700_000_000, 1_700_000_000, lon, lat, 3048.0, false, 100.0, 45.0])
}
