//! The session context: credentials, token, bounding box, snapshots and
//! the user-visible error.
//!
//! Writers are fixed: the poll orchestrator writes token, snapshot, phase
//! and error state; the `bbox` control writes the box; `login`/`dismiss`
//! write credentials. The render loop only reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use skytrack_core::{
    filter_in_bounds, BoundingBox, BoundingBoxControl, Credentials, Flight, SnapshotPair, TokenStatus,
};
use skytrack_opensky::{AuthError, FetchError, TokenManager};

/// Poll state machine phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    #[default]
    Idle,
    Authenticating,
    Fetching,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum SessionError {
    /// Persists until credentials are re-entered or dismissed.
    #[error("{0}")]
    Auth(String),
    /// Cleared by the next successful poll.
    #[error("{0}")]
    Fetch(String),
}

impl SessionError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub token_status: TokenStatus,
    pub authenticated: bool,
    pub phase: PollPhase,
    pub polling: bool,
    pub flights_in_view: usize,
    pub last_update: String,
    pub bbox: BoundingBox,
    pub error: Option<SessionError>,
}

impl SessionStatus {
    /// One-line summary shown above the canvas.
    pub fn caption(&self) -> String {
        let mut caption = format!(
            "Flights tracked: {} | Last update: {} | {}",
            self.flights_in_view, self.last_update, self.token_status
        );
        if !self.authenticated {
            caption.push_str(" | Enter credentials: login <client_id> <client_secret>");
        }
        if self.polling {
            caption.push_str(" | fetching...");
        }
        if let Some(err) = &self.error {
            caption.push_str(" | ");
            caption.push_str(&err.to_string());
        }
        caption
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Session {
    credentials: Mutex<Option<Credentials>>,
    /// Bumped whenever credentials are entered or cleared by the user.
    generation: AtomicU64,
    tokens: TokenManager,
    bbox: BoundingBoxControl,
    snapshots: watch::Sender<Arc<SnapshotPair>>,
    error: Mutex<Option<SessionError>>,
    phase: Mutex<PollPhase>,
    in_flight: AtomicBool,
}

impl Session {
    pub fn new(tokens: TokenManager, bbox: BoundingBoxControl) -> Self {
        let (snapshots, _rx) = watch::channel(Arc::new(SnapshotPair::default()));
        Self {
            credentials: Mutex::new(None),
            generation: AtomicU64::new(0),
            tokens,
            bbox,
            snapshots,
            error: Mutex::new(None),
            phase: Mutex::new(PollPhase::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn bbox(&self) -> &BoundingBoxControl {
        &self.bbox
    }

    pub fn credentials(&self) -> Option<Credentials> {
        lock(&self.credentials).clone()
    }

    pub fn error(&self) -> Option<SessionError> {
        lock(&self.error).clone()
    }

    pub fn phase(&self) -> PollPhase {
        *lock(&self.phase)
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Latest committed snapshot pair.
    pub fn snapshot(&self) -> Arc<SnapshotPair> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot rotation.
    pub fn snapshots(&self) -> watch::Receiver<Arc<SnapshotPair>> {
        self.snapshots.subscribe()
    }

    /// Store fresh credentials and start over with no token.
    pub async fn login(&self, credentials: Credentials) {
        self.replace_credentials(Some(credentials));
        *lock(&self.error) = None;
        self.tokens.reset().await;
        tracing::info!("Credentials entered");
    }

    /// Acknowledge the current error and return to the unauthenticated state.
    pub async fn dismiss_error(&self) {
        *lock(&self.error) = None;
        self.replace_credentials(None);
        self.tokens.reset().await;
        tracing::info!("Session cleared; waiting for credentials");
    }

    pub async fn status(&self) -> SessionStatus {
        let token_status = self.tokens.status().await;
        let snapshot = self.snapshot();
        let bbox = self.bbox.current();
        SessionStatus {
            token_status,
            authenticated: lock(&self.credentials).is_some(),
            phase: self.phase(),
            polling: self.is_polling(),
            flights_in_view: filter_in_bounds(&snapshot.current, &bbox).len(),
            last_update: snapshot.update_label(),
            bbox,
            error: self.error(),
        }
    }

    fn replace_credentials(&self, credentials: Option<Credentials>) {
        let mut slot = lock(&self.credentials);
        *slot = credentials;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Credentials for a poll, tagged with the generation they belong to.
    pub(crate) fn credentials_for_poll(&self) -> Option<(u64, Credentials)> {
        let slot = lock(&self.credentials);
        let credentials = slot.clone()?;
        Some((self.generation.load(Ordering::Acquire), credentials))
    }

    /// False once the user has entered or cleared credentials since
    /// `generation` was handed out.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Claim the single poll slot. False if a poll is already running.
    pub(crate) fn try_begin_poll(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_poll(&self) {
        self.set_phase(PollPhase::Idle);
        self.in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn set_phase(&self, phase: PollPhase) {
        *lock(&self.phase) = phase;
    }

    /// Rotate snapshots: current becomes previous, `flights` becomes current.
    pub(crate) fn commit(&self, flights: Vec<Flight>) {
        let next = {
            let current = self.snapshots.borrow();
            Arc::new(current.rotate(flights, Utc::now()))
        };
        self.snapshots.send_replace(next);

        let mut error = lock(&self.error);
        if matches!(*error, Some(SessionError::Fetch(_))) {
            *error = None;
        }
    }

    /// Authentication failures end the session until new credentials
    /// arrive. A failure for credentials the user has since replaced is
    /// ignored; returns whether it was recorded.
    pub(crate) fn record_auth_failure(&self, err: &AuthError, generation: u64) -> bool {
        let mut credentials = lock(&self.credentials);
        if !self.is_current(generation) {
            return false;
        }
        *credentials = None;
        *lock(&self.error) = Some(SessionError::Auth(err.to_string()));
        true
    }

    pub(crate) fn record_fetch_failure(&self, err: &FetchError) {
        let mut error = lock(&self.error);
        if error.as_ref().map_or(false, SessionError::is_auth) {
            return;
        }
        *error = Some(SessionError::Fetch(err.to_string()));
    }
}
