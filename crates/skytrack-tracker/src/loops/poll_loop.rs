//! Poll orchestrator.
//!
//! Each poll: sample the bounding box at tick time, reuse or acquire a
//! token, fetch states for that box, normalize, rotate snapshots. At most
//! one poll runs at a time; ticks that land while one is running are
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use skytrack_core::normalize_value;
use skytrack_opensky::RetryingFetcher;

use crate::state::session::PollPhase;
use crate::state::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another poll was in flight, no credentials are set, or the
    /// credentials changed while authenticating.
    Skipped,
    AuthFailed,
    FetchFailed,
    Updated { flights: usize },
}

pub struct PollOrchestrator {
    session: Arc<Session>,
    fetcher: RetryingFetcher,
    data_url: String,
}

/// Releases the poll slot however the poll ends.
struct InFlight<'a>(&'a Session);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.end_poll();
    }
}

impl PollOrchestrator {
    pub fn new(session: Arc<Session>, fetcher: RetryingFetcher, data_url: impl Into<String>) -> Self {
        Self {
            session,
            fetcher,
            data_url: data_url.into(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn phase(&self) -> PollPhase {
        self.session.phase()
    }

    pub async fn poll_once(&self) -> PollOutcome {
        let Some((generation, credentials)) = self.session.credentials_for_poll() else {
            tracing::debug!("No credentials; poll skipped");
            return PollOutcome::Skipped;
        };
        if !self.session.try_begin_poll() {
            tracing::debug!("Poll already in flight; tick dropped");
            return PollOutcome::Skipped;
        }
        let _slot = InFlight(&self.session);
        let bbox = self.session.bbox().current();

        let token = match self.session.tokens().valid_token().await {
            Some(token) => token,
            None => {
                self.session.set_phase(PollPhase::Authenticating);
                let acquired = self.session.tokens().acquire(&credentials).await;
                if !self.session.is_current(generation) {
                    // The next poll authenticates with the new credentials.
                    tracing::info!("Credentials changed during token request; result discarded");
                    self.session.tokens().reset().await;
                    return PollOutcome::Skipped;
                }
                match acquired {
                    Ok(token) => token,
                    Err(err) => {
                        if !self.session.record_auth_failure(&err, generation) {
                            self.session.tokens().reset().await;
                            return PollOutcome::Skipped;
                        }
                        return PollOutcome::AuthFailed;
                    }
                }
            }
        };

        self.session.set_phase(PollPhase::Fetching);
        let body = match self
            .fetcher
            .fetch(&self.data_url, &bbox.query_pairs(), Some(&token))
            .await
        {
            Ok(Some(body)) => body,
            Ok(None) => return PollOutcome::Skipped,
            Err(err) => {
                tracing::warn!("Flight fetch failed: {}", err);
                self.session.record_fetch_failure(&err);
                return PollOutcome::FetchFailed;
            }
        };

        let flights = normalize_value(&body);
        let count = flights.len();
        self.session.commit(flights);
        self.session.set_phase(PollPhase::Settled);
        tracing::debug!("Poll settled with {} flights", count);
        PollOutcome::Updated { flights: count }
    }

    /// Poll on a background task so a slow poll never holds up the caller.
    pub fn trigger(self: &Arc<Self>) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.poll_once().await;
        });
    }
}

/// Start the polling loop: one poll immediately, then one per `every`.
pub async fn run_poll_loop(
    orchestrator: Arc<PollOrchestrator>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Poll loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                orchestrator.trigger();
            }
        }
    }
}
