//! Authenticated GET with retry on HTTP 429.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

pub const OPENSKY_DATA_URL: &str = "https://opensky-network.org/api/states/all";

const DEFAULT_MAX_RETRIES: u32 = 3;
const FALLBACK_STEP_SECS: u64 = 8;

/// Awaitable delay used between rate-limited attempts.
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Data API failed: Status {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("Data API request failed: {0}")]
    Transport(String),
    #[error("Data API response parse failed: {0}")]
    Decode(String),
}

/// Wait before a retry when the server sends no usable `Retry-After`,
/// keyed by the retries still available. Shrinks as the budget drains:
/// 24s, 16s, 8s for the default budget of three.
pub fn fallback_delay(retries_left: u32) -> Duration {
    Duration::from_secs(FALLBACK_STEP_SECS * u64::from(retries_left))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs = raw.trim().parse::<f64>().ok()?;
    // Negative, non-finite and out-of-range values all fall back.
    Duration::try_from_secs_f64(secs).ok()
}

pub struct RetryingFetcher {
    client: Client,
    max_retries: u32,
    sleep: Sleeper,
}

impl RetryingFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            sleep: Arc::new(|delay| Box::pin(tokio::time::sleep(delay))),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sleeper(mut self, sleep: Sleeper) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// GET `url` with `query` using `token` as bearer.
    ///
    /// Returns `Ok(None)` without touching the network when there is no
    /// token. A 429 is retried up to `max_retries` times; every other
    /// non-success status fails immediately.
    pub async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<Option<Value>, FetchError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            tracing::debug!("No access token; skipping data request");
            return Ok(None);
        };

        let mut retries_left = self.max_retries;
        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<Value>()
                    .await
                    .map(Some)
                    .map_err(|e| FetchError::Decode(e.to_string()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS && retries_left > 0 {
                let attempt = self.max_retries - retries_left + 1;
                let delay = retry_after(response.headers())
                    .unwrap_or_else(|| fallback_delay(retries_left));
                tracing::warn!(
                    "Rate limited by data API; retry {}/{} in {:.1}s",
                    attempt,
                    self.max_retries,
                    delay.as_secs_f64()
                );
                (self.sleep)(delay).await;
                retries_left -= 1;
                continue;
            }

            return Err(FetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
    }
}
