//! OAuth client-credentials token manager.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use skytrack_core::{Credentials, TokenStatus};

pub const OPENSKY_TOKEN_URL: &str =
    "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token";

/// Tokens are treated as expired this long before the server says so.
const TOKEN_EXPIRY_MARGIN_MS: i64 = 5_000;
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Epoch-millisecond clock.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Every variant renders with an `Auth failed:` prefix so consumers can
/// tell session-fatal failures from transient fetch errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Auth failed: client id and client secret are required")]
    MissingCredentials,
    #[error("Auth failed: token request failed: {0}")]
    Request(String),
    #[error("Auth failed: token request failed: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Auth failed: token response parse failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenState {
    pub access_token: Option<String>,
    /// Epoch milliseconds, margin already subtracted. Zero when unset.
    pub expires_at_ms: i64,
    pub status: TokenStatus,
}

impl TokenState {
    fn usable_at(&self, now_ms: i64) -> Option<&str> {
        match (&self.status, &self.access_token) {
            (TokenStatus::Ready, Some(token)) if now_ms < self.expires_at_ms => Some(token.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OAuthTokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Expiry timestamp for a token issued at `now_ms` living `expires_in_secs`.
pub fn token_expiry_ms(now_ms: i64, expires_in_secs: u64) -> i64 {
    let lifetime_ms = i64::try_from(expires_in_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    now_ms.saturating_add(lifetime_ms) - TOKEN_EXPIRY_MARGIN_MS
}

/// Acquires and caches a bearer token. Each `acquire` makes at most one
/// request; retrying is left to the caller's next poll.
pub struct TokenManager {
    client: Client,
    token_url: String,
    clock: Clock,
    state: RwLock<TokenState>,
}

impl TokenManager {
    pub fn new(client: Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            state: RwLock::new(TokenState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn state(&self) -> TokenState {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> TokenStatus {
        self.state.read().await.status
    }

    /// Cached token if it is ready and not yet expired.
    pub async fn valid_token(&self) -> Option<String> {
        let now = (self.clock)();
        let guard = self.state.read().await;
        guard.usable_at(now).map(str::to_string)
    }

    /// Forget any token and return to `Uninitialized`.
    pub async fn reset(&self) {
        *self.state.write().await = TokenState::default();
    }

    pub async fn acquire(&self, credentials: &Credentials) -> Result<String, AuthError> {
        if !credentials.is_complete() {
            self.fail().await;
            return Err(AuthError::MissingCredentials);
        }

        self.state.write().await.status = TokenStatus::Loading;

        match self.request_token(credentials).await {
            Ok(payload) => {
                let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
                let expires_at_ms = token_expiry_ms((self.clock)(), expires_in);
                let mut guard = self.state.write().await;
                *guard = TokenState {
                    access_token: Some(payload.access_token.clone()),
                    expires_at_ms,
                    status: TokenStatus::Ready,
                };
                tracing::info!("Access token acquired, valid for {}s", expires_in);
                Ok(payload.access_token)
            }
            Err(err) => {
                self.fail().await;
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }

    async fn fail(&self) {
        *self.state.write().await = TokenState {
            access_token: None,
            expires_at_ms: 0,
            status: TokenStatus::Failed,
        };
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<OAuthTokenResponse, AuthError> {
        let request = OAuthTokenRequest {
            grant_type: "client_credentials",
            client_id: credentials.client_id.trim(),
            client_secret: credentials.client_secret.trim(),
        };

        let response = self
            .client
            .post(self.token_url.as_str())
            .form(&request)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<OAuthTokenResponse>()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))
    }
}
