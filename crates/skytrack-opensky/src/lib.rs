//! OpenSky Network API client
//!
//! Token acquisition via the OAuth2 client-credentials grant and the
//! authenticated, rate-limit aware states request.

pub mod auth;
pub mod fetch;

pub use auth::{AuthError, Clock, TokenManager, TokenState, OPENSKY_TOKEN_URL};
pub use fetch::{fallback_delay, FetchError, RetryingFetcher, Sleeper, OPENSKY_DATA_URL};
