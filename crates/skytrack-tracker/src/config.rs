//! Tracker configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use skytrack_core::{BoundingBox, BoundingBoxError, Credentials};
use skytrack_opensky::{OPENSKY_DATA_URL, OPENSKY_TOKEN_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SKYTRACK_BBOX is invalid: {0}")]
    BoundingBox(#[from] BoundingBoxError),
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token_url: String,
    pub data_url: String,
    pub credentials: Option<Credentials>,
    pub poll_interval: Duration,
    pub frame_interval: Duration,
    pub max_retries: u32,
    pub bbox: BoundingBox,
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_url: OPENSKY_TOKEN_URL.to_string(),
            data_url: OPENSKY_DATA_URL.to_string(),
            credentials: None,
            poll_interval: Duration::from_millis(15_000),
            frame_interval: Duration::from_millis(100),
            max_retries: 3,
            bbox: BoundingBox::default(),
            canvas_width: 100,
            canvas_height: 30,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall
    /// back to defaults; an unparseable bounding box is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let credentials = match (lookup("SKYTRACK_CLIENT_ID"), lookup("SKYTRACK_CLIENT_SECRET")) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            _ => None,
        };
        let bbox = match lookup("SKYTRACK_BBOX") {
            Some(raw) if !raw.trim().is_empty() => BoundingBox::from_str(&raw)?,
            _ => defaults.bbox,
        };

        let config = Self {
            token_url: lookup("SKYTRACK_TOKEN_URL").unwrap_or(defaults.token_url),
            data_url: lookup("SKYTRACK_DATA_URL").unwrap_or(defaults.data_url),
            credentials,
            poll_interval: parsed("SKYTRACK_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            frame_interval: parsed("SKYTRACK_FRAME_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            max_retries: parsed("SKYTRACK_MAX_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_retries),
            bbox,
            canvas_width: parsed("SKYTRACK_CANVAS_WIDTH")
                .map(|n| n as usize)
                .unwrap_or(defaults.canvas_width),
            canvas_height: parsed("SKYTRACK_CANVAS_HEIGHT")
                .map(|n| n as usize)
                .unwrap_or(defaults.canvas_height),
            http_timeout: parsed("SKYTRACK_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                name: "poll interval",
            });
        }
        if self.frame_interval.is_zero() {
            return Err(ConfigError::Zero {
                name: "frame interval",
            });
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Zero {
                name: "canvas size",
            });
        }
        self.bbox.validate()?;
        Ok(())
    }
}
