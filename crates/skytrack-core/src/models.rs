//! Core data models for the flight tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// OAuth client credentials entered by the user. Held in memory only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Both fields must be present before a token request is attempted.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A tracked aircraft as reported by one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    /// ICAO 24-bit transponder address; the only key used to match
    /// a flight across snapshots.
    pub icao24: String,
    pub callsign: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: i64,
    #[serde(default)]
    pub speed_mph: Option<i64>,
    #[serde(default)]
    pub heading_deg: f64,
    /// Unix seconds of the last transponder contact
    #[serde(default)]
    pub last_contact: Option<i64>,
}

/// Lifecycle of the cached bearer token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    #[default]
    Uninitialized,
    /// Token request in flight
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenStatus::Uninitialized => "uninitialized",
            TokenStatus::Loading => "authorizing",
            TokenStatus::Ready => "authorized",
            TokenStatus::Failed => "auth failed",
        };
        f.write_str(text)
    }
}

/// The two most recent poll results, used to animate between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPair {
    pub previous: Vec<Flight>,
    pub current: Vec<Flight>,
    /// When `current` was committed; `None` until the first successful poll.
    pub updated_at: Option<DateTime<Utc>>,
}

impl SnapshotPair {
    /// Build the pair that follows `self` once `next` arrives.
    pub fn rotate(&self, next: Vec<Flight>, updated_at: DateTime<Utc>) -> Self {
        Self {
            previous: self.current.clone(),
            current: next,
            updated_at: Some(updated_at),
        }
    }

    /// Previous-snapshot flights keyed by id, restricted to ids that are
    /// still present in the current snapshot.
    pub fn previous_by_id(&self) -> HashMap<&str, &Flight> {
        let live: std::collections::HashSet<&str> =
            self.current.iter().map(|f| f.icao24.as_str()).collect();
        self.previous
            .iter()
            .filter(|f| live.contains(f.icao24.as_str()))
            .map(|f| (f.icao24.as_str(), f))
            .collect()
    }

    /// Human-readable update time, "Never" before the first poll.
    pub fn update_label(&self) -> String {
        match self.updated_at {
            Some(at) => at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string(),
            None => "Never".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) fn flight(id: &str, lat: f64, lon: f64, heading_deg: f64) -> Flight {
    Flight {
        icao24: id.to_string(),
        callsign: format!("CS{}", id.to_uppercase()),
        country: "United States".to_string(),
        lat,
        lon,
        altitude_ft: 10_000,
        speed_mph: Some(400),
        heading_deg,
        last_contact: Some(1_700_000_000),
    }
}
