//! Geographic bounding box and the user-applied box control.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundingBoxError {
    #[error("bounding box values must be finite numbers")]
    NonFinite,
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("lamin {lamin} must be less than lamax {lamax}")]
    LatitudeOrder { lamin: f64, lamax: f64 },
    #[error("lomin {lomin} must be less than lomax {lomax}")]
    LongitudeOrder { lomin: f64, lomax: f64 },
    #[error("expected `lamin,lomin,lamax,lomax`, got `{0}`")]
    Parse(String),
}

/// Lat/lon rectangle in decimal degrees. Constrains both the data query
/// and the client-side projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lomin: f64,
    pub lamax: f64,
    pub lomax: f64,
}

impl Default for BoundingBox {
    /// Florida and the southeast US coast.
    fn default() -> Self {
        Self {
            lamin: 24.5,
            lomin: -82.0,
            lamax: 31.0,
            lomax: -79.0,
        }
    }
}

impl BoundingBox {
    pub fn new(lamin: f64, lomin: f64, lamax: f64, lomax: f64) -> Result<Self, BoundingBoxError> {
        let candidate = Self {
            lamin,
            lomin,
            lamax,
            lomax,
        };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn validate(&self) -> Result<(), BoundingBoxError> {
        let values = [self.lamin, self.lomin, self.lamax, self.lomax];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        for lat in [self.lamin, self.lamax] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(BoundingBoxError::LatitudeOutOfRange(lat));
            }
        }
        for lon in [self.lomin, self.lomax] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(BoundingBoxError::LongitudeOutOfRange(lon));
            }
        }
        if self.lamin >= self.lamax {
            return Err(BoundingBoxError::LatitudeOrder {
                lamin: self.lamin,
                lamax: self.lamax,
            });
        }
        if self.lomin >= self.lomax {
            return Err(BoundingBoxError::LongitudeOrder {
                lomin: self.lomin,
                lomax: self.lomax,
            });
        }
        Ok(())
    }

    /// Inclusive on all edges.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lamin && lat <= self.lamax && lon >= self.lomin && lon <= self.lomax
    }

    /// Query parameters understood by the states endpoint.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("lamin", self.lamin.to_string()),
            ("lomin", self.lomin.to_string()),
            ("lamax", self.lamax.to_string()),
            ("lomax", self.lomax.to_string()),
        ]
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| BoundingBoxError::Parse(s.to_string()))?;
        match parts.as_slice() {
            [lamin, lomin, lamax, lomax] => Self::new(*lamin, *lomin, *lamax, *lomax),
            _ => Err(BoundingBoxError::Parse(s.to_string())),
        }
    }
}

/// The currently applied bounding box. Only the user's apply action writes
/// it; the poller and renderer read snapshots of it.
#[derive(Debug)]
pub struct BoundingBoxControl {
    tx: watch::Sender<BoundingBox>,
}

impl BoundingBoxControl {
    pub fn new(initial: BoundingBox) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> BoundingBox {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoundingBox> {
        self.tx.subscribe()
    }

    /// Replace the applied box if `candidate` is valid. Invalid edits are
    /// rejected and the previous box stays active.
    pub fn apply(&self, candidate: BoundingBox) -> Result<BoundingBox, BoundingBoxError> {
        if let Err(err) = candidate.validate() {
            tracing::warn!("Rejected bounding box edit: {}", err);
            return Err(err);
        }
        self.tx.send_replace(candidate);
        tracing::info!(
            "Bounding box applied: lat {}..{}, lon {}..{}",
            candidate.lamin,
            candidate.lamax,
            candidate.lomin,
            candidate.lomax
        );
        Ok(candidate)
    }
}

impl Default for BoundingBoxControl {
    fn default() -> Self {
        Self::new(BoundingBox::default())
    }
}
