//! Linear interpolation between two poll snapshots of the same flight.

use std::time::Duration;

use crate::models::Flight;

/// Position and heading to draw for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightPose {
    pub lat: f64,
    pub lon: f64,
    pub heading_deg: f64,
}

impl FlightPose {
    pub fn at_rest(flight: &Flight) -> Self {
        Self {
            lat: flight.lat,
            lon: flight.lon,
            heading_deg: flight.heading_deg,
        }
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t >= 1.0 {
        return b;
    }
    a + (b - a) * t
}

/// Fraction of the poll interval that has elapsed, clamped to `[0, 1]`.
pub fn interpolation_fraction(elapsed: Duration, interval: Duration) -> f64 {
    if interval.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / interval.as_secs_f64()).clamp(0.0, 1.0)
}

/// Pose of `current` at fraction `t` of the way from `previous`.
///
/// Heading is blended on raw degrees, so a turn across north sweeps the
/// long way round.
pub fn interpolate_flight(previous: Option<&Flight>, current: &Flight, t: f64) -> FlightPose {
    match previous {
        Some(prev) if t < 1.0 => FlightPose {
            lat: lerp(prev.lat, current.lat, t),
            lon: lerp(prev.lon, current.lon, t),
            heading_deg: lerp(prev.heading_deg, current.heading_deg, t),
        },
        _ => FlightPose::at_rest(current),
    }
}
