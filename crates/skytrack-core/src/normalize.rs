//! Normalizes raw state vectors from the states endpoint into [`Flight`]s.
//!
//! Each state vector is a positional JSON array. Only the fields needed for
//! display are read; incomplete records are dropped.
//!
//! Only a JSON `null` (or a missing slot) counts as "no value". An altitude
//! or speed of exactly 0 is a real reading and is kept, so an aircraft
//! reporting 0 m altitude stays in the output rather than being dropped as
//! if it had no altitude.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bbox::BoundingBox;
use crate::models::Flight;

const FEET_PER_METER: f64 = 1.0 / 0.3048;
const MPH_PER_MPS: f64 = 2.23694;

const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_COUNTRY: usize = 2;
const IDX_LAST_CONTACT: usize = 4;
const IDX_LON: usize = 5;
const IDX_LAT: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;

/// Body of a states response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatesResponse {
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub states: Option<Vec<Vec<Value>>>,
}

pub fn normalize(response: &StatesResponse) -> Vec<Flight> {
    match response.states.as_deref() {
        Some(states) => states.iter().filter_map(|s| normalize_state(s)).collect(),
        None => {
            tracing::warn!("States response carried no state data; treating as empty update");
            Vec::new()
        }
    }
}

/// Same as [`normalize`] but works on an untyped body, so a malformed
/// top level degrades to an empty update instead of a decode error.
pub fn normalize_value(body: &Value) -> Vec<Flight> {
    match body.get("states").and_then(Value::as_array) {
        Some(states) => states
            .iter()
            .filter_map(Value::as_array)
            .filter_map(|s| normalize_state(s))
            .collect(),
        None => {
            tracing::warn!("States response carried no state data; treating as empty update");
            Vec::new()
        }
    }
}

fn normalize_state(state: &[Value]) -> Option<Flight> {
    let icao24 = string_at(state, IDX_ICAO24)?;
    let icao24 = icao24.trim();
    if icao24.is_empty() {
        return None;
    }

    let lat = number_at(state, IDX_LAT)?;
    let lon = number_at(state, IDX_LON)?;
    let altitude_ft = number_at(state, IDX_BARO_ALTITUDE).map(|m| (m * FEET_PER_METER).round() as i64)?;
    let speed_mph = number_at(state, IDX_VELOCITY).map(|v| (v * MPH_PER_MPS).round() as i64);

    let callsign = string_at(state, IDX_CALLSIGN)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A")
        .to_string();
    let country = string_at(state, IDX_COUNTRY).unwrap_or("Unknown").to_string();

    Some(Flight {
        icao24: icao24.to_string(),
        callsign,
        country,
        lat,
        lon,
        altitude_ft,
        speed_mph,
        heading_deg: number_at(state, IDX_TRUE_TRACK).unwrap_or(0.0),
        last_contact: state.get(IDX_LAST_CONTACT).and_then(Value::as_i64),
    })
}

fn string_at(state: &[Value], idx: usize) -> Option<&str> {
    state.get(idx).and_then(Value::as_str)
}

fn number_at(state: &[Value], idx: usize) -> Option<f64> {
    state.get(idx).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Flights whose position falls inside `bbox`, in input order.
pub fn filter_in_bounds(flights: &[Flight], bbox: &BoundingBox) -> Vec<Flight> {
    flights
        .iter()
        .filter(|f| bbox.contains(f.lat, f.lon))
        .cloned()
        .collect()
}
