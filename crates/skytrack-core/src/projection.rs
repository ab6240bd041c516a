//! Linear lat/lon to canvas projection.
//!
//! Longitude maps to x left-to-right, latitude maps to y top-to-bottom so
//! the north edge of the box lands on row 0. No Mercator correction.

use crate::bbox::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

pub fn project(lat: f64, lon: f64, bbox: &BoundingBox, width: f64, height: f64) -> ScreenPoint {
    let lat_range = bbox.lamax - bbox.lamin;
    let lon_range = bbox.lomax - bbox.lomin;

    let normalized_lon = (lon - bbox.lomin) / lon_range;
    let normalized_lat = (lat - bbox.lamin) / lat_range;

    ScreenPoint {
        x: normalized_lon * width,
        y: height * (1.0 - normalized_lat),
    }
}
