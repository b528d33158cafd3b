//! Geographic helpers: great-circle distance and the spatial grid used
//! by correlation detection.

use crate::types::Location;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default radius for "same place" checks, in meters.
pub const DEFAULT_PROXIMITY_METERS: f64 = 500.0;

/// Cells are ~0.01° of latitude/longitude (~1 km at mid latitudes).
const GRID_SCALE: f64 = 100.0;

/// Haversine great-circle distance between two locations, in meters.
pub fn distance_meters(a: &Location, b: &Location) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Whether two locations are within `max_meters` of each other.
pub fn within_distance(a: &Location, b: &Location, max_meters: f64) -> bool {
    distance_meters(a, b) <= max_meters
}

/// Bucket a coordinate into its ~0.01° grid cell.
///
/// Two positions in the same cell are treated as co-located by the
/// correlation detector.
pub fn grid_cell(lat: f64, lng: f64) -> (i64, i64) {
    ((lat * GRID_SCALE).round() as i64, (lng * GRID_SCALE).round() as i64)
}
