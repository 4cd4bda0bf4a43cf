// src/utils/geo.rs
use crate::models::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Meters per degree along a meridian, on the same sphere as `haversine_distance`.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance in meters.
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let (phi1, phi2) = (a.lat.to_radians(), b.lat.to_radians());
    let (delta_phi, delta_lambda) = ((b.lat - a.lat).to_radians(), (b.lon - a.lon).to_radians());
    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Mean of the given coordinates. `None` for an empty slice.
pub fn centroid(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / n;
    Some(Coordinate::new(lat, lon))
}

/// Moves a coordinate by the given offsets in meters (north, east).
/// Only accurate over short distances; used to build fixtures and grids.
pub fn offset_meters(origin: &Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let lat = origin.lat + north_m / METERS_PER_DEGREE;
    let lon = origin.lon
        + east_m / (METERS_PER_DEGREE * origin.lat.to_radians().cos());
    Coordinate::new(lat, lon)
}
