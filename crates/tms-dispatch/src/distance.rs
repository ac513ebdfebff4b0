//! Great-circle distance between coordinates.

use tms_core::models::route::DistanceUnit;

/// Mean earth radius (IUGG), in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Haversine distance between two `(latitude, longitude)` pairs in degrees.
pub fn geodesic_distance(from: (f64, f64), to: (f64, f64), unit: DistanceUnit) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    unit.from_meters(EARTH_RADIUS_METERS * c)
}
