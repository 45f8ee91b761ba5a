/*!
 * Analysis on top of the decoded data: trajectory statistics and
 * dead-reckoning prediction in [`trajectory`], physical-plausibility and
 * replay checks in [`anomaly`]. Nothing here feeds back into decoding or
 * the registry; hosts opt in by forwarding snapshots.
 */

pub mod anomaly;
pub mod trajectory;

/// Mean Earth radius in metres
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS-84 points, in metres (haversine).
pub fn haversine_distance(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from the first point towards the second, degrees
/// clockwise from true north in `[0, 360)`.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Destination point after travelling `distance_m` along `bearing_deg`
/// from the given point. Returns (latitude, longitude) in degrees.
pub fn project_position(
    lat: f64,
    lon: f64,
    bearing_deg: f64,
    distance_m: f64,
) -> (f64, f64) {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let lat2 = (lat1.sin() * delta.cos()
        + lat1.cos() * delta.sin() * theta.cos())
    .asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos())
            .atan2(delta.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}
