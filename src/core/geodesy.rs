//! Great-circle distance on a spherical Earth

use nalgebra::Vector3;

use crate::core::constants::MEAN_EARTH_RADIUS_M;

/// Unit vector from the Earth's center through the given geodetic point
fn unit_vector(lat_deg: f64, lon_deg: f64) -> Vector3<f64> {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

/// Surface distance between two points in meters.
///
/// The central angle is taken as `atan2(|u x v|, u . v)`, which stays well
/// conditioned both for sub-meter separations and for antipodal points.
pub fn surface_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let u = unit_vector(lat1, lon1);
    let v = unit_vector(lat2, lon2);
    let angle = u.cross(&v).norm().atan2(u.dot(&v));
    MEAN_EARTH_RADIUS_M * angle
}
