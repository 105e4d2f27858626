use crate::Coordinate;

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers using the spherical law of cosines.
pub fn great_circle_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat_a, lon_a) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat_b, lon_b) = (b.latitude.to_radians(), b.longitude.to_radians());

    let cos_angle = lat_a.sin() * lat_b.sin() + lat_a.cos() * lat_b.cos() * (lon_b - lon_a).cos();

    // rounding can push the argument slightly outside of acos' domain
    EARTH_RADIUS_KM * cos_angle.clamp(-1.0, 1.0).acos()
}
