use super::coordinates::WGS84Coordinate;

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers (Haversine).
#[must_use]
pub fn distance_km(coord1: WGS84Coordinate, coord2: WGS84Coordinate) -> f64 {
  let d_lat = (coord2.lat - coord1.lat).to_radians();
  let d_lon = (coord2.lon - coord1.lon).to_radians();
  let a = f64::sin(d_lat / 2.0) * f64::sin(d_lat / 2.0)
    + f64::cos(coord1.lat.to_radians())
      * f64::cos(coord2.lat.to_radians())
      * f64::sin(d_lon / 2.0)
      * f64::sin(d_lon / 2.0);
  // Rounding can push `a` a hair outside [0, 1] for antipodal points.
  let a = a.clamp(0.0, 1.0);
  let c = 2.0 * f64::atan2(a.sqrt(), (1.0 - a).sqrt());
  EARTH_RADIUS_KM * c
}
