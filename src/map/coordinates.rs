use serde::{Deserialize, Serialize};

/// The standard WGS84 coordinate system.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct WGS84Coordinate {
  #[serde(alias = "latitude")]
  pub lat: f64,
  #[serde(alias = "longitude")]
  pub lon: f64,
}

impl WGS84Coordinate {
  #[must_use]
  pub fn new(lat: f64, lon: f64) -> Self {
    Self { lat, lon }
  }

  /// Both components are finite numbers.
  #[must_use]
  pub fn is_finite(&self) -> bool {
    self.lat.is_finite() && self.lon.is_finite()
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
  }

  /// Exact equality comparison using bit representation
  #[must_use]
  pub fn exact_eq(&self, other: &Self) -> bool {
    self.lat.to_bits() == other.lat.to_bits() && self.lon.to_bits() == other.lon.to_bits()
  }
}

impl std::fmt::Display for WGS84Coordinate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:.4}°, {:.4}°", self.lat, self.lon)
  }
}

impl std::str::FromStr for WGS84Coordinate {
  type Err = String;

  /// Parses "lat,lon" or "lat lon" in decimal degrees.
  fn from_str(input: &str) -> Result<Self, Self::Err> {
    let mut parts = input
      .split(|c: char| c == ',' || c.is_whitespace())
      .filter(|p| !p.is_empty());
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
      return Err(format!("expected 'lat,lon', got '{input}'"));
    };
    let lat: f64 = lat.parse().map_err(|e| format!("bad latitude '{lat}': {e}"))?;
    let lon: f64 = lon.parse().map_err(|e| format!("bad longitude '{lon}': {e}"))?;
    let coord = Self::new(lat, lon);
    if coord.is_finite() && coord.is_valid() {
      Ok(coord)
    } else {
      Err(format!("coordinate out of range: '{input}'"))
    }
  }
}

/// An axis aligned box in degrees. Starts out invalid and grows with every added coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub min_lat: f64,
  pub min_lon: f64,
  pub max_lat: f64,
  pub max_lon: f64,
}

impl Default for BoundingBox {
  fn default() -> Self {
    Self::new()
  }
}

impl BoundingBox {
  #[must_use]
  pub fn new() -> Self {
    Self::get_invalid()
  }

  #[must_use]
  pub fn get_invalid() -> Self {
    Self {
      min_lat: f64::MAX,
      min_lon: f64::MAX,
      max_lat: f64::MIN,
      max_lon: f64::MIN,
    }
  }

  pub fn from_iterator<I: IntoIterator<Item = WGS84Coordinate>>(positions: I) -> Self {
    let mut bb = Self::get_invalid();
    positions
      .into_iter()
      .for_each(|pos| bb.add_coordinate(pos));
    bb
  }

  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.min_lat <= self.max_lat && self.min_lon <= self.max_lon
  }

  pub fn add_coordinate(&mut self, coord: WGS84Coordinate) {
    self.min_lat = self.min_lat.min(coord.lat);
    self.min_lon = self.min_lon.min(coord.lon);
    self.max_lat = self.max_lat.max(coord.lat);
    self.max_lon = self.max_lon.max(coord.lon);
  }

  /// Pads every side by `frame` degrees.
  pub fn frame(&mut self, frame: f64) {
    self.min_lat -= frame;
    self.min_lon -= frame;
    self.max_lat += frame;
    self.max_lon += frame;
  }

  #[must_use]
  pub fn width(&self) -> f64 {
    self.max_lon - self.min_lon
  }

  #[must_use]
  pub fn height(&self) -> f64 {
    self.max_lat - self.min_lat
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  #[test]
  fn parse_coordinate_input() {
    let coord: WGS84Coordinate = "-1.2921, 36.8219".parse().unwrap();
    assert_approx_eq!(coord.lat, -1.2921);
    assert_approx_eq!(coord.lon, 36.8219);

    let coord: WGS84Coordinate = "-1.2921 36.8219".parse().unwrap();
    assert_approx_eq!(coord.lon, 36.8219);

    assert!("invalid".parse::<WGS84Coordinate>().is_err());
    assert!("95.0, 10.0".parse::<WGS84Coordinate>().is_err());
    assert!("1.0, 2.0, 3.0".parse::<WGS84Coordinate>().is_err());
    assert!("NaN, 2.0".parse::<WGS84Coordinate>().is_err());
  }

  #[test]
  fn empty_box_is_invalid() {
    assert!(!BoundingBox::new().is_valid());
    assert!(!BoundingBox::from_iterator(Vec::new()).is_valid());
  }

  #[test]
  fn box_grows_and_frames() {
    let mut bb = BoundingBox::from_iterator([
      WGS84Coordinate::new(-1.0, 36.0),
      WGS84Coordinate::new(0.5, 37.5),
      WGS84Coordinate::new(-0.2, 36.4),
    ]);
    assert!(bb.is_valid());
    assert_approx_eq!(bb.height(), 1.5);
    assert_approx_eq!(bb.width(), 1.5);
    assert_approx_eq!(bb.min_lat, -1.0);
    assert_approx_eq!(bb.max_lon, 37.5);

    bb.frame(0.01);
    assert_approx_eq!(bb.min_lat, -1.01);
    assert_approx_eq!(bb.min_lon, 35.99);
    assert_approx_eq!(bb.max_lat, 0.51);
    assert_approx_eq!(bb.max_lon, 37.51);
    assert_approx_eq!(bb.height(), 1.52);
  }
}
