use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::map::coordinates::WGS84Coordinate;

static ALL_CATEGORIES: [Category; 6] = [
  Category::Volunteer,
  Category::Education,
  Category::MentalHealth,
  Category::Community,
  Category::Donation,
  Category::Partnership,
];

/// The kind of field project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Volunteer,
  Education,
  MentalHealth,
  Community,
  Donation,
  Partnership,
}

impl Category {
  #[must_use]
  pub fn all() -> &'static [Category] {
    &ALL_CATEGORIES
  }

  #[must_use]
  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Volunteer => "volunteer",
      Category::Education => "education",
      Category::MentalHealth => "mental_health",
      Category::Community => "community",
      Category::Donation => "donation",
      Category::Partnership => "partnership",
    }
  }

  #[must_use]
  pub fn label(&self) -> &'static str {
    match self {
      Category::Volunteer => "Volunteer",
      Category::Education => "Education",
      Category::MentalHealth => "Mental Health",
      Category::Community => "Community",
      Category::Donation => "Donation",
      Category::Partnership => "Partnership",
    }
  }
}

impl Display for Category {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = String;
  fn from_str(input: &str) -> Result<Category, Self::Err> {
    let lowercase = input.trim().to_lowercase().replace([' ', '-'], "_");
    Category::all()
      .iter()
      .find(|c| c.as_str() == lowercase)
      .copied()
      .ok_or_else(|| format!("unknown category: {input}"))
  }
}

/// Lifecycle state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Pending,
  InProgress,
  Completed,
  OnHold,
  Cancelled,
}

impl Status {
  #[must_use]
  pub fn as_str(&self) -> &'static str {
    match self {
      Status::Pending => "pending",
      Status::InProgress => "in_progress",
      Status::Completed => "completed",
      Status::OnHold => "on_hold",
      Status::Cancelled => "cancelled",
    }
  }
}

/// Opaque project id. The backend sends either strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ProjectId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

impl From<String> for ProjectId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl From<ProjectId> for String {
  fn from(value: ProjectId) -> Self {
    value.0
  }
}

impl Display for ProjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
  Number(serde_json::Number),
  Text(String),
}

impl From<RawId> for ProjectId {
  fn from(raw: RawId) -> Self {
    match raw {
      RawId::Number(n) => ProjectId(n.to_string()),
      RawId::Text(s) => ProjectId(s),
    }
  }
}

/// A latitude or longitude as it arrives from the backend: decimal columns are often
/// serialized as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDegrees {
  Number(f64),
  Text(String),
}

impl RawDegrees {
  /// The value as a finite number, if it is one.
  #[must_use]
  pub fn as_f64(&self) -> Option<f64> {
    let value = match self {
      RawDegrees::Number(n) => *n,
      RawDegrees::Text(s) => s.trim().parse().ok()?,
    };
    value.is_finite().then_some(value)
  }
}

impl From<f64> for RawDegrees {
  fn from(value: f64) -> Self {
    RawDegrees::Number(value)
  }
}

/// A field project as served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: ProjectId,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub category: Category,
  pub status: Status,
  #[serde(default)]
  pub latitude: Option<RawDegrees>,
  #[serde(default)]
  pub longitude: Option<RawDegrees>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub county: Option<String>,
  #[serde(default)]
  pub subcounty: Option<String>,
  /// Kilometers from the user. Only set on near-me results.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance_km: Option<f64>,
}

impl Project {
  #[must_use]
  pub fn new(id: impl Into<ProjectId>, name: impl Into<String>, category: Category) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: None,
      category,
      status: Status::Pending,
      latitude: None,
      longitude: None,
      location: None,
      county: None,
      subcounty: None,
      distance_km: None,
    }
  }

  #[must_use]
  pub fn with_status(mut self, status: Status) -> Self {
    self.status = status;
    self
  }

  #[must_use]
  pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
    self.latitude = Some(lat.into());
    self.longitude = Some(lon.into());
    self
  }

  /// The map position. `None` unless both coordinates are finite numbers.
  #[must_use]
  pub fn position(&self) -> Option<WGS84Coordinate> {
    let lat = self.latitude.as_ref()?.as_f64()?;
    let lon = self.longitude.as_ref()?.as_f64()?;
    Some(WGS84Coordinate::new(lat, lon))
  }

  /// Human readable place, most specific first.
  #[must_use]
  pub fn place(&self) -> Option<String> {
    let parts: Vec<&str> = [&self.location, &self.subcounty, &self.county]
      .into_iter()
      .filter_map(|p| p.as_deref())
      .filter(|p| !p.trim().is_empty())
      .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
  }
}

impl Display for Project {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.place() {
      Some(place) => write!(f, "{} - {}", self.name, place),
      None => write!(f, "{}", self.name),
    }
  }
}
