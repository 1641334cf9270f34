//! Search, category, near-me and selection state of the project map.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  geolocation::GeolocationError,
  map::coordinates::WGS84Coordinate,
  project::{Category, Project},
};

pub const DEFAULT_NEAR_ME_RADIUS_KM: f64 = 10.0;

static ALL_COLUMNS: [SearchColumn; 6] = [
  SearchColumn::All,
  SearchColumn::Name,
  SearchColumn::Location,
  SearchColumn::Category,
  SearchColumn::Description,
  SearchColumn::Coordinates,
];

/// Which project field a text search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchColumn {
  #[default]
  All,
  Name,
  Location,
  Category,
  Description,
  Coordinates,
}

impl SearchColumn {
  #[must_use]
  pub fn all() -> &'static [SearchColumn] {
    &ALL_COLUMNS
  }

  #[must_use]
  pub fn as_str(&self) -> &'static str {
    match self {
      SearchColumn::All => "all",
      SearchColumn::Name => "name",
      SearchColumn::Location => "location",
      SearchColumn::Category => "category",
      SearchColumn::Description => "description",
      SearchColumn::Coordinates => "coordinates",
    }
  }
}

impl Display for SearchColumn {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SearchColumn {
  type Err = String;
  fn from_str(input: &str) -> Result<SearchColumn, Self::Err> {
    let lowercase = input.trim().to_lowercase();
    SearchColumn::all()
      .iter()
      .find(|c| c.as_str() == lowercase)
      .copied()
      .ok_or_else(|| format!("unknown search column: {input}"))
  }
}

/// Errors from [`FilterState`] setters.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RadiusError {
  #[error("Invalid near-me radius {0} km, keeping {1} km.")]
  Invalid(f64, f64),
}

/// What enabling near-me mode needs from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearMe {
  /// The mode flag changed; filtering follows it.
  Updated,
  /// No user location is known yet. The mode stays off until one is provided via
  /// [`FilterState::set_user_location`].
  LocationRequired,
}

/// All user-controlled map state. Plain data plus mutators; no I/O.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterState {
  search_query: String,
  search_column: SearchColumn,
  visible_categories: BTreeMap<Category, bool>,
  near_me_mode: bool,
  near_me_radius: f64,
  user_location: Option<WGS84Coordinate>,
  #[serde(skip)]
  location_error: Option<GeolocationError>,
  #[serde(skip)]
  near_me_results: Vec<Project>,
  selected_project: Option<Project>,
}

impl Default for FilterState {
  fn default() -> Self {
    Self::new(DEFAULT_NEAR_ME_RADIUS_KM)
  }
}

impl FilterState {
  /// Everything visible, no search, near-me off with the given radius. An unusable radius
  /// falls back to [`DEFAULT_NEAR_ME_RADIUS_KM`].
  #[must_use]
  pub fn new(default_radius_km: f64) -> Self {
    let near_me_radius = if is_valid_radius(default_radius_km) {
      default_radius_km
    } else {
      warn!("Invalid default radius {default_radius_km}, using {DEFAULT_NEAR_ME_RADIUS_KM} km.");
      DEFAULT_NEAR_ME_RADIUS_KM
    };
    Self {
      search_query: String::new(),
      search_column: SearchColumn::default(),
      visible_categories: Category::all().iter().map(|c| (*c, true)).collect(),
      near_me_mode: false,
      near_me_radius,
      user_location: None,
      location_error: None,
      near_me_results: Vec::new(),
      selected_project: None,
    }
  }

  #[must_use]
  pub fn search_query(&self) -> &str {
    &self.search_query
  }

  #[must_use]
  pub fn search_column(&self) -> SearchColumn {
    self.search_column
  }

  #[must_use]
  pub fn visible_categories(&self) -> &BTreeMap<Category, bool> {
    &self.visible_categories
  }

  #[must_use]
  pub fn is_category_visible(&self, category: Category) -> bool {
    self.visible_categories.get(&category).copied().unwrap_or(false)
  }

  #[must_use]
  pub fn near_me_mode(&self) -> bool {
    self.near_me_mode
  }

  /// Near-me filtering only takes effect once a location is known.
  #[must_use]
  pub fn near_me_active(&self) -> bool {
    self.near_me_mode && self.user_location.is_some()
  }

  #[must_use]
  pub fn near_me_radius(&self) -> f64 {
    self.near_me_radius
  }

  #[must_use]
  pub fn user_location(&self) -> Option<WGS84Coordinate> {
    self.user_location
  }

  #[must_use]
  pub fn location_error(&self) -> Option<&GeolocationError> {
    self.location_error.as_ref()
  }

  #[must_use]
  pub fn near_me_results(&self) -> &[Project] {
    &self.near_me_results
  }

  #[must_use]
  pub fn selected_project(&self) -> Option<&Project> {
    self.selected_project.as_ref()
  }

  pub fn set_search_query(&mut self, query: impl Into<String>) {
    self.search_query = query.into();
  }

  pub fn set_search_column(&mut self, column: SearchColumn) {
    self.search_column = column;
  }

  /// Flips exactly one category.
  pub fn toggle_category(&mut self, category: Category) {
    let visible = self.visible_categories.entry(category).or_insert(true);
    *visible = !*visible;
    debug!("Category {category} visible: {visible}");
  }

  pub fn select_all_categories(&mut self) {
    self.visible_categories.values_mut().for_each(|v| *v = true);
  }

  pub fn deselect_all_categories(&mut self) {
    self.visible_categories.values_mut().for_each(|v| *v = false);
  }

  /// Turning near-me on without a known location does nothing but report
  /// [`NearMe::LocationRequired`]. Turning it off keeps the location.
  pub fn set_near_me_mode(&mut self, enabled: bool) -> NearMe {
    if enabled && self.user_location.is_none() {
      return NearMe::LocationRequired;
    }
    self.near_me_mode = enabled;
    NearMe::Updated
  }

  /// Accepts any finite, non-negative radius. Anything else is rejected and the previous
  /// radius stays in place.
  pub fn set_near_me_radius(&mut self, radius_km: f64) -> Result<f64, RadiusError> {
    if !is_valid_radius(radius_km) {
      return Err(RadiusError::Invalid(radius_km, self.near_me_radius));
    }
    self.near_me_radius = radius_km;
    Ok(radius_km)
  }

  /// Stores a resolved location and forgets any earlier location error.
  pub fn set_user_location(&mut self, location: WGS84Coordinate) {
    self.user_location = Some(location);
    self.location_error = None;
  }

  /// Records a failed location request. Near-me mode does not change.
  pub fn set_location_error(&mut self, error: GeolocationError) {
    self.location_error = Some(error);
  }

  /// Replaces the near-me result list. Callers compute it from the project list whenever
  /// location, radius or projects change.
  pub fn set_near_me_results(&mut self, results: Vec<Project>) {
    self.near_me_results = results;
  }

  pub fn select_project(&mut self, project: Project) {
    self.selected_project = Some(project);
  }

  pub fn clear_selection(&mut self) {
    self.selected_project = None;
  }

  /// Leaves near-me mode and forgets the location, its error and the results.
  pub fn clear_near_me(&mut self) {
    self.near_me_mode = false;
    self.near_me_results.clear();
    self.user_location = None;
    self.location_error = None;
  }
}

fn is_valid_radius(radius_km: f64) -> bool {
  radius_km.is_finite() && radius_km >= 0.0
}
