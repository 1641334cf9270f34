//! Derivation of the rendered marker set from projects and filter state.

use std::collections::BTreeMap;

use egui::Color32;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{coordinates::WGS84Coordinate, distance::distance_km};
use crate::{
  filter::FilterState,
  project::{Category, Project, ProjectId, Status},
};

pub const MARKER_RADIUS: f32 = 8.;
pub const EMPHASIZED_MARKER_RADIUS: f32 = 12.;

/// Marker glyph, one per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconKind {
  Circle,
  Square,
  Heart,
  House,
  Diamond,
  Triangle,
}

impl From<Category> for IconKind {
  fn from(category: Category) -> Self {
    match category {
      Category::Volunteer => IconKind::Circle,
      Category::Education => IconKind::Square,
      Category::MentalHealth => IconKind::Heart,
      Category::Community => IconKind::House,
      Category::Donation => IconKind::Diamond,
      Category::Partnership => IconKind::Triangle,
    }
  }
}

/// Marker fill color for a project status.
#[must_use]
pub fn status_color(status: Status) -> Color32 {
  match status {
    Status::Pending => Color32::from_rgb(245, 158, 11),
    Status::InProgress => Color32::from_rgb(59, 130, 246),
    Status::Completed => Color32::from_rgb(16, 185, 129),
    Status::OnHold => Color32::from_rgb(107, 114, 128),
    Status::Cancelled => Color32::from_rgb(239, 68, 68),
  }
}

/// One drawable project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
  pub id: ProjectId,
  pub name: String,
  pub position: WGS84Coordinate,
  pub icon: IconKind,
  pub color: Color32,
  pub radius: f32,
  /// Drawn with an outline ring; set for text search hits.
  pub emphasized: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance_km: Option<f64>,
}

impl Marker {
  fn new(project: &Project, position: WGS84Coordinate, emphasized: bool) -> Self {
    Self {
      id: project.id.clone(),
      name: project.name.clone(),
      position,
      icon: project.category.into(),
      color: status_color(project.status),
      radius: if emphasized {
        EMPHASIZED_MARKER_RADIUS
      } else {
        MARKER_RADIUS
      },
      emphasized,
      distance_km: project.distance_km,
    }
  }
}

/// Which list the markers were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSource {
  NearMe,
  Search,
  All,
}

/// Everything the derivation reads. Borrowed, so a derivation never outlives the state it
/// was computed from.
#[derive(Debug, Clone, Copy)]
pub struct MapSnapshot<'a> {
  pub projects: &'a [Project],
  pub search_results: &'a [Project],
  pub filter: &'a FilterState,
}

impl<'a> MapSnapshot<'a> {
  /// The one list markers come from: near-me results, then search results, then everything.
  #[must_use]
  pub fn source(&self) -> (MarkerSource, &'a [Project]) {
    let near_me = self.filter.near_me_results();
    if self.filter.near_me_active() && !near_me.is_empty() {
      (MarkerSource::NearMe, near_me)
    } else if !self.search_results.is_empty() {
      (MarkerSource::Search, self.search_results)
    } else {
      (MarkerSource::All, self.projects)
    }
  }
}

/// The derived marker set plus legend counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSet {
  pub source: MarkerSource,
  pub markers: Vec<Marker>,
  /// Markers per category, every category present.
  pub counts: BTreeMap<Category, usize>,
  /// Sum of `counts` over visible categories.
  pub visible_total: usize,
}

/// One row of the category legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
  pub category: Category,
  pub label: String,
  pub icon: IconKind,
  pub count: usize,
  pub visible: bool,
}

impl MarkerSet {
  /// Legend rows in category order, hidden categories included.
  #[must_use]
  pub fn legend(&self, filter: &FilterState) -> Vec<LegendEntry> {
    Category::all()
      .iter()
      .map(|&category| LegendEntry {
        category,
        label: category.label().to_string(),
        icon: category.into(),
        count: self.counts.get(&category).copied().unwrap_or_default(),
        visible: filter.is_category_visible(category),
      })
      .collect()
  }
}

/// Projects within `radius_km` of `origin`, nearest first, with their distance attached.
/// Projects without a position are dropped; equal distances keep their input order.
#[must_use]
pub fn within_radius(projects: &[Project], origin: WGS84Coordinate, radius_km: f64) -> Vec<Project> {
  projects
    .iter()
    .filter_map(|project| {
      let distance = distance_km(origin, project.position()?);
      (distance <= radius_km).then(|| Project {
        distance_km: Some(distance),
        ..project.clone()
      })
    })
    .sorted_by(|a, b| {
      a.distance_km
        .unwrap_or_default()
        .total_cmp(&b.distance_km.unwrap_or_default())
    })
    .collect()
}

/// Runs the full derivation for one snapshot.
#[must_use]
pub fn derive_markers(snapshot: &MapSnapshot<'_>) -> MarkerSet {
  let (source, projects) = snapshot.source();
  let filter = snapshot.filter;

  let mut candidates: Vec<(Project, WGS84Coordinate)> = projects
    .iter()
    .filter(|project| filter.is_category_visible(project.category))
    .filter_map(|project| Some((project.clone(), project.position()?)))
    .collect();

  if filter.near_me_active()
    && let Some(origin) = filter.user_location()
  {
    let radius = filter.near_me_radius();
    candidates = candidates
      .into_iter()
      .filter_map(|(mut project, position)| {
        let distance = distance_km(origin, position);
        project.distance_km = Some(distance);
        (distance <= radius).then_some((project, position))
      })
      .sorted_by(|(a, _), (b, _)| {
        a.distance_km
          .unwrap_or_default()
          .total_cmp(&b.distance_km.unwrap_or_default())
      })
      .collect();
  }

  let emphasized = source == MarkerSource::Search;
  let markers: Vec<Marker> = candidates
    .iter()
    .map(|(project, position)| Marker::new(project, *position, emphasized))
    .collect();

  let mut counts: BTreeMap<Category, usize> = Category::all().iter().map(|c| (*c, 0)).collect();
  for (project, _) in &candidates {
    *counts.entry(project.category).or_default() += 1;
  }
  let visible_total = counts
    .iter()
    .filter(|(category, _)| filter.is_category_visible(**category))
    .map(|(_, count)| count)
    .sum();

  MarkerSet {
    source,
    markers,
    counts,
    visible_total,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::map::coordinates::WGS84Coordinate;
  use assert_approx_eq::assert_approx_eq;
  use rstest::rstest;

  /// 1° of latitude along a meridian, in km.
  const KM_PER_DEGREE: f64 = std::f64::consts::PI * 6371.0 / 180.0;

  const USER: WGS84Coordinate = WGS84Coordinate { lat: 0.0, lon: 36.0 };

  /// A project `km` kilometers due north of [`USER`].
  fn north_of_user(id: &str, km: f64, category: Category) -> Project {
    Project::new(id, id, category).with_position(USER.lat + km / KM_PER_DEGREE, USER.lon)
  }

  fn near_me_filter(radius: f64, projects: &[Project]) -> FilterState {
    let mut filter = FilterState::default();
    filter.set_user_location(USER);
    filter.set_near_me_mode(true);
    filter.set_near_me_radius(radius).unwrap();
    filter.set_near_me_results(within_radius(projects, USER, radius));
    filter
  }

  fn ids(set: &MarkerSet) -> Vec<&str> {
    set.markers.iter().map(|m| m.id.as_str()).collect()
  }

  #[test]
  fn near_me_results_beat_search_beats_everything() {
    let all = vec![
      north_of_user("a", 1.0, Category::Community),
      north_of_user("b", 50.0, Category::Community),
    ];
    let search = vec![north_of_user("b", 50.0, Category::Community)];
    let filter = near_me_filter(10.0, &all);
    assert_eq!(filter.near_me_results().len(), 1);

    let snapshot = MapSnapshot {
      projects: &all,
      search_results: &search,
      filter: &filter,
    };
    let set = derive_markers(&snapshot);
    assert_eq!(set.source, MarkerSource::NearMe);
    assert_eq!(ids(&set), vec!["a"]);

    let plain = FilterState::default();
    let snapshot = MapSnapshot {
      projects: &all,
      search_results: &search,
      filter: &plain,
    };
    let set = derive_markers(&snapshot);
    assert_eq!(set.source, MarkerSource::Search);
    assert_eq!(ids(&set), vec!["b"]);
    assert!(set.markers.iter().all(|m| m.emphasized));

    let snapshot = MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &plain,
    };
    let set = derive_markers(&snapshot);
    assert_eq!(set.source, MarkerSource::All);
    assert_eq!(ids(&set), vec!["a", "b"]);
    assert!(set.markers.iter().all(|m| !m.emphasized));
  }

  #[test]
  fn near_me_mode_without_location_does_not_filter() {
    let all = vec![north_of_user("far", 500.0, Category::Donation)];
    let mut filter = FilterState::default();
    filter.set_near_me_mode(true);
    let snapshot = MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &filter,
    };
    let set = derive_markers(&snapshot);
    assert_eq!(set.source, MarkerSource::All);
    assert_eq!(ids(&set), vec!["far"]);
    assert!(set.markers[0].distance_km.is_none());
  }

  #[test]
  fn near_me_scenario_zero_five_twelve() {
    let all = vec![
      north_of_user("twelve", 12.0, Category::Education),
      north_of_user("five", 5.0, Category::Volunteer),
      north_of_user("zero", 0.0, Category::Community),
    ];
    let filter = near_me_filter(10.0, &all);
    let results: Vec<&str> = filter.near_me_results().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(results, vec!["zero", "five"]);

    let set = derive_markers(&MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &filter,
    });
    assert_eq!(ids(&set), vec!["zero", "five"]);
    assert_approx_eq!(set.markers[0].distance_km.unwrap(), 0.0, 1e-9);
    assert_approx_eq!(set.markers[1].distance_km.unwrap(), 5.0, 1e-6);
  }

  #[test]
  fn radius_boundary_is_inclusive() {
    let at_edge = north_of_user("edge", 10.0, Category::Community);
    let beyond = north_of_user("beyond", 10.001, Category::Community);
    let radius = distance_km(USER, at_edge.position().unwrap());

    let results = within_radius(&[at_edge, beyond], USER, radius);
    let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["edge"]);
  }

  #[test]
  fn zero_radius_keeps_coincident_points_only() {
    let all = vec![
      north_of_user("here", 0.0, Category::Community),
      north_of_user("close", 0.01, Category::Community),
    ];
    let results = within_radius(&all, USER, 0.0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id.as_str(), "here");
  }

  #[test]
  fn equal_distances_keep_input_order() {
    let all = vec![
      north_of_user("first", 3.0, Category::Community),
      Project::new("second", "second", Category::Donation)
        .with_position(USER.lat - 3.0 / KM_PER_DEGREE, USER.lon),
      north_of_user("nearest", 1.0, Category::Community),
      north_of_user("third", 3.0, Category::Education),
    ];
    let results = within_radius(&all, USER, 10.0);
    let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["nearest", "first", "second", "third"]);
  }

  #[test]
  fn hidden_education_scenario() {
    let all = vec![
      north_of_user("e1", 1.0, Category::Education),
      north_of_user("e2", 2.0, Category::Education),
      north_of_user("v", 3.0, Category::Volunteer),
      north_of_user("c", 4.0, Category::Community),
      north_of_user("d", 5.0, Category::Donation),
    ];
    let mut filter = FilterState::default();
    filter.toggle_category(Category::Education);

    let set = derive_markers(&MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &filter,
    });
    assert_eq!(set.markers.len(), 3);
    assert_eq!(set.counts[&Category::Education], 0);
    assert_eq!(set.counts[&Category::Volunteer], 1);
    assert_eq!(set.visible_total, 3);
    assert_eq!(set.counts.len(), Category::all().len());
  }

  #[test]
  fn unmappable_projects_are_skipped() {
    let mut bad = Project::new("bad", "bad", Category::Community);
    bad.latitude = Some(crate::project::RawDegrees::Text("n/a".to_string()));
    bad.longitude = Some(1.0.into());
    let all = vec![
      Project::new("none", "none", Category::Community),
      bad,
      north_of_user("ok", 1.0, Category::Community),
    ];
    let set = derive_markers(&MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &FilterState::default(),
    });
    assert_eq!(ids(&set), vec!["ok"]);
    assert_eq!(set.counts[&Category::Community], 1);
  }

  #[test]
  fn hidden_search_hit_contributes_nothing() {
    let search = vec![
      north_of_user("s1", 1.0, Category::Partnership),
      north_of_user("s2", 1.0, Category::MentalHealth),
    ];
    let mut filter = FilterState::default();
    filter.toggle_category(Category::Partnership);
    let set = derive_markers(&MapSnapshot {
      projects: &[],
      search_results: &search,
      filter: &filter,
    });
    assert_eq!(set.source, MarkerSource::Search);
    assert_eq!(ids(&set), vec!["s2"]);
    assert_eq!(set.counts[&Category::Partnership], 0);
    assert_eq!(set.visible_total, 1);
  }

  #[rstest]
  #[case(&[])]
  #[case(&[Category::Education])]
  #[case(&[Category::Volunteer, Category::Donation])]
  #[case(&[Category::MentalHealth, Category::Community, Category::Partnership])]
  #[case(Category::all())]
  fn counts_match_markers(#[case] hidden: &[Category]) {
    let all: Vec<Project> = Category::all()
      .iter()
      .cycle()
      .take(20)
      .enumerate()
      .map(|(i, c)| {
        #[allow(clippy::cast_precision_loss)]
        let km = i as f64;
        north_of_user(&format!("p{i}"), km, *c)
      })
      .collect();
    let mut filter = FilterState::default();
    hidden.iter().for_each(|c| filter.toggle_category(*c));

    let set = derive_markers(&MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &filter,
    });
    assert_eq!(set.visible_total, set.markers.len());
    for marker in &set.markers {
      let project = all.iter().find(|p| p.id == marker.id).unwrap();
      assert!(!hidden.contains(&project.category));
    }
    for category in hidden {
      assert_eq!(set.counts[category], 0);
    }

    let mut near = near_me_filter(7.5, &all);
    hidden.iter().for_each(|c| near.toggle_category(*c));
    let set = derive_markers(&MapSnapshot {
      projects: &all,
      search_results: &[],
      filter: &near,
    });
    assert_eq!(set.visible_total, set.markers.len());
  }

  #[test]
  fn markers_encode_category_and_status() {
    let project = north_of_user("x", 1.0, Category::MentalHealth).with_status(Status::Completed);
    let set = derive_markers(&MapSnapshot {
      projects: &[project],
      search_results: &[],
      filter: &FilterState::default(),
    });
    let marker = &set.markers[0];
    assert_eq!(marker.icon, IconKind::Heart);
    assert_eq!(marker.color, status_color(Status::Completed));
    assert!((marker.radius - MARKER_RADIUS).abs() < f32::EPSILON);
  }

  #[test]
  fn legend_lists_every_category() {
    let projects = vec![
      north_of_user("a", 1.0, Category::Education),
      north_of_user("b", 2.0, Category::Education),
      north_of_user("c", 3.0, Category::Donation),
    ];
    let mut filter = FilterState::default();
    filter.toggle_category(Category::Donation);
    let set = derive_markers(&MapSnapshot {
      projects: &projects,
      search_results: &[],
      filter: &filter,
    });

    let legend = set.legend(&filter);
    assert_eq!(legend.len(), Category::all().len());
    let education = legend
      .iter()
      .find(|e| e.category == Category::Education)
      .unwrap();
    assert_eq!(education.label, "Education");
    assert_eq!(education.icon, IconKind::Square);
    assert_eq!(education.count, 2);
    assert!(education.visible);

    let donation = legend
      .iter()
      .find(|e| e.category == Category::Donation)
      .unwrap();
    assert_eq!(donation.count, 0);
    assert!(!donation.visible);
  }
}
