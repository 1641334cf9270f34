//! One map surface's worth of state, wired to a backend and a position provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
  sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
  task::JoinHandle,
};

use crate::{
  config::Config,
  filter::{FilterState, NearMe, SearchColumn},
  geolocation::{GeolocationError, Geolocator, PositionProvider},
  map::{
    coordinates::WGS84Coordinate,
    map_event::MapEvent,
    markers::{
      LegendEntry, Marker, MarkerSet, MarkerSource, MapSnapshot, derive_markers, within_radius,
    },
    viewport::{ViewportCommand, ViewportController},
  },
  project::{Category, Project, ProjectId},
  source::{ProjectBackend, ProjectDataSource, SearchOutcome, debounce::SearchDebouncer},
};

/// Everything the rendering surface needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
  pub source: MarkerSource,
  pub markers: Vec<Marker>,
  pub counts: BTreeMap<Category, usize>,
  pub visible_total: usize,
  pub legend: Vec<LegendEntry>,
  pub viewport: ViewportCommand,
  pub selected_project: Option<Project>,
  pub search_query: String,
  pub search_column: SearchColumn,
  pub visible_categories: BTreeMap<Category, bool>,
  pub near_me_mode: bool,
  pub near_me_active: bool,
  pub near_me_radius_km: f64,
  pub user_location: Option<WGS84Coordinate>,
  pub is_getting_location: bool,
  pub is_searching: bool,
  pub fetch_error: Option<String>,
  pub location_error: Option<String>,
}

/// Result of one location request, tagged with the request it answers.
struct LocationOutcome {
  request: u64,
  result: Result<WGS84Coordinate, GeolocationError>,
}

/// The outstanding location request and what its answer is for.
struct Locating {
  request: u64,
  near_me: bool,
  center: bool,
  task: JoinHandle<()>,
}

/// Owns the map state and reacts to user actions.
///
/// Text searches are debounced and location requests run on spawned tasks. Their outcomes
/// are picked up by [`MapSession::pump`], [`MapSession::settle_search`] or
/// [`MapSession::settle_location`], so no operation holds the session while waiting.
/// Dropping the session cancels pending work.
pub struct MapSession {
  source: ProjectDataSource,
  filter: FilterState,
  geolocator: Geolocator,
  viewport: ViewportController,
  debouncer: SearchDebouncer,
  outcomes: UnboundedReceiver<SearchOutcome>,
  /// Generation of the scheduled search whose outcome has not arrived yet.
  awaiting: Option<u64>,
  location_sender: UnboundedSender<LocationOutcome>,
  locations: UnboundedReceiver<LocationOutcome>,
  locating: Option<Locating>,
  location_requests: u64,
}

impl MapSession {
  #[must_use]
  pub fn new(
    config: &Config,
    backend: Arc<dyn ProjectBackend>,
    positions: Arc<dyn PositionProvider>,
  ) -> Self {
    let (sender, outcomes) = unbounded_channel();
    let (location_sender, locations) = unbounded_channel();
    Self {
      source: ProjectDataSource::new(backend.clone(), config.page_limit()),
      filter: FilterState::new(config.default_radius_km()),
      geolocator: Geolocator::new(positions),
      viewport: ViewportController::new(config.default_view()),
      debouncer: SearchDebouncer::new(backend, config.search_debounce(), sender),
      outcomes,
      awaiting: None,
      location_sender,
      locations,
      locating: None,
      location_requests: 0,
    }
  }

  #[must_use]
  pub fn filter(&self) -> &FilterState {
    &self.filter
  }

  #[must_use]
  pub fn source(&self) -> &ProjectDataSource {
    &self.source
  }

  #[must_use]
  pub fn viewport(&self) -> ViewportCommand {
    self.viewport.current()
  }

  #[must_use]
  pub fn is_searching(&self) -> bool {
    self.awaiting.is_some()
  }

  /// True from the moment a location is requested until its answer has been applied.
  #[must_use]
  pub fn is_getting_location(&self) -> bool {
    self.locating.is_some()
  }

  fn snapshot(&self) -> MapSnapshot<'_> {
    MapSnapshot {
      projects: self.source.projects(),
      search_results: self.source.search_results(),
      filter: &self.filter,
    }
  }

  #[must_use]
  pub fn markers(&self) -> MarkerSet {
    derive_markers(&self.snapshot())
  }

  #[must_use]
  pub fn view(&self) -> MapView {
    let set = self.markers();
    let legend = set.legend(&self.filter);
    let MarkerSet {
      source,
      markers,
      counts,
      visible_total,
    } = set;
    MapView {
      source,
      markers,
      counts,
      visible_total,
      legend,
      viewport: self.viewport.current(),
      selected_project: self.filter.selected_project().cloned(),
      search_query: self.filter.search_query().to_string(),
      search_column: self.filter.search_column(),
      visible_categories: self.filter.visible_categories().clone(),
      near_me_mode: self.filter.near_me_mode(),
      near_me_active: self.filter.near_me_active(),
      near_me_radius_km: self.filter.near_me_radius(),
      user_location: self.filter.user_location(),
      is_getting_location: self.is_getting_location(),
      is_searching: self.is_searching(),
      fetch_error: self.source.error().map(ToString::to_string),
      location_error: self.filter.location_error().map(ToString::to_string),
    }
  }

  /// Loads the full project list.
  pub async fn load(&mut self) {
    self.source.fetch_all_projects().await;
    self.refresh_near_me();
  }

  pub fn set_search_query(&mut self, query: impl Into<String>) {
    self.filter.set_search_query(query);
    self.schedule_search();
  }

  /// Changing the column re-runs a non-blank query.
  pub fn set_search_column(&mut self, column: SearchColumn) {
    if self.filter.search_column() == column {
      return;
    }
    self.filter.set_search_column(column);
    if !self.filter.search_query().trim().is_empty() {
      self.schedule_search();
    }
  }

  fn schedule_search(&mut self) {
    match self
      .source
      .begin_search(self.filter.search_query(), self.filter.search_column())
    {
      Some(ticket) => {
        self.awaiting = Some(ticket.generation);
        self.debouncer.schedule(ticket);
      }
      None => {
        debug!("Search cleared");
        self.debouncer.cancel();
        self.awaiting = None;
        self.viewport.on_search_results(&[]);
      }
    }
  }

  fn apply_outcome(&mut self, outcome: SearchOutcome) -> bool {
    let generation = outcome.generation;
    if !self.source.apply_search(outcome) {
      return false;
    }
    if self.awaiting == Some(generation) {
      self.awaiting = None;
    }
    self.viewport.on_search_results(self.source.search_results());
    true
  }

  /// Applies every search and location outcome that has arrived. Returns whether anything
  /// changed.
  pub fn pump(&mut self) -> bool {
    let mut applied = false;
    while let Ok(outcome) = self.outcomes.try_recv() {
      applied |= self.apply_outcome(outcome);
    }
    while let Ok(outcome) = self.locations.try_recv() {
      applied |= self.apply_location(outcome);
    }
    applied
  }

  /// Waits until the latest scheduled search has ended and applies its outcome.
  pub async fn settle_search(&mut self) -> bool {
    self.debouncer.finish().await;
    let applied = self.pump();
    if let Some(generation) = self.awaiting.take() {
      warn!("Search #{generation} ended without a result");
    }
    applied
  }

  /// Waits until the outstanding location request has ended and applies its answer.
  pub async fn settle_location(&mut self) -> bool {
    if let Some(locating) = &mut self.locating
      && let Err(e) = (&mut locating.task).await
      && !e.is_cancelled()
    {
      warn!("Location task failed: {e}");
    }
    let applied = self.pump();
    if let Some(locating) = self.locating.take() {
      warn!("Location request #{} ended without a result", locating.request);
    }
    applied
  }

  /// Settles both the location request and the search.
  pub async fn settle(&mut self) -> bool {
    let located = self.settle_location().await;
    let searched = self.settle_search().await;
    located | searched
  }

  pub fn toggle_category(&mut self, category: Category) {
    self.filter.toggle_category(category);
  }

  pub fn select_all_categories(&mut self) {
    self.filter.select_all_categories();
  }

  pub fn deselect_all_categories(&mut self) {
    self.filter.deselect_all_categories();
  }

  /// Starts a location request on its own task, or adds to the one in flight.
  fn request_location(&mut self, near_me: bool, center: bool) {
    if let Some(locating) = &mut self.locating {
      locating.near_me |= near_me;
      locating.center |= center;
      return;
    }
    match self.geolocator.begin() {
      Ok(Some(request)) => {
        self.location_requests += 1;
        let id = self.location_requests;
        let sender = self.location_sender.clone();
        let task = tokio::spawn(async move {
          let _ = sender.send(LocationOutcome {
            request: id,
            result: request.run().await,
          });
        });
        self.locating = Some(Locating {
          request: id,
          near_me,
          center,
          task,
        });
      }
      Ok(None) => debug!("Location request already in progress"),
      Err(e) => {
        warn!("Location unavailable: {e}");
        self.filter.set_location_error(e);
      }
    }
  }

  fn apply_location(&mut self, outcome: LocationOutcome) -> bool {
    let Some(locating) = self
      .locating
      .take_if(|locating| locating.request == outcome.request)
    else {
      debug!("Discarding answer to location request #{}", outcome.request);
      return false;
    };
    match outcome.result {
      Ok(location) => {
        if locating.near_me {
          self.filter.set_user_location(location);
          self.filter.set_near_me_mode(true);
          self.refresh_near_me();
        }
        if locating.center {
          self.viewport.center_on_user(location);
        }
      }
      Err(e) => {
        warn!("Location request failed: {e}");
        self.filter.set_location_error(e);
      }
    }
    true
  }

  /// Enabling near-me without a known location requests one. The mode stays off until it
  /// arrives; on failure the error is kept for display.
  pub fn set_near_me_mode(&mut self, enabled: bool) {
    if self.filter.set_near_me_mode(enabled) == NearMe::LocationRequired {
      self.request_location(true, false);
      return;
    }
    if !enabled && let Some(locating) = &mut self.locating {
      locating.near_me = false;
    }
    self.refresh_near_me();
  }

  /// Returns the radius in effect afterwards. Invalid values are ignored.
  pub fn set_near_me_radius(&mut self, radius_km: f64) -> f64 {
    match self.filter.set_near_me_radius(radius_km) {
      Ok(_) => self.refresh_near_me(),
      Err(e) => warn!("{e}"),
    }
    self.filter.near_me_radius()
  }

  fn refresh_near_me(&mut self) {
    let results = match self.filter.user_location() {
      Some(location) if self.filter.near_me_mode() => {
        within_radius(self.source.projects(), location, self.filter.near_me_radius())
      }
      _ => Vec::new(),
    };
    debug!("{} projects near me", results.len());
    self.filter.set_near_me_results(results);
  }

  /// Centers on the user right away if the location is known. Otherwise one is requested and
  /// the map centers when it arrives, without remembering it.
  pub fn center_on_me(&mut self) -> Option<ViewportCommand> {
    if let Some(location) = self.filter.user_location() {
      return Some(self.viewport.center_on_user(location));
    }
    self.request_location(false, true);
    None
  }

  pub fn clear_near_me(&mut self) -> ViewportCommand {
    self.filter.clear_near_me();
    if let Some(locating) = &mut self.locating {
      locating.near_me = false;
    }
    self.viewport.reset()
  }

  /// Selects a project by id, preferring the copy currently feeding the markers so the
  /// snapshot carries its distance.
  pub fn select_project(&mut self, id: &ProjectId) -> bool {
    let (_, current) = self.snapshot().source();
    let found = current
      .iter()
      .chain(self.source.search_results())
      .chain(self.source.projects())
      .find(|p| &p.id == id)
      .cloned();
    match found {
      Some(project) => {
        info!("Selected {project}");
        self.filter.select_project(project);
        true
      }
      None => {
        warn!("No project with id {id}");
        false
      }
    }
  }

  pub fn clear_selection(&mut self) {
    self.filter.clear_selection();
  }

  /// Dispatches a rendering-surface event. Only a refresh waits for I/O.
  pub async fn apply(&mut self, event: MapEvent) {
    debug!("Map event: {event:?}");
    match event {
      MapEvent::Refresh => self.load().await,
      MapEvent::SetSearchQuery { query } => self.set_search_query(query),
      MapEvent::SetSearchColumn { column } => self.set_search_column(column),
      MapEvent::ToggleCategory { category } => self.toggle_category(category),
      MapEvent::SelectAllCategories => self.select_all_categories(),
      MapEvent::DeselectAllCategories => self.deselect_all_categories(),
      MapEvent::SetNearMeMode { enabled } => self.set_near_me_mode(enabled),
      MapEvent::SetNearMeRadius { radius_km } => {
        self.set_near_me_radius(radius_km);
      }
      MapEvent::CenterOnMe => {
        self.center_on_me();
      }
      MapEvent::ClearNearMe => {
        self.clear_near_me();
      }
      MapEvent::SelectProject { id } => {
        self.select_project(&id);
      }
      MapEvent::ClearSelection => self.clear_selection(),
    }
  }

  /// Cancels pending work. Also happens on drop.
  pub fn shutdown(&mut self) {
    self.debouncer.cancel();
    self.awaiting = None;
    if let Some(locating) = self.locating.take() {
      debug!("Cancelling location request #{}", locating.request);
      locating.task.abort();
    }
  }
}

impl Drop for MapSession {
  fn drop(&mut self) {
    self.shutdown();
  }
}
