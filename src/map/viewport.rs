//! Viewport commands for the rendering surface.

use log::debug;
use serde::{Deserialize, Serialize};

use super::coordinates::{BoundingBox, WGS84Coordinate};
use crate::project::{Project, ProjectId};

/// Zoom used when a search finds exactly one mappable project.
pub const SINGLE_RESULT_ZOOM: u8 = 15;
/// Zoom used when centering on the user.
pub const NEIGHBORHOOD_ZOOM: u8 = 13;
/// Degrees added on every side of a fitted search extent.
pub const FIT_PADDING_DEGREES: f64 = 0.01;
/// Length of the fit animation.
pub const FIT_ANIMATION_MS: u64 = 1000;

/// Center and zoom the map shows when nothing else asks for a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultView {
  pub center: WGS84Coordinate,
  pub zoom: u8,
}

impl Default for DefaultView {
  /// Kenya overview.
  fn default() -> Self {
    Self {
      center: WGS84Coordinate::new(0.0236, 37.9062),
      zoom: 6,
    }
  }
}

/// Instruction to the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewportCommand {
  CenterOn {
    center: WGS84Coordinate,
    zoom: u8,
  },
  FitBounds {
    bounds: BoundingBox,
    animation_ms: u64,
  },
}

/// Keeps the last issued viewport command and turns state changes into new ones.
///
/// Each trigger is independent: a search fit is only replaced by another search change, an
/// explicit center-on-me, or a reset.
#[derive(Debug, Clone)]
pub struct ViewportController {
  default_view: DefaultView,
  current: ViewportCommand,
  /// Mappable search hits the current search command was computed from.
  last_search: Vec<(ProjectId, WGS84Coordinate)>,
}

impl Default for ViewportController {
  fn default() -> Self {
    Self::new(DefaultView::default())
  }
}

impl ViewportController {
  #[must_use]
  pub fn new(default_view: DefaultView) -> Self {
    Self {
      default_view,
      current: Self::command_for(default_view),
      last_search: Vec::new(),
    }
  }

  fn command_for(view: DefaultView) -> ViewportCommand {
    ViewportCommand::CenterOn {
      center: view.center,
      zoom: view.zoom,
    }
  }

  #[must_use]
  pub fn current(&self) -> ViewportCommand {
    self.current
  }

  /// Reacts to new search results. Returns a command only if the mappable hits changed and
  /// there is at least one of them.
  pub fn on_search_results(&mut self, results: &[Project]) -> Option<ViewportCommand> {
    let hits: Vec<(ProjectId, WGS84Coordinate)> = results
      .iter()
      .filter_map(|p| Some((p.id.clone(), p.position()?)))
      .collect();

    let unchanged = hits.len() == self.last_search.len()
      && hits
        .iter()
        .zip(&self.last_search)
        .all(|((id_a, a), (id_b, b))| id_a == id_b && a.exact_eq(b));
    if unchanged {
      return None;
    }
    self.last_search = hits;

    let command = match self.last_search.as_slice() {
      [] => return None,
      [(_, position)] => ViewportCommand::CenterOn {
        center: *position,
        zoom: SINGLE_RESULT_ZOOM,
      },
      hits => {
        let mut bounds = BoundingBox::from_iterator(hits.iter().map(|(_, position)| *position));
        bounds.frame(FIT_PADDING_DEGREES);
        ViewportCommand::FitBounds {
          bounds,
          animation_ms: FIT_ANIMATION_MS,
        }
      }
    };
    debug!("Search viewport: {command:?}");
    self.current = command;
    Some(command)
  }

  /// Explicit "center on me".
  pub fn center_on_user(&mut self, location: WGS84Coordinate) -> ViewportCommand {
    self.current = ViewportCommand::CenterOn {
      center: location,
      zoom: NEIGHBORHOOD_ZOOM,
    };
    self.current
  }

  /// Back to the default view. Forgets the last search so the same results fit again.
  pub fn reset(&mut self) -> ViewportCommand {
    self.last_search.clear();
    self.current = Self::command_for(self.default_view);
    self.current
  }
}
