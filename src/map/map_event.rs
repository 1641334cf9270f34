use serde::{Deserialize, Serialize};

use crate::{
  filter::SearchColumn,
  project::{Category, ProjectId},
};

/// A user action sent by the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MapEvent {
  /// Reload the full project list.
  Refresh,
  SetSearchQuery { query: String },
  SetSearchColumn { column: SearchColumn },
  ToggleCategory { category: Category },
  SelectAllCategories,
  DeselectAllCategories,
  SetNearMeMode { enabled: bool },
  SetNearMeRadius { radius_km: f64 },
  CenterOnMe,
  ClearNearMe,
  SelectProject { id: ProjectId },
  ClearSelection,
}
