use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use log::error;
use serde::{Deserialize, Serialize};

use crate::{
  filter::DEFAULT_NEAR_ME_RADIUS_KM, map::viewport::DefaultView, source::DEFAULT_PAGE_LIMIT,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REMOTE_PORT: u16 = 12346;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
  #[serde(skip)]
  pub config_path: Option<PathBuf>,
  #[serde(default)]
  pub api_base_url: Option<String>,
  #[serde(default)]
  pub api_token: Option<String>,
  #[serde(default)]
  pub page_limit: Option<usize>,
  #[serde(default)]
  pub search_debounce_ms: Option<u64>,
  #[serde(default)]
  pub default_radius_km: Option<f64>,
  #[serde(default)]
  pub default_view: Option<DefaultView>,
  #[serde(default)]
  pub remote_port: Option<u16>,
}

impl Config {
  /// Environment first, then the config file, then defaults. Creates the config file on
  /// first use.
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    let from_file = Self::from_file();
    let default = Self::default();

    let mut merged = from_env;
    if let Some(from_file) = &from_file {
      merged = merged.merge(from_file);
    }
    merged = merged.merge(&default);

    if merged.config_path.is_some() && from_file.is_none() {
      merged.init_cfg_file();
    }

    merged
  }

  fn config_dir() -> Option<PathBuf> {
    std::env::var("FIELDMAP_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("fieldmap")))
  }

  fn from_env() -> Self {
    Self {
      config_path: std::env::var("FIELDMAP_CONFIG").ok().map(PathBuf::from),
      api_base_url: std::env::var("FIELDMAP_API_URL").ok(),
      api_token: std::env::var("FIELDMAP_API_TOKEN").ok(),
      page_limit: None,
      search_debounce_ms: None,
      default_radius_km: None,
      default_view: None,
      remote_port: None,
    }
  }

  /// Fills every unset field from `other`.
  #[must_use]
  pub fn merge(mut self, other: &Self) -> Self {
    self.config_path = self.config_path.or(other.config_path.clone());
    self.api_base_url = self.api_base_url.or(other.api_base_url.clone());
    self.api_token = self.api_token.or(other.api_token.clone());
    self.page_limit = self.page_limit.or(other.page_limit);
    self.search_debounce_ms = self.search_debounce_ms.or(other.search_debounce_ms);
    self.default_radius_km = self.default_radius_km.or(other.default_radius_km);
    self.default_view = self.default_view.or(other.default_view);
    self.remote_port = self.remote_port.or(other.remote_port);
    self
  }

  fn from_file() -> Option<Self> {
    let config_path = Self::config_dir()?.join("config.json");

    serde_json::from_str(&std::fs::read_to_string(&config_path).ok()?)
      .inspect_err(|e| error!("Failed to read config file: {e}"))
      .ok()
  }

  fn init_cfg_file(&self) {
    if let Some(path) = &self.config_path
      && !path.exists()
    {
      let _ = std::fs::create_dir_all(path).inspect_err(|e| {
        error!("Failed to create config directory: {e}");
      });
    }

    if let Some(path) = &self.config_path {
      let path = path.join("config.json");
      if !path.exists() {
        // Tokens from the environment stay out of the file.
        let config = serde_json::to_string_pretty(&Config {
          api_token: None,
          ..self.clone()
        });
        if let Ok(config) = config {
          let _ = std::fs::write(path, config).inspect_err(|e| {
            error!("Failed to write config file: {e}");
          });
        } else {
          error!("Failed to serialize config");
        }
      }
    }
  }

  #[must_use]
  pub fn api_base_url(&self) -> &str {
    self.api_base_url.as_deref().unwrap_or(DEFAULT_API_URL)
  }

  #[must_use]
  pub fn page_limit(&self) -> usize {
    self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT)
  }

  #[must_use]
  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(
      self
        .search_debounce_ms
        .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS),
    )
  }

  #[must_use]
  pub fn default_radius_km(&self) -> f64 {
    self.default_radius_km.unwrap_or(DEFAULT_NEAR_ME_RADIUS_KM)
  }

  #[must_use]
  pub fn default_view(&self) -> DefaultView {
    self.default_view.unwrap_or_default()
  }

  #[must_use]
  pub fn remote_port(&self) -> u16 {
    self.remote_port.unwrap_or(DEFAULT_REMOTE_PORT)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      config_path: Self::config_dir(),
      api_base_url: Some(DEFAULT_API_URL.to_string()),
      api_token: None,
      page_limit: Some(DEFAULT_PAGE_LIMIT),
      search_debounce_ms: Some(DEFAULT_SEARCH_DEBOUNCE_MS),
      default_radius_km: Some(DEFAULT_NEAR_ME_RADIUS_KM),
      default_view: Some(DefaultView::default()),
      remote_port: Some(DEFAULT_REMOTE_PORT),
    }
  }
}
