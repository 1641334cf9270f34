pub mod debounce;
pub mod http;

use std::sync::Arc;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{filter::SearchColumn, project::Project};

/// Default page size when fetching projects.
pub const DEFAULT_PAGE_LIMIT: usize = 5000;

/// Errors from a [`ProjectBackend`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  #[error("Could not reach the project service: {0}")]
  Transport(String),
  #[error("Project service answered with HTTP {0}.")]
  Status(u16),
  #[error("Unexpected project data: {0}")]
  Decode(String),
}

/// A text search against the project service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
  pub text: String,
  pub column: SearchColumn,
}

/// One request to the project service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectQuery {
  pub search: Option<SearchTerm>,
  pub limit: usize,
}

impl ProjectQuery {
  #[must_use]
  pub fn all(limit: usize) -> Self {
    Self {
      search: None,
      limit,
    }
  }

  #[must_use]
  pub fn search(text: impl Into<String>, column: SearchColumn, limit: usize) -> Self {
    Self {
      search: Some(SearchTerm {
        text: text.into(),
        column,
      }),
      limit,
    }
  }

  /// URL query string, without the leading `?`.
  #[must_use]
  pub fn to_query_string(&self) -> String {
    match &self.search {
      None => format!("limit={}", self.limit),
      Some(SearchTerm {
        text,
        column: SearchColumn::All,
      }) => format!("search={}&limit={}", urlencoding::encode(text), self.limit),
      Some(SearchTerm { text, column }) => format!(
        "searchColumn={}&searchValue={}&limit={}",
        column.as_str(),
        urlencoding::encode(text),
        self.limit
      ),
    }
  }
}

/// Where projects come from.
#[async_trait::async_trait]
pub trait ProjectBackend: Send + Sync {
  /// Human-readable name of the backend
  fn name(&self) -> &str;

  /// Runs one query.
  async fn fetch(&self, query: &ProjectQuery) -> Result<Vec<Project>, FetchError>;
}

/// A search that has been issued but not applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
  pub generation: u64,
  pub query: ProjectQuery,
}

/// The answer to a [`SearchTicket`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
  pub generation: u64,
  pub result: Result<Vec<Project>, FetchError>,
}

impl SearchTicket {
  /// Runs the search. Does not need the data source, so it can run on a spawned task.
  pub async fn run(self, backend: &dyn ProjectBackend) -> SearchOutcome {
    debug!(
      "Running search #{} against {}: {:?}",
      self.generation,
      backend.name(),
      self.query.search
    );
    SearchOutcome {
      generation: self.generation,
      result: backend.fetch(&self.query).await,
    }
  }
}

/// Caches the full project list and the latest search results, plus the last fetch error.
pub struct ProjectDataSource {
  backend: Arc<dyn ProjectBackend>,
  page_limit: usize,
  projects: Vec<Project>,
  search_results: Vec<Project>,
  error: Option<FetchError>,
  generation: u64,
}

impl ProjectDataSource {
  #[must_use]
  pub fn new(backend: Arc<dyn ProjectBackend>, page_limit: usize) -> Self {
    Self {
      backend,
      page_limit,
      projects: Vec::new(),
      search_results: Vec::new(),
      error: None,
      generation: 0,
    }
  }

  #[must_use]
  pub fn projects(&self) -> &[Project] {
    &self.projects
  }

  #[must_use]
  pub fn search_results(&self) -> &[Project] {
    &self.search_results
  }

  #[must_use]
  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  /// Reloads the full list. On failure the list is emptied and the error kept.
  pub async fn fetch_all_projects(&mut self) -> &[Project] {
    match self.backend.fetch(&ProjectQuery::all(self.page_limit)).await {
      Ok(projects) => {
        info!("Loaded {} projects from {}", projects.len(), self.backend.name());
        self.projects = projects;
        self.error = None;
      }
      Err(e) => {
        error!("Failed to load projects: {e}");
        self.projects.clear();
        self.error = Some(e);
      }
    }
    &self.projects
  }

  /// Starts a new search and invalidates every earlier one.
  ///
  /// A blank query clears the results and the error immediately and returns `None`.
  pub fn begin_search(&mut self, query: &str, column: SearchColumn) -> Option<SearchTicket> {
    self.generation += 1;
    let query = query.trim();
    if query.is_empty() {
      self.search_results.clear();
      self.error = None;
      return None;
    }
    Some(SearchTicket {
      generation: self.generation,
      query: ProjectQuery::search(query, column, self.page_limit),
    })
  }

  /// Applies a finished search unless a newer one was issued in the meantime.
  /// Returns whether the outcome was applied.
  pub fn apply_search(&mut self, outcome: SearchOutcome) -> bool {
    if outcome.generation != self.generation {
      debug!(
        "Discarding stale search #{} (current #{})",
        outcome.generation, self.generation
      );
      return false;
    }
    match outcome.result {
      Ok(results) => {
        debug!("Search #{} returned {} projects", outcome.generation, results.len());
        self.search_results = results;
        self.error = None;
      }
      Err(e) => {
        error!("Search failed: {e}");
        self.search_results.clear();
        self.error = Some(e);
      }
    }
    true
  }

  /// Searches right away, without debouncing.
  pub async fn search(&mut self, query: &str, column: SearchColumn) -> &[Project] {
    if let Some(ticket) = self.begin_search(query, column) {
      let outcome = ticket.run(self.backend.as_ref()).await;
      self.apply_search(outcome);
    }
    &self.search_results
  }
}


#[cfg(test)]
mod tests {
  use super::test_utils::RecordingBackend;
  use super::*;
  use crate::project::Category;

  fn projects() -> Vec<Project> {
    vec![
      Project::new("1", "Kibera reading club", Category::Education).with_position(-1.31, 36.78),
      Project::new("2", "Mathare counselling", Category::MentalHealth).with_position(-1.26, 36.86),
      Project::new("3", "Kisumu water point", Category::Community).with_position(-0.09, 34.77),
    ]
  }

  #[test]
  fn query_strings() {
    assert_eq!(ProjectQuery::all(5000).to_query_string(), "limit=5000");
    assert_eq!(
      ProjectQuery::search("water point", SearchColumn::All, 50).to_query_string(),
      "search=water%20point&limit=50"
    );
    assert_eq!(
      ProjectQuery::search("Kisumu&Co", SearchColumn::Location, 50).to_query_string(),
      "searchColumn=location&searchValue=Kisumu%26Co&limit=50"
    );
  }

  #[tokio::test]
  async fn fetch_all_uses_page_limit() {
    let backend = RecordingBackend::new(projects());
    let mut source = ProjectDataSource::new(backend.clone(), 2);
    assert_eq!(source.fetch_all_projects().await.len(), 2);
    assert_eq!(backend.queries(), vec![ProjectQuery::all(2)]);
    assert!(source.error().is_none());
  }

  #[tokio::test]
  async fn fetch_failure_empties_list_and_keeps_error() {
    let backend = RecordingBackend::new(projects());
    let mut source = ProjectDataSource::new(backend.clone(), DEFAULT_PAGE_LIMIT);
    assert_eq!(source.fetch_all_projects().await.len(), 3);

    backend.fail_with(Some(FetchError::Status(500)));
    assert!(source.fetch_all_projects().await.is_empty());
    assert_eq!(source.error(), Some(&FetchError::Status(500)));

    backend.fail_with(None);
    assert_eq!(source.fetch_all_projects().await.len(), 3);
    assert!(source.error().is_none());
  }

  #[tokio::test]
  async fn blank_search_clears_results_and_error() {
    let backend = RecordingBackend::new(projects());
    let mut source = ProjectDataSource::new(backend.clone(), DEFAULT_PAGE_LIMIT);
    assert_eq!(source.search("kisumu", SearchColumn::All).await.len(), 1);

    backend.fail_with(Some(FetchError::Transport("offline".to_string())));
    assert!(source.search("kibera", SearchColumn::Name).await.is_empty());
    assert!(source.error().is_some());

    assert!(source.search("   ", SearchColumn::All).await.is_empty());
    assert!(source.error().is_none());
    // The blank query never reached the backend.
    assert_eq!(backend.queries().len(), 2);
  }

  #[tokio::test]
  async fn stale_outcomes_are_discarded() {
    let backend = RecordingBackend::new(projects());
    let mut source = ProjectDataSource::new(backend.clone(), DEFAULT_PAGE_LIMIT);

    let old = source.begin_search("kibera", SearchColumn::All).unwrap();
    let new = source.begin_search("kisumu", SearchColumn::All).unwrap();
    assert!(new.generation > old.generation);

    let new_outcome = new.run(backend.as_ref()).await;
    let old_outcome = old.run(backend.as_ref()).await;

    assert!(source.apply_search(new_outcome));
    assert!(!source.apply_search(old_outcome));
    assert_eq!(source.search_results().len(), 1);
    assert_eq!(source.search_results()[0].id.as_str(), "3");
  }

  #[tokio::test]
  async fn clearing_the_query_invalidates_inflight_search() {
    let backend = RecordingBackend::new(projects());
    let mut source = ProjectDataSource::new(backend.clone(), DEFAULT_PAGE_LIMIT);
    let ticket = source.begin_search("kibera", SearchColumn::All).unwrap();
    assert!(source.begin_search("", SearchColumn::All).is_none());
    let outcome = ticket.run(backend.as_ref()).await;
    assert!(!source.apply_search(outcome));
    assert!(source.search_results().is_empty());
  }
}
