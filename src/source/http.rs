use log::{debug, warn};
use serde_json::Value;

use super::{FetchError, ProjectBackend, ProjectQuery};
use crate::project::Project;

/// The foundation's REST API.
pub struct HttpProjectBackend {
  base_url: String,
  token: Option<String>,
  client: surf::Client,
}

impl HttpProjectBackend {
  #[must_use]
  pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
    Self {
      base_url: base_url.into().trim_end_matches('/').to_string(),
      token: token.filter(|t| !t.trim().is_empty()),
      client: surf::Client::new(),
    }
  }

  #[must_use]
  pub fn url(&self, query: &ProjectQuery) -> String {
    format!("{}/projects?{}", self.base_url, query.to_query_string())
  }
}

#[async_trait::async_trait]
impl ProjectBackend for HttpProjectBackend {
  fn name(&self) -> &str {
    &self.base_url
  }

  async fn fetch(&self, query: &ProjectQuery) -> Result<Vec<Project>, FetchError> {
    let url = self.url(query);
    debug!("GET {url}");

    let mut request = self.client.get(&url).header("Accept", "application/json");
    if let Some(token) = &self.token {
      request = request.header("Authorization", format!("Bearer {token}"));
    } else {
      debug!("No API token configured, sending unauthenticated request");
    }

    let mut response = request
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    if !response.status().is_success() {
      return Err(FetchError::Status(response.status().into()));
    }

    let body: Value = response
      .body_json()
      .await
      .map_err(|e| FetchError::Decode(e.to_string()))?;

    decode_page(body)
  }
}

/// Decodes `{ "data": [...] }`, skipping records that do not fit the project model.
pub fn decode_page(body: Value) -> Result<Vec<Project>, FetchError> {
  let Value::Object(mut page) = body else {
    return Err(FetchError::Decode("expected a JSON object".to_string()));
  };
  let Some(Value::Array(records)) = page.remove("data") else {
    return Err(FetchError::Decode("missing 'data' array".to_string()));
  };

  let total = records.len();
  let projects: Vec<Project> = records
    .into_iter()
    .filter_map(|record| {
      serde_json::from_value::<Project>(record)
        .inspect_err(|e| warn!("Skipping project record: {e}"))
        .ok()
    })
    .collect();

  if projects.len() < total {
    warn!("Skipped {} of {total} project records", total - projects.len());
  }
  Ok(projects)
}
