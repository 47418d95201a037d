use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::api_types::{decode_post, decode_posts, decode_tags};
use crate::api::endpoints::{with_trailing_slash, Endpoint};
use crate::api::types::{Post, PostId};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};

/// Blog API client wrapper
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("blogsync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: with_trailing_slash(base_url),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Issue a GET and return the raw JSON body.
  ///
  /// 400 responses become [`SyncError::Validation`] with the body verbatim;
  /// any other non-success status or transport error is a [`SyncError::Network`].
  async fn get_json(&self, endpoint: Endpoint<'_>) -> SyncResult<Value> {
    let url = endpoint.url(&self.base_url)?;
    debug!(%url, "GET");

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| SyncError::Network(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::BAD_REQUEST {
      let body = response.text().await.unwrap_or_default();
      return Err(SyncError::Validation(body));
    }
    if !status.is_success() {
      return Err(SyncError::Network(format!(
        "server responded with status {}",
        status.as_u16()
      )));
    }

    response
      .json::<Value>()
      .await
      .map_err(|e| SyncError::Decode(e.to_string()))
  }

  /// Liveness check. Any failure counts as unreachable.
  pub async fn check_server_status(&self) -> bool {
    let url = match Endpoint::ServerStatus.url(&self.base_url) {
      Ok(url) => url,
      Err(_) => return false,
    };
    match self.http.get(url).send().await {
      Ok(response) => response.status() == StatusCode::OK,
      Err(e) => {
        debug!(error = %e, "server status check failed");
        false
      }
    }
  }

  /// Get the newest posts, paginated
  pub async fn latest_posts(&self, limit: usize, offset: usize) -> SyncResult<Vec<Post>> {
    decode_posts(self.get_json(Endpoint::LatestPosts { limit, offset }).await?)
  }

  /// Free-text search, paginated
  pub async fn search_posts(&self, query: &str, limit: usize, offset: usize) -> SyncResult<Vec<Post>> {
    decode_posts(
      self
        .get_json(Endpoint::SearchPosts { query, limit, offset })
        .await?,
    )
  }

  /// Posts carrying any of `tags`, paginated
  pub async fn filter_posts_by_tags(
    &self,
    tags: &[String],
    limit: usize,
    offset: usize,
  ) -> SyncResult<Vec<Post>> {
    decode_posts(
      self
        .get_json(Endpoint::FilterByTags { tags, limit, offset })
        .await?,
    )
  }

  /// Get a single post, with content
  pub async fn post_by_id(&self, id: &PostId) -> SyncResult<Post> {
    decode_post(self.get_json(Endpoint::PostById(id)).await?)
  }

  /// Get the tag vocabulary
  pub async fn available_tags(&self) -> SyncResult<Vec<String>> {
    decode_tags(self.get_json(Endpoint::TagsAvailable).await?)
  }

  /// Fetch an application document (status and body), for shell validation.
  pub async fn fetch_document(&self, path: &str) -> SyncResult<(u16, String)> {
    let url = self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| SyncError::Network(format!("Invalid document path {}: {}", path, e)))?;

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| SyncError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| SyncError::Network(e.to_string()))?;
    Ok((status, body))
  }
}
