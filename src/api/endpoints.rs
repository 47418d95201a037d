//! Content endpoints of the blog API.

use url::Url;

use super::types::PostId;
use crate::error::{SyncError, SyncResult};

/// The fixed set of endpoints the client reads from.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
  ServerStatus,
  LatestPosts { limit: usize, offset: usize },
  SearchPosts { query: &'a str, limit: usize, offset: usize },
  FilterByTags { tags: &'a [String], limit: usize, offset: usize },
  PostById(&'a PostId),
  TagsAvailable,
}

impl Endpoint<'_> {
  /// Build the absolute URL for this endpoint. `base` must end with a slash.
  pub fn url(&self, base: &Url) -> SyncResult<Url> {
    let mut url = base.join(self.path()).map_err(invalid_url)?;

    match *self {
      Endpoint::LatestPosts { limit, offset } => {
        url
          .query_pairs_mut()
          .append_pair("limit", &limit.to_string())
          .append_pair("offset", &offset.to_string());
      }
      Endpoint::SearchPosts { query, limit, offset } => {
        url
          .query_pairs_mut()
          .append_pair("q", query)
          .append_pair("limit", &limit.to_string())
          .append_pair("offset", &offset.to_string());
      }
      Endpoint::FilterByTags { tags, limit, offset } => {
        url
          .query_pairs_mut()
          .append_pair("tags", &tags.join(","))
          .append_pair("limit", &limit.to_string())
          .append_pair("offset", &offset.to_string());
      }
      Endpoint::PostById(id) => {
        url
          .path_segments_mut()
          .map_err(|_| SyncError::Network(format!("Base URL cannot carry a path: {}", base)))?
          .pop_if_empty()
          .push(id.as_str());
      }
      Endpoint::ServerStatus | Endpoint::TagsAvailable => {}
    }

    Ok(url)
  }

  fn path(&self) -> &'static str {
    match self {
      Endpoint::ServerStatus => "api/is_server_active",
      Endpoint::LatestPosts { .. } => "api/posts/latest",
      Endpoint::SearchPosts { .. } => "api/posts/search",
      Endpoint::FilterByTags { .. } => "api/posts/filter",
      Endpoint::PostById(_) => "api/posts/",
      Endpoint::TagsAvailable => "api/tags/available",
    }
  }
}

fn invalid_url(e: url::ParseError) -> SyncError {
  SyncError::Network(format!("Invalid request URL: {}", e))
}

/// Make sure joins append to the base path instead of replacing its last segment.
pub fn with_trailing_slash(mut base: Url) -> Url {
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base
}

/// Resolve a media reference (cover image, embedded asset) against the API base.
///
/// Absolute, protocol-relative and `data:` references are returned unchanged.
/// Root-relative references stay under the base path.
pub fn resolve_media_url(base: &Url, reference: &str) -> Option<String> {
  let reference = reference.trim();
  if reference.is_empty() {
    return None;
  }
  if reference.starts_with("http://")
    || reference.starts_with("https://")
    || reference.starts_with("//")
    || reference.starts_with("data:")
  {
    return Some(reference.to_string());
  }
  with_trailing_slash(base.clone())
    .join(reference.trim_start_matches('/'))
    .ok()
    .map(String::from)
}
