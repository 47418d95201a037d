//! API client wrapped with write-through caching and offline fallback.

use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult, CacheStorage};
use crate::error::SyncResult;

use super::client::ApiClient;
use super::types::{Post, PostId};

/// Settings key holding the last successfully fetched tag vocabulary.
pub const TAGS_KEY: &str = "tags";

/// Blog API client with transparent caching support.
///
/// List fetches never fail: on any error they return the best cached snapshot
/// from the `posts` collection, tagged as offline and carrying the error.
/// Single-post fetches propagate errors; the tag vocabulary falls back to the
/// last known copy.
pub struct CachedApiClient<S: CacheStorage> {
  inner: ApiClient,
  cache: CacheLayer<S>,
}

impl<S: CacheStorage> CachedApiClient<S> {
  pub fn new(inner: ApiClient, storage: Arc<S>) -> Self {
    Self {
      inner,
      cache: CacheLayer::new(storage),
    }
  }

  pub fn storage(&self) -> &Arc<S> {
    self.cache.storage()
  }

  pub fn api(&self) -> &ApiClient {
    &self.inner
  }

  /// Newest posts; falls back to every cached post.
  pub async fn latest_posts(&self, limit: usize, offset: usize) -> CacheResult<Vec<Post>> {
    self
      .cache
      .fetch_list(|| self.inner.latest_posts(limit, offset), |_| true)
      .await
  }

  /// Search; falls back to cached posts whose title or summary matches.
  pub async fn search_posts(&self, query: &str, limit: usize, offset: usize) -> CacheResult<Vec<Post>> {
    self
      .cache
      .fetch_list(
        || self.inner.search_posts(query, limit, offset),
        |post: &Post| post.matches_query(query),
      )
      .await
  }

  /// Tag filter; falls back to cached posts carrying any of the tags.
  pub async fn filter_posts_by_tags(
    &self,
    tags: &[String],
    limit: usize,
    offset: usize,
  ) -> CacheResult<Vec<Post>> {
    self
      .cache
      .fetch_list(
        || self.inner.filter_posts_by_tags(tags, limit, offset),
        |post: &Post| post.has_any_tag(tags),
      )
      .await
  }

  /// Full post by id (not cached here - the caller decides where it goes).
  pub async fn post_by_id(&self, id: &PostId) -> SyncResult<Post> {
    self.inner.post_by_id(id).await
  }

  /// Tag vocabulary, falling back to the last one seen.
  pub async fn available_tags(&self) -> SyncResult<CacheResult<Vec<String>>> {
    self
      .cache
      .fetch_setting(TAGS_KEY, || self.inner.available_tags())
      .await
  }

  pub async fn check_server_status(&self) -> bool {
    self.inner.check_server_status().await
  }
}

impl<S: CacheStorage> Clone for CachedApiClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}
