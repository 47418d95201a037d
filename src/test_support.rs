//! Shared fixtures for unit tests.

use chrono::SecondsFormat;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{ApiClient, CachedApiClient, Post};
use crate::cache::{CacheStorage, SqliteStorage};
use crate::config::{ApiConfig, Config};
use crate::prefs::PreferenceStore;
use crate::state::Store;

/// A base URL nothing is listening on.
pub fn unreachable_base_url() -> String {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);
  format!("http://127.0.0.1:{}", port)
}

/// Wire (snake_case, nested metadata) form of `Post::sample(n, tags)`.
pub fn post_json(n: u32, tags: &[&str]) -> Value {
  let post = Post::sample(n, tags);
  json!({
    "id": n,
    "title": post.title,
    "summary": post.summary,
    "created_at": post.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    "metadata": { "tags": tags }
  })
}

pub fn page_json(range: std::ops::Range<u32>) -> Value {
  Value::Array(range.map(|n| post_json(n, &[])).collect())
}

/// A store over in-memory SQLite, with preferences in a temp dir.
pub fn test_store(base_url: String) -> (Store<SqliteStorage>, tempfile::TempDir) {
  test_store_with(base_url, Arc::new(SqliteStorage::open_in_memory().unwrap()))
}

pub fn test_store_with<S: CacheStorage>(base_url: String, storage: Arc<S>) -> (Store<S>, tempfile::TempDir) {
  let dir = tempfile::tempdir().unwrap();
  let config = Config {
    api: ApiConfig {
      base_url,
      ..ApiConfig::default()
    },
    ..Config::default()
  };
  let api = ApiClient::new(&config.api).unwrap();
  let store = Store::new(
    CachedApiClient::new(api, storage),
    PreferenceStore::in_dir(dir.path()),
    &config,
  );
  (store, dir)
}
