//! Cache layer that orchestrates network fetching with cache fallback.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, Collection};
use crate::error::{SyncError, SyncResult};

/// Cache layer that manages write-through caching and offline fallback.
///
/// This layer sits between the application and the network client. Fetches
/// always go to the network first; the cache is only read when the network
/// fails.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer over a shared storage backend.
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Fetch a list with network-first strategy.
  ///
  /// 1. Fetch from network; on success write every entity to `posts`
  /// 2. A validation failure is the server's answer: it comes back as an empty
  ///    network result carrying the error, with no fallback
  /// 3. On any other failure, return the cached `posts` entries accepted by
  ///    `keep`, tagged as offline and carrying the original error
  ///
  /// Storage failures on either path are logged and treated as an empty cache.
  pub async fn fetch_list<T, F, Fut, K>(&self, fetcher: F, keep: K) -> CacheResult<Vec<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
    K: Fn(&T) -> bool,
  {
    match fetcher().await {
      Ok(data) => {
        if let Err(e) = self.storage.put_many(Collection::Posts, &data) {
          warn!(error = %e, "write-through to posts cache failed");
        }
        CacheResult::from_network(data)
      }
      Err(err @ SyncError::Validation(_)) => {
        info!(error = %err, "request rejected by server");
        CacheResult::rejected(Vec::new(), err)
      }
      Err(err) => {
        let cached = self
          .storage
          .get_all::<T>(Collection::Posts)
          .unwrap_or_else(|e| {
            warn!(error = %e, "posts cache unavailable during fallback");
            Vec::new()
          });
        let data: Vec<T> = cached.into_iter().filter(|entity| keep(entity)).collect();
        info!(count = data.len(), error = %err, "network fetch failed, serving cached posts");
        CacheResult::offline(data, err)
      }
    }
  }

  /// Fetch a scalar value, remembering the last good copy under `settings/key`.
  ///
  /// Fails only when the network fails and no copy was ever stored.
  pub async fn fetch_setting<T, F, Fut>(&self, key: &str, fetcher: F) -> SyncResult<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
  {
    match fetcher().await {
      Ok(value) => {
        if let Err(e) = self.storage.put_value(Collection::Settings, key, &value) {
          warn!(key, error = %e, "failed to remember setting");
        }
        Ok(CacheResult::from_network(value))
      }
      Err(err) => match self.storage.get_one::<T>(Collection::Settings, key) {
        Ok(Some(cached)) => {
          info!(key, error = %err, "network fetch failed, serving remembered setting");
          Ok(CacheResult::offline(cached, err))
        }
        Ok(None) => Err(err),
        Err(e) => {
          warn!(key, error = %e, "settings cache unavailable during fallback");
          Err(err)
        }
      },
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}
