//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::SyncError;

/// Trait for entities that can be cached.
///
/// Implementors provide a unique cache key and optionally a sort key used to
/// order `get_all` results (newest first).
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity within its collection (e.g. post id)
  fn cache_key(&self) -> String;

  /// Ordering key, compared lexicographically. Entries without one sort last.
  fn sort_key(&self) -> Option<String>;
}

/// The independently addressable collections of the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  /// Recently fetched post summaries (write-through from list fetches)
  Posts,
  /// Full-content posts the user has opened
  Visited,
  /// Posts pinned by the user for offline reading
  Offline,
  /// Scalar key/value settings, e.g. the last known tag vocabulary
  Settings,
}

impl Collection {
  pub fn as_str(&self) -> &'static str {
    match self {
      Collection::Posts => "posts",
      Collection::Visited => "visited",
      Collection::Offline => "offline",
      Collection::Settings => "settings",
    }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// The failure that forced a cache fallback, kept for display
  pub error: Option<SyncError>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      error: None,
    }
  }

  /// The server answered but refused the request; nothing is served from cache.
  pub fn rejected(data: T, error: SyncError) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      error: Some(error),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, error: SyncError) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      error: Some(error),
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source == CacheSource::Offline
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Network unavailable, serving cached data
  Offline,
}
