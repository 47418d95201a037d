//! Cache storage trait and SQLite implementation.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::traits::{Cacheable, Collection};
use crate::error::{SyncError, SyncResult};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync + 'static {
  /// Get a single entry by key.
  fn get_one<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> SyncResult<Option<T>>;

  /// Get every entry of a collection, newest sort key first.
  fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> SyncResult<Vec<T>>;

  /// Store a scalar value under an explicit key.
  fn put_value<T: Serialize>(&self, collection: Collection, key: &str, value: &T) -> SyncResult<()>;

  /// Store entities in one transaction. Either all are written or none.
  fn put_many<T: Cacheable>(&self, collection: Collection, entities: &[T]) -> SyncResult<()>;

  /// Store a single entity.
  fn put_one<T: Cacheable>(&self, collection: Collection, entity: &T) -> SyncResult<()> {
    self.put_many(collection, std::slice::from_ref(entity))
  }

  fn delete_one(&self, collection: Collection, key: &str) -> SyncResult<()>;

  fn clear(&self, collection: Collection) -> SyncResult<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when the database cannot be opened - reads miss, writes are discarded.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_one<T: DeserializeOwned>(&self, _collection: Collection, _key: &str) -> SyncResult<Option<T>> {
    Ok(None) // Always miss
  }

  fn get_all<T: DeserializeOwned>(&self, _collection: Collection) -> SyncResult<Vec<T>> {
    Ok(Vec::new())
  }

  fn put_value<T: Serialize>(&self, _collection: Collection, _key: &str, _value: &T) -> SyncResult<()> {
    Ok(()) // Discard
  }

  fn put_many<T: Cacheable>(&self, _collection: Collection, _entities: &[T]) -> SyncResult<()> {
    Ok(()) // Discard
  }

  fn delete_one(&self, _collection: Collection, _key: &str) -> SyncResult<()> {
    Ok(())
  }

  fn clear(&self, _collection: Collection) -> SyncResult<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> SyncResult<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        SyncError::StorageUnavailable(format!("Failed to create cache directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SyncError::StorageUnavailable(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  /// Open a throwaway database that lives as long as this value.
  pub fn open_in_memory() -> SyncResult<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> SyncResult<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> SyncResult<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| SyncError::StorageUnavailable(format!("Failed to run cache migrations: {}", e)))
  }

  fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::StorageUnavailable(format!("Lock poisoned: {}", e)))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per entry, serialized as JSON
CREATE TABLE IF NOT EXISTS cache_entries (
    collection TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    data BLOB NOT NULL,
    sort_key TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, entry_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_sort
    ON cache_entries(collection, sort_key);
"#;

impl CacheStorage for SqliteStorage {
  fn get_one<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> SyncResult<Option<T>> {
    let conn = self.lock()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM cache_entries WHERE collection = ? AND entry_key = ?",
        params![collection.as_str(), key],
        |row| row.get(0),
      )
      .optional()?;

    match data {
      Some(data) => {
        let entity = serde_json::from_slice(&data).map_err(|e| {
          SyncError::StorageUnavailable(format!("Corrupt {} entry {}: {}", collection.as_str(), key, e))
        })?;
        Ok(Some(entity))
      }
      None => Ok(None),
    }
  }

  fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> SyncResult<Vec<T>> {
    let conn = self.lock()?;

    let mut stmt = conn.prepare(
      "SELECT entry_key, data FROM cache_entries
       WHERE collection = ?
       ORDER BY sort_key IS NULL, sort_key DESC, entry_key",
    )?;

    let rows: Vec<(String, Vec<u8>)> = stmt
      .query_map(params![collection.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<Result<_, _>>()?;

    // Unreadable rows are skipped rather than failing the whole read
    let entities = rows
      .into_iter()
      .filter_map(|(key, data)| match serde_json::from_slice(&data) {
        Ok(entity) => Some(entity),
        Err(e) => {
          warn!(collection = collection.as_str(), key = %key, error = %e, "skipping corrupt cache entry");
          None
        }
      })
      .collect();

    Ok(entities)
  }

  fn put_value<T: Serialize>(&self, collection: Collection, key: &str, value: &T) -> SyncResult<()> {
    let data = serde_json::to_vec(value)
      .map_err(|e| SyncError::StorageUnavailable(format!("Failed to serialize {}: {}", key, e)))?;

    self.lock()?.execute(
      "INSERT OR REPLACE INTO cache_entries (collection, entry_key, data, sort_key, cached_at)
       VALUES (?, ?, ?, NULL, datetime('now'))",
      params![collection.as_str(), key, data],
    )?;

    Ok(())
  }

  fn put_many<T: Cacheable>(&self, collection: Collection, entities: &[T]) -> SyncResult<()> {
    // Serialize everything up front so a bad entity aborts before any write
    let rows = entities
      .iter()
      .map(|entity| {
        let data = serde_json::to_vec(entity).map_err(|e| {
          SyncError::StorageUnavailable(format!("Failed to serialize entity: {}", e))
        })?;
        Ok((entity.cache_key(), data, entity.sort_key()))
      })
      .collect::<SyncResult<Vec<_>>>()?;

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO cache_entries (collection, entry_key, data, sort_key, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
      )?;
      for (key, data, sort_key) in &rows {
        stmt.execute(params![collection.as_str(), key, data, sort_key])?;
      }
    }
    tx.commit()?;

    Ok(())
  }

  fn delete_one(&self, collection: Collection, key: &str) -> SyncResult<()> {
    self.lock()?.execute(
      "DELETE FROM cache_entries WHERE collection = ? AND entry_key = ?",
      params![collection.as_str(), key],
    )?;
    Ok(())
  }

  fn clear(&self, collection: Collection) -> SyncResult<()> {
    self.lock()?.execute(
      "DELETE FROM cache_entries WHERE collection = ?",
      params![collection.as_str()],
    )?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use std::collections::HashMap;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Note {
    id: String,
    at: String,
    // Tuple keys cannot be serialized to JSON, which makes the entity fail on demand
    #[serde(default)]
    broken: Option<HashMap<(u8, u8), u8>>,
  }

  impl Note {
    fn new(id: &str, at: &str) -> Self {
      Self {
        id: id.to_string(),
        at: at.to_string(),
        broken: None,
      }
    }
  }

  impl Cacheable for Note {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn sort_key(&self) -> Option<String> {
      Some(self.at.clone())
    }
  }

  fn storage() -> SqliteStorage {
    SqliteStorage::open_in_memory().unwrap()
  }

  #[test]
  fn test_get_all_orders_newest_first() {
    let s = storage();
    s.put_many(
      Collection::Posts,
      &[Note::new("a", "2024-01-01"), Note::new("b", "2024-03-01"), Note::new("c", "2024-02-01")],
    )
    .unwrap();

    let all: Vec<Note> = s.get_all(Collection::Posts).unwrap();
    let ids: Vec<_> = all.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
  }

  #[test]
  fn test_collections_are_independent() {
    let s = storage();
    s.put_one(Collection::Posts, &Note::new("a", "1")).unwrap();
    s.put_one(Collection::Offline, &Note::new("a", "1")).unwrap();

    s.clear(Collection::Posts).unwrap();

    assert!(s.get_one::<Note>(Collection::Posts, "a").unwrap().is_none());
    assert!(s.get_one::<Note>(Collection::Offline, "a").unwrap().is_some());
  }

  #[test]
  fn test_put_one_replaces_existing_entry() {
    let s = storage();
    s.put_one(Collection::Visited, &Note::new("a", "1")).unwrap();
    s.put_one(Collection::Visited, &Note::new("a", "2")).unwrap();

    let all: Vec<Note> = s.get_all(Collection::Visited).unwrap();
    assert_eq!(all, vec![Note::new("a", "2")]);
  }

  #[test]
  fn test_put_many_is_all_or_nothing() {
    let s = storage();
    let mut bad = Note::new("bad", "3");
    bad.broken = Some(HashMap::from([((1, 2), 3)]));

    let result = s.put_many(Collection::Posts, &[Note::new("a", "1"), Note::new("b", "2"), bad]);

    assert!(matches!(result, Err(SyncError::StorageUnavailable(_))));
    assert!(s.get_all::<Note>(Collection::Posts).unwrap().is_empty());
  }

  #[test]
  fn test_settings_values_and_delete() {
    let s = storage();
    s.put_value(Collection::Settings, "tags", &vec!["rust", "sqlite"]).unwrap();

    let tags: Option<Vec<String>> = s.get_one(Collection::Settings, "tags").unwrap();
    assert_eq!(tags, Some(vec!["rust".to_string(), "sqlite".to_string()]));

    s.delete_one(Collection::Settings, "tags").unwrap();
    assert!(s.get_one::<Vec<String>>(Collection::Settings, "tags").unwrap().is_none());
  }

  #[test]
  fn test_open_reports_unavailable_for_bad_path() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the database file should be
    let path = dir.path().join("cache.db");
    std::fs::create_dir_all(&path).unwrap();

    assert!(matches!(
      SqliteStorage::open(&path),
      Err(SyncError::StorageUnavailable(_))
    ));
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let s = NoopStorage;
    s.put_one(Collection::Posts, &Note::new("a", "1")).unwrap();
    assert!(s.get_all::<Note>(Collection::Posts).unwrap().is_empty());
    assert!(s.get_one::<Note>(Collection::Posts, "a").unwrap().is_none());
  }
}
