//! Typed failures raised by the fetch adapter and the cache store.
//!
//! Binary-level plumbing (config, startup, command dispatch) uses
//! `color_eyre::Result`; everything the state container has to branch on
//! goes through [`SyncError`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
  /// Request rejected by the server or the server was unreachable.
  #[error("{0}")]
  Network(String),

  /// Malformed filter or search parameters. The server's message is kept verbatim.
  #[error("Bad Request: {0}")]
  Validation(String),

  #[error("Storage unavailable: {0}")]
  StorageUnavailable(String),

  /// The payload did not have the shape of a post (or tag list).
  #[error("Failed to decode response: {0}")]
  Decode(String),

  /// A summary-only post could not be upgraded to its full form.
  #[error("Failed to fetch full content for post {id}: {reason}")]
  Enrichment { id: String, reason: String },
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    SyncError::StorageUnavailable(e.to_string())
  }
}
