//! Persistent cache store for offline reading.
//!
//! This module provides a small set of independent collections on top of
//! SQLite:
//! - `posts`: recently fetched summaries, written through by every list fetch
//! - `visited`: full-content posts the user has opened
//! - `offline`: posts pinned for disconnected reading
//! - `settings`: scalar values such as the last known tag vocabulary
//!
//! If the database cannot be opened, [`NoopStorage`] stands in and every
//! read misses.

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, Collection};
