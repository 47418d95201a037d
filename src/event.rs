use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::Post;
use crate::cache::CacheResult;
use crate::error::SyncResult;
use crate::query::PageRequest;

/// Completions of background work, delivered back to the store
#[derive(Debug)]
pub enum StoreEvent {
  /// A primary-list page arrived (from the network or the cache)
  PostsPage {
    request: PageRequest,
    result: CacheResult<Vec<Post>>,
  },
  /// A search page arrived for `query`
  SearchPage {
    query: String,
    request: PageRequest,
    result: CacheResult<Vec<Post>>,
  },
  /// The highlights strip arrived
  Highlights(CacheResult<Vec<Post>>),
  /// The tag vocabulary arrived, or failed with nothing cached
  Tags(SyncResult<CacheResult<Vec<String>>>),
  /// The network fetch behind a detail view completed
  DetailLoaded {
    generation: u64,
    result: SyncResult<Post>,
  },
  /// A background revalidation of a visited post completed
  DetailRefreshed {
    generation: u64,
    result: SyncResult<Post>,
  },
}

/// Single channel through which every background task reports back.
///
/// Tasks never touch state themselves; the owner drains this channel and
/// applies each event in turn. A task that panics still reports, as `None`,
/// so the in-flight count always drains.
pub struct EventChannel {
  tx: mpsc::UnboundedSender<Option<StoreEvent>>,
  rx: mpsc::UnboundedReceiver<Option<StoreEvent>>,
  in_flight: usize,
}

impl EventChannel {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx, in_flight: 0 }
  }

  /// Run `future` in the background and deliver its event when done.
  pub fn spawn<F>(&mut self, future: F)
  where
    F: Future<Output = StoreEvent> + Send + 'static,
  {
    self.in_flight += 1;
    let tx = self.tx.clone();
    let task = tokio::spawn(future);
    tokio::spawn(async move {
      let event = match task.await {
        Ok(event) => Some(event),
        Err(e) => {
          warn!(error = %e, "background task failed");
          None
        }
      };
      // Ignore send errors - the store may have been dropped
      let _ = tx.send(event);
    });
  }

  /// Wait for the next completion. `None` when nothing is in flight.
  pub async fn next(&mut self) -> Option<StoreEvent> {
    while self.in_flight > 0 {
      match self.rx.recv().await {
        Some(Some(event)) => {
          self.in_flight -= 1;
          return Some(event);
        }
        Some(None) => self.in_flight -= 1,
        None => return None,
      }
    }
    None
  }

  #[cfg(test)]
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }
}
