//! Paginated query state machine.
//!
//! A `PageQuery<T>` tracks one paginated result sequence (the primary post
//! list, or the active search) through three phases:
//!
//! - `Idle`: nothing requested yet
//! - `Loading`: a page request is in flight; further `begin_next` calls are ignored
//! - `Settled`: results, a `has_more` flag and the next offset are known
//!
//! The query never performs I/O itself. Callers ask it for a [`PageRequest`],
//! run the fetch wherever they like, and hand the page back to
//! [`PageQuery::settle`]. Every request carries the query's generation at the
//! time it was issued; a page settled against an older generation is stale
//! and is dropped.
//!
//! ```ignore
//! let request = query.begin_initial();
//! let page = client.latest_posts(request.limit, request.offset).await;
//! query.settle(request, page.data, page.is_from_cache(), page.error.map(|e| e.to_string()));
//! ```

use std::collections::HashSet;

use crate::cache::Cacheable;

/// Phase of a paginated query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryPhase {
  /// No page requested yet
  #[default]
  Idle,
  /// A page request is in flight
  Loading,
  /// The last request completed (successfully or from cache)
  Settled,
}

/// A single page request handed out by a [`PageQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub generation: u64,
  pub offset: usize,
  pub limit: usize,
  /// Whether the page extends the current sequence or replaces it
  pub append: bool,
}

/// Pagination state for one result sequence.
#[derive(Debug, Clone)]
pub struct PageQuery<T> {
  items: Vec<T>,
  phase: QueryPhase,
  page_size: usize,
  next_offset: usize,
  has_more: bool,
  error: Option<String>,
  from_cache: bool,
  generation: u64,
}

impl<T: Cacheable> PageQuery<T> {
  pub fn new(page_size: usize) -> Self {
    Self {
      items: Vec::new(),
      phase: QueryPhase::Idle,
      page_size: page_size.max(1),
      next_offset: 0,
      has_more: false,
      error: None,
      from_cache: false,
      generation: 0,
    }
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn phase(&self) -> QueryPhase {
    self.phase
  }

  pub fn is_loading(&self) -> bool {
    self.phase == QueryPhase::Loading
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  #[cfg(test)]
  pub fn next_offset(&self) -> usize {
    self.next_offset
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Whether the last settled page came from the local cache.
  pub fn is_from_cache(&self) -> bool {
    self.from_cache
  }

  /// Start over from page 0, superseding anything in flight.
  ///
  /// Prior results are cleared immediately; the previous error stays visible
  /// until this request settles.
  pub fn begin_initial(&mut self) -> PageRequest {
    self.generation += 1;
    self.items.clear();
    self.next_offset = 0;
    self.has_more = false;
    self.phase = QueryPhase::Loading;

    PageRequest {
      generation: self.generation,
      offset: 0,
      limit: self.page_size,
      append: false,
    }
  }

  /// Request the next page. Only valid once settled with more data to come.
  pub fn begin_next(&mut self) -> Option<PageRequest> {
    if self.phase != QueryPhase::Settled || !self.has_more {
      return None;
    }
    self.phase = QueryPhase::Loading;

    Some(PageRequest {
      generation: self.generation,
      offset: self.next_offset,
      limit: self.page_size,
      append: true,
    })
  }

  /// Apply a completed page. Returns `false` (and changes nothing) when the
  /// request has been superseded.
  ///
  /// Appended pages skip entries already present, so overlapping cache
  /// fallbacks never duplicate posts. `has_more` holds when the page (or,
  /// for cached pages, the newly appended part of it) fills the requested limit.
  pub fn settle(
    &mut self,
    request: PageRequest,
    page: Vec<T>,
    from_cache: bool,
    error: Option<String>,
  ) -> bool {
    if request.generation != self.generation || self.phase != QueryPhase::Loading {
      return false;
    }

    let returned = page.len();
    let added = if request.append {
      let seen: HashSet<String> = self.items.iter().map(Cacheable::cache_key).collect();
      let before = self.items.len();
      self
        .items
        .extend(page.into_iter().filter(|item| !seen.contains(&item.cache_key())));
      self.items.len() - before
    } else {
      self.items = page;
      returned
    };

    self.has_more = if from_cache {
      added == request.limit
    } else {
      returned == request.limit
    };
    self.next_offset = request.offset + request.limit;
    self.from_cache = from_cache;
    self.error = error;
    self.phase = QueryPhase::Settled;
    true
  }

  /// Settle straight away from memoized page-0 results, without a request.
  pub fn settle_cached(&mut self, items: Vec<T>) {
    self.generation += 1;
    self.has_more = items.len() == self.page_size;
    self.items = items;
    self.next_offset = self.page_size;
    self.from_cache = false;
    self.error = None;
    self.phase = QueryPhase::Settled;
  }

  /// Back to `Idle` with nothing shown; in-flight requests become stale.
  pub fn reset(&mut self) {
    self.generation += 1;
    self.items.clear();
    self.next_offset = 0;
    self.has_more = false;
    self.error = None;
    self.from_cache = false;
    self.phase = QueryPhase::Idle;
  }
}
