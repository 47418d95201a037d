//! Reactive application state.
//!
//! [`AppState`] is a plain snapshot: the view layer reads it (directly or
//! through a `watch` subscription) and changes it only by calling actions on
//! [`Store`].

pub mod store;

pub use store::Store;

use std::collections::HashMap;

use crate::api::{Post, PostId};
use crate::filter::TagSelection;
use crate::prefs::{Preferences, Theme};
use crate::query::PageQuery;

#[derive(Debug, Clone)]
pub struct AppState {
  /// Primary post list (latest, or filtered by the selected tags)
  pub posts: PageQuery<Post>,
  /// Newest few posts, fetched once per session
  pub highlights: Vec<Post>,
  pub highlights_loading: bool,
  /// False when the last primary-list page came from the cache
  pub is_server_online: bool,
  /// Result of the last explicit reachability check
  pub last_status_check: Option<bool>,
  pub search: SearchState,
  pub filters: FilterState,
  /// Posts pinned for offline reading
  pub offline_posts: Vec<Post>,
  pub detail: DetailState,
  pub theme: Theme,
}

#[derive(Debug, Clone)]
pub struct SearchState {
  /// Raw text as typed
  pub input: String,
  /// Trimmed query the current results belong to
  pub submitted: Option<String>,
  pub results: PageQuery<Post>,
  /// Page 0 of every query answered by the network this session
  pub cache: HashMap<String, Vec<Post>>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterState {
  pub available_tags: Vec<String>,
  pub tags_loaded: bool,
  pub tags_error: Option<String>,
  pub selected: TagSelection,
  pub remember: bool,
}

/// Where the displayed post came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailSource {
  Offline,
  Visited,
  /// List summary shown while the full post loads
  Summary,
  Network,
}

#[derive(Debug, Clone, Default)]
pub struct DetailState {
  pub id: Option<PostId>,
  pub post: Option<Post>,
  pub source: Option<DetailSource>,
  pub loading: bool,
  pub error: Option<String>,
  pub generation: u64,
}

impl AppState {
  pub fn new(page_size: usize, search_page_size: usize, prefs: &Preferences, offline_posts: Vec<Post>) -> Self {
    Self {
      posts: PageQuery::new(page_size),
      highlights: Vec::new(),
      highlights_loading: false,
      is_server_online: true,
      last_status_check: None,
      search: SearchState {
        input: String::new(),
        submitted: None,
        results: PageQuery::new(search_page_size),
        cache: HashMap::new(),
      },
      filters: FilterState {
        selected: prefs.initial_selection(),
        remember: prefs.remember_filter,
        ..FilterState::default()
      },
      offline_posts,
      detail: DetailState::default(),
      theme: prefs.theme,
    }
  }

  pub fn is_pinned(&self, id: &PostId) -> bool {
    self.offline_posts.iter().any(|p| &p.id == id)
  }
}
