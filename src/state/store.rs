//! The state container and its actions.
//!
//! Every action runs to completion synchronously: it moves the affected slice
//! into `Loading`, spawns the I/O through the store's [`EventChannel`] and
//! returns. Completions come back as [`StoreEvent`]s and are applied by
//! [`Store::handle_event`], which is the only other place state changes.
//! Subscribers see a fresh snapshot after each of those steps.

use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{AppState, DetailSource};
use crate::api::{CachedApiClient, Post, PostId};
use crate::cache::{CacheStorage, Collection};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::SyncError;
use crate::event::{EventChannel, StoreEvent};
use crate::filter::TagSelection;
use crate::prefs::{PreferenceStore, Preferences, Theme};
use crate::query::PageRequest;

pub struct Store<S: CacheStorage> {
  state: AppState,
  client: CachedApiClient<S>,
  prefs_store: PreferenceStore,
  prefs: Preferences,
  highlights_limit: usize,
  min_query_len: usize,
  debouncer: Debouncer<String>,
  events: EventChannel,
  notify: watch::Sender<AppState>,
}

impl<S: CacheStorage> Store<S> {
  /// Build the store, reading preferences and pinned posts once.
  pub fn new(client: CachedApiClient<S>, prefs_store: PreferenceStore, config: &Config) -> Self {
    let prefs = prefs_store.load();
    let offline_posts = client
      .storage()
      .get_all::<Post>(Collection::Offline)
      .unwrap_or_else(|e| {
        warn!(error = %e, "offline posts unavailable");
        Vec::new()
      });

    let state = AppState::new(
      config.paging.page_size,
      config.paging.search_page_size,
      &prefs,
      offline_posts,
    );
    let (notify, _) = watch::channel(state.clone());

    Self {
      state,
      client,
      prefs_store,
      prefs,
      highlights_limit: config.paging.highlights,
      min_query_len: config.search.min_query_len,
      debouncer: Debouncer::new(config.search.debounce()),
      events: EventChannel::new(),
      notify,
    }
  }

  pub fn state(&self) -> &AppState {
    &self.state
  }

  /// Receive a snapshot after every state change.
  pub fn subscribe(&self) -> watch::Receiver<AppState> {
    self.notify.subscribe()
  }

  pub fn client(&self) -> &CachedApiClient<S> {
    &self.client
  }

  fn publish(&self) {
    self.notify.send_replace(self.state.clone());
  }

  // ==========================================================================
  // Event loop
  // ==========================================================================

  /// Apply completions until no background work is left.
  pub async fn settle(&mut self) {
    while let Some(event) = self.events.next().await {
      self.handle_event(event);
    }
  }

  #[cfg(test)]
  pub fn pending_tasks(&self) -> usize {
    self.events.in_flight()
  }

  pub fn handle_event(&mut self, event: StoreEvent) {
    match event {
      StoreEvent::PostsPage { request, result } => {
        let from_cache = result.is_from_cache();
        let error = result.error.map(|e| e.to_string());
        if self.state.posts.settle(request, result.data, from_cache, error) {
          self.state.is_server_online = !from_cache;
        } else {
          debug!(generation = request.generation, "discarding superseded posts page");
        }
      }
      StoreEvent::SearchPage {
        query,
        request,
        result,
      } => {
        if self.state.search.submitted.as_deref() != Some(query.as_str()) {
          debug!(%query, "discarding results for abandoned search");
          return;
        }
        let from_cache = result.is_from_cache();
        let error = result.error.map(|e| e.to_string());
        let memo = (!from_cache && request.offset == 0).then(|| result.data.clone());
        let results = &mut self.state.search.results;
        if !results.settle(request, result.data, from_cache, error) {
          debug!(%query, generation = request.generation, "discarding superseded search page");
          return;
        }
        if let Some(page) = memo {
          self.state.search.cache.insert(query, page);
        }
      }
      StoreEvent::Highlights(result) => {
        if let Some(e) = &result.error {
          warn!(error = %e, "highlights served from cache");
        }
        let mut posts = result.data;
        posts.truncate(self.highlights_limit);
        self.state.highlights = posts;
        self.state.highlights_loading = false;
      }
      StoreEvent::Tags(Ok(result)) => {
        let filters = &mut self.state.filters;
        filters.tags_loaded = !result.is_from_cache();
        filters.tags_error = result.error.map(|e| e.to_string());
        filters.available_tags = result.data;
      }
      StoreEvent::Tags(Err(e)) => {
        warn!(error = %e, "tag vocabulary unavailable");
        self.state.filters.tags_error = Some(e.to_string());
      }
      StoreEvent::DetailLoaded { generation, result } => {
        if generation != self.state.detail.generation {
          debug!(generation, "discarding superseded post detail");
          return;
        }
        self.state.detail.loading = false;
        match result {
          Ok(post) => {
            self.remember_visited(&post);
            let detail = &mut self.state.detail;
            detail.post = Some(post);
            detail.source = Some(DetailSource::Network);
            detail.error = None;
          }
          Err(e) => {
            let detail = &mut self.state.detail;
            if detail.post.is_some() {
              debug!(error = %e, "post fetch failed, keeping summary");
            } else {
              detail.error = Some(e.to_string());
            }
          }
        }
      }
      StoreEvent::DetailRefreshed { generation, result } => match result {
        Ok(post) if generation == self.state.detail.generation => {
          self.remember_visited(&post);
          self.state.detail.post = Some(post);
        }
        Ok(post) => {
          // Detail view moved on; re-cache only
          self.remember_visited(&post);
        }
        Err(e) => debug!(error = %e, "background refresh failed"),
      },
    }
    self.publish();
  }

  // ==========================================================================
  // Primary list
  // ==========================================================================

  /// Load page 0 of the primary list for the current filter, superseding any
  /// request already in flight.
  pub fn fetch_initial_posts(&mut self) {
    let request = self.state.posts.begin_initial();
    self.spawn_posts_page(request);
    self.publish();
  }

  /// Load the following page, if there is one and nothing is loading.
  pub fn fetch_next_page(&mut self) -> bool {
    match self.state.posts.begin_next() {
      Some(request) => {
        self.spawn_posts_page(request);
        self.publish();
        true
      }
      None => {
        debug!(
          loading = self.state.posts.is_loading(),
          has_more = self.state.posts.has_more(),
          "next page not requested"
        );
        false
      }
    }
  }

  fn spawn_posts_page(&mut self, request: PageRequest) {
    let client = self.client.clone();
    let tags = self.state.filters.selected.filter_tags();
    self.events.spawn(async move {
      let result = if tags.is_empty() {
        client.latest_posts(request.limit, request.offset).await
      } else {
        client
          .filter_posts_by_tags(&tags, request.limit, request.offset)
          .await
      };
      StoreEvent::PostsPage { request, result }
    });
  }

  /// Load the highlights strip once per session.
  pub fn fetch_highlights(&mut self) {
    if !self.state.highlights.is_empty() || self.state.highlights_loading {
      return;
    }
    self.state.highlights_loading = true;
    let client = self.client.clone();
    let limit = self.highlights_limit;
    self
      .events
      .spawn(async move { StoreEvent::Highlights(client.latest_posts(limit, 0).await) });
    self.publish();
  }

  // ==========================================================================
  // Search
  // ==========================================================================

  /// Record typed input; it is submitted once the debounce period passes.
  pub fn set_search_query(&mut self, input: &str) {
    self.set_search_query_at(input, Instant::now());
  }

  pub fn set_search_query_at(&mut self, input: &str, now: Instant) {
    self.state.search.input = input.to_string();
    self.debouncer.push(input.to_string(), now);
    self.publish();
  }

  /// When the pending input becomes due, if any.
  pub fn search_deadline(&self) -> Option<Instant> {
    self.debouncer.deadline()
  }

  /// Submit pending input whose quiet period has elapsed.
  pub fn tick(&mut self) -> bool {
    self.tick_at(Instant::now())
  }

  pub fn tick_at(&mut self, now: Instant) -> bool {
    match self.debouncer.poll(now) {
      Some(input) => {
        self.submit_search(&input);
        true
      }
      None => false,
    }
  }

  /// Submit a query right away, dropping any pending debounced input.
  ///
  /// Too-short queries clear the results. A query answered earlier this
  /// session is served from memory; one already loading is left alone.
  pub fn submit_search(&mut self, raw: &str) {
    self.debouncer.cancel();
    let query = raw.trim().to_string();
    let search = &mut self.state.search;

    if query.chars().count() < self.min_query_len {
      search.submitted = None;
      search.results.reset();
      self.publish();
      return;
    }

    if search.submitted.as_deref() == Some(query.as_str()) && search.results.is_loading() {
      debug!(%query, "search already in flight");
      return;
    }

    if let Some(hit) = search.cache.get(&query) {
      debug!(%query, count = hit.len(), "search served from memo");
      let hit = hit.clone();
      search.results.settle_cached(hit);
      search.submitted = Some(query);
      self.publish();
      return;
    }

    let request = search.results.begin_initial();
    search.submitted = Some(query.clone());
    self.spawn_search_page(query, request);
    self.publish();
  }

  pub fn fetch_next_search_page(&mut self) -> bool {
    let Some(query) = self.state.search.submitted.clone() else {
      return false;
    };
    match self.state.search.results.begin_next() {
      Some(request) => {
        self.spawn_search_page(query, request);
        self.publish();
        true
      }
      None => false,
    }
  }

  fn spawn_search_page(&mut self, query: String, request: PageRequest) {
    let client = self.client.clone();
    self.events.spawn(async move {
      let result = client
        .search_posts(&query, request.limit, request.offset)
        .await;
      StoreEvent::SearchPage {
        query,
        request,
        result,
      }
    });
  }

  pub fn clear_search(&mut self) {
    self.debouncer.cancel();
    let search = &mut self.state.search;
    search.input.clear();
    search.submitted = None;
    search.results.reset();
    self.publish();
  }

  // ==========================================================================
  // Tags and filters
  // ==========================================================================

  /// Load the tag vocabulary unless this session already has it.
  pub fn fetch_tags(&mut self) {
    let filters = &self.state.filters;
    if filters.tags_loaded && !filters.available_tags.is_empty() {
      return;
    }
    let client = self.client.clone();
    self
      .events
      .spawn(async move { StoreEvent::Tags(client.available_tags().await) });
  }

  pub fn toggle_tag(&mut self, tag: &str) {
    self.state.filters.selected.toggle(tag);
    self.filters_changed();
  }

  /// Replace the whole selection.
  pub fn apply_filters<I, T>(&mut self, tags: I)
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.state.filters.selected = TagSelection::from_tags(tags);
    self.filters_changed();
  }

  pub fn clear_filters(&mut self) {
    self.state.filters.selected = TagSelection::all();
    self.filters_changed();
  }

  fn filters_changed(&mut self) {
    if self.state.filters.remember {
      self.prefs.selected_tags = Some(self.state.filters.selected.to_vec());
      self.save_prefs();
    }
    self.fetch_initial_posts();
  }

  /// Turning remembering off forgets the saved selection; turning it on saves
  /// the current one.
  pub fn set_remember_filter(&mut self, remember: bool) {
    self.state.filters.remember = remember;
    self.prefs.remember_filter = remember;
    self.prefs.selected_tags = remember.then(|| self.state.filters.selected.to_vec());
    self.save_prefs();
    self.publish();
  }

  // ==========================================================================
  // Preferences
  // ==========================================================================

  pub fn set_theme(&mut self, theme: Theme) {
    self.state.theme = theme;
    self.prefs.theme = theme;
    self.save_prefs();
    self.publish();
  }

  pub fn toggle_theme(&mut self) -> Theme {
    let theme = self.state.theme.toggled();
    self.set_theme(theme);
    theme
  }

  fn save_prefs(&self) {
    if let Err(e) = self.prefs_store.save(&self.prefs) {
      warn!(error = %e, "failed to save preferences");
    }
  }

  // ==========================================================================
  // Offline pins
  // ==========================================================================

  /// Pin or unpin a post. Returns whether it is pinned afterwards.
  ///
  /// Summary-only posts are upgraded to their full form first; if that fails
  /// the summary is pinned instead.
  pub async fn toggle_offline(&mut self, post: Post) -> bool {
    let storage = self.client.storage();

    if self.state.is_pinned(&post.id) {
      if let Err(e) = storage.delete_one(Collection::Offline, post.id.as_str()) {
        warn!(id = %post.id, error = %e, "failed to unpin post from storage");
      }
      self.state.offline_posts.retain(|p| p.id != post.id);
      self.publish();
      return false;
    }

    let post = if post.has_content() {
      post
    } else {
      match self.client.post_by_id(&post.id).await {
        Ok(full) => full,
        Err(e) => {
          let err = SyncError::Enrichment {
            id: post.id.to_string(),
            reason: e.to_string(),
          };
          warn!(error = %err, "pinning summary only");
          post
        }
      }
    };

    if let Err(e) = self.client.storage().put_one(Collection::Offline, &post) {
      warn!(id = %post.id, error = %e, "failed to persist pinned post");
    }
    self.state.offline_posts.push(post);
    self.publish();
    true
  }

  pub fn clear_offline_posts(&mut self) {
    if let Err(e) = self.client.storage().clear(Collection::Offline) {
      warn!(error = %e, "failed to clear offline posts");
    }
    self.state.offline_posts.clear();
    self.publish();
  }

  // ==========================================================================
  // Post detail
  // ==========================================================================

  /// Show a post, preferring local copies.
  ///
  /// 1. a pinned copy with content, no network
  /// 2. a visited copy with content, revalidated in the background
  /// 3. the list summary, while the full post is fetched
  /// 4. the network
  pub fn open_post(&mut self, id: PostId) {
    let detail = &mut self.state.detail;
    detail.generation += 1;
    detail.id = Some(id.clone());
    detail.post = None;
    detail.source = None;
    detail.loading = false;
    detail.error = None;
    let generation = detail.generation;

    if let Some(pinned) = self
      .state
      .offline_posts
      .iter()
      .find(|p| p.id == id && p.has_content())
    {
      self.state.detail.post = Some(pinned.clone());
      self.state.detail.source = Some(DetailSource::Offline);
      self.publish();
      return;
    }

    let visited = self
      .client
      .storage()
      .get_one::<Post>(Collection::Visited, id.as_str());
    match visited {
      Ok(Some(visited)) if visited.has_content() => {
        self.state.detail.post = Some(visited);
        self.state.detail.source = Some(DetailSource::Visited);
        let client = self.client.clone();
        self.events.spawn(async move {
          let result = client.post_by_id(&id).await;
          StoreEvent::DetailRefreshed { generation, result }
        });
        self.publish();
        return;
      }
      Ok(_) => {}
      Err(e) => warn!(error = %e, "visited cache unavailable"),
    }

    if let Some(summary) = self.state.posts.items().iter().find(|p| p.id == id) {
      self.state.detail.post = Some(summary.clone());
      self.state.detail.source = Some(DetailSource::Summary);
    }

    self.state.detail.loading = true;
    let client = self.client.clone();
    self.events.spawn(async move {
      let result = client.post_by_id(&id).await;
      StoreEvent::DetailLoaded { generation, result }
    });
    self.publish();
  }

  /// Look a post up without the network: pinned, then anything on screen,
  /// then the visited and list caches.
  pub fn find_post(&self, id: &PostId) -> Option<Post> {
    let state = &self.state;
    let on_screen = state
      .offline_posts
      .iter()
      .chain(state.posts.items())
      .chain(state.search.results.items())
      .chain(&state.highlights)
      .find(|p| &p.id == id);
    if let Some(post) = on_screen {
      return Some(post.clone());
    }

    let storage = self.client.storage();
    for collection in [Collection::Visited, Collection::Posts] {
      match storage.get_one::<Post>(collection, id.as_str()) {
        Ok(Some(post)) => return Some(post),
        Ok(None) => {}
        Err(e) => warn!(collection = collection.as_str(), error = %e, "cache lookup failed"),
      }
    }
    None
  }

  fn remember_visited(&self, post: &Post) {
    if let Err(e) = self.client.storage().put_one(Collection::Visited, post) {
      warn!(id = %post.id, error = %e, "failed to cache visited post");
    }
  }

  // ==========================================================================
  // Cache and reachability
  // ==========================================================================

  /// Drop cached posts and visited posts. Pinned posts are kept.
  pub fn clear_cache(&mut self) {
    let storage = self.client.storage();
    for collection in [Collection::Posts, Collection::Visited] {
      if let Err(e) = storage.clear(collection) {
        warn!(collection = collection.as_str(), error = %e, "failed to clear cache");
      }
    }
    self.state.posts.reset();
    self.state.highlights.clear();
    self.state.search.cache.clear();
    self.state.filters.tags_loaded = false;
    info!("cache cleared");
    self.publish();
  }

  /// Check the server and record the answer.
  pub async fn check_server_status(&mut self) -> bool {
    let online = self.client.check_server_status().await;
    self.state.last_status_check = Some(online);
    self.publish();
    online
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{NoopStorage, SqliteStorage};
  use crate::query::QueryPhase;
  use crate::test_support::{page_json, post_json, test_store, test_store_with, unreachable_base_url};
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|p| p.id.to_string()).collect()
  }

  #[tokio::test]
  async fn test_initial_load_fills_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .and(query_param("offset", "0"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..20)))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    assert!(store.state().posts.is_loading());
    store.settle().await;

    let posts = &store.state().posts;
    assert_eq!(posts.items().len(), 20);
    assert!(posts.has_more());
    assert!(store.state().is_server_online);
    assert_eq!(posts.error(), None);
  }

  #[tokio::test]
  async fn test_next_page_appends_and_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .and(query_param("offset", "0"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..20)))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .and(query_param("offset", "20"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(20..27)))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    store.settle().await;

    assert!(store.fetch_next_page());
    // Second request while loading is ignored
    assert!(!store.fetch_next_page());
    store.settle().await;

    assert_eq!(store.state().posts.items().len(), 27);
    assert!(!store.state().posts.has_more());
    assert!(!store.fetch_next_page());
  }

  #[tokio::test]
  async fn test_unreachable_network_serves_cached_page() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let cached: Vec<Post> = (0..20).map(|n| Post::sample(n, &[])).collect();
    storage.put_many(Collection::Posts, &cached).unwrap();

    let (mut store, _dir) = test_store_with(unreachable_base_url(), storage);
    store.fetch_initial_posts();
    store.settle().await;

    let state = store.state();
    let mut expected = ids(&cached);
    expected.reverse();
    assert_eq!(ids(state.posts.items()), expected);
    assert!(!state.is_server_online);
    assert!(state.posts.is_from_cache());
    assert!(state.posts.error().is_some());
  }

  #[tokio::test]
  async fn test_server_error_text_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    store.settle().await;

    assert_eq!(
      store.state().posts.error(),
      Some("server responded with status 503")
    );
    assert!(!store.state().is_server_online);
    assert!(store.state().posts.items().is_empty());
  }

  #[tokio::test]
  async fn test_recovery_clears_error_and_restores_online() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .respond_with(ResponseTemplate::new(500))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..3)))
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    store.settle().await;
    assert!(!store.state().is_server_online);

    store.fetch_initial_posts();
    store.settle().await;
    assert!(store.state().is_server_online);
    assert_eq!(store.state().posts.error(), None);
    assert_eq!(store.state().posts.items().len(), 3);
  }

  #[tokio::test]
  async fn test_rejected_filter_keeps_server_online() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/filter"))
      .respond_with(ResponseTemplate::new(400).set_body_string("invalid tag list"))
      .mount(&server)
      .await;

    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.put_one(Collection::Posts, &Post::sample(1, &["rust"])).unwrap();

    let (mut store, _dir) = test_store_with(server.uri(), storage);
    store.toggle_tag("rust");
    store.settle().await;

    let state = store.state();
    assert!(state.is_server_online);
    assert!(!state.posts.is_from_cache());
    assert!(state.posts.items().is_empty());
    assert!(!state.posts.has_more());
    assert_eq!(state.posts.error(), Some("Bad Request: invalid tag list"));
  }

  #[tokio::test]
  async fn test_superseded_filter_response_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(page_json(0..20))
          .set_delay(Duration::from_millis(200)),
      )
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/filter"))
      .and(query_param("tags", "rust"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json(42, &["rust"])])))
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    store.toggle_tag("rust");
    store.settle().await;

    assert_eq!(ids(store.state().posts.items()), vec!["42"]);
    assert!(!store.state().posts.has_more());
  }

  #[tokio::test]
  async fn test_highlights_requested_once_while_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .and(query_param("limit", "5"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(page_json(0..5))
          .set_delay(Duration::from_millis(100)),
      )
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_highlights();
    store.fetch_highlights();
    assert!(store.state().highlights_loading);
    assert_eq!(store.pending_tasks(), 1);
    store.settle().await;

    assert_eq!(store.state().highlights.len(), 5);
    assert!(!store.state().highlights_loading);
    store.fetch_highlights();
    assert_eq!(store.pending_tasks(), 0);
  }

  #[tokio::test]
  async fn test_search_memo_avoids_second_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/search"))
      .and(query_param("q", "rust"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..4)))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.submit_search("rust");
    store.settle().await;
    assert_eq!(store.state().search.results.items().len(), 4);

    store.clear_search();
    store.submit_search("  rust ");
    assert_eq!(store.state().search.results.phase(), QueryPhase::Settled);
    assert_eq!(store.state().search.results.items().len(), 4);
    assert_eq!(store.pending_tasks(), 0);
  }

  #[tokio::test]
  async fn test_short_query_clears_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/search"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..2)))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.submit_search("blog");
    store.settle().await;
    assert_eq!(store.state().search.results.items().len(), 2);

    store.submit_search(" ab ");
    assert_eq!(store.pending_tasks(), 0);
    assert!(store.state().search.results.items().is_empty());
    assert_eq!(store.state().search.submitted, None);
  }

  #[tokio::test]
  async fn test_debounce_submits_only_final_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/search"))
      .and(query_param("q", "offline"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..1)))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/search"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(0)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    let start = Instant::now();
    let ms = Duration::from_millis;
    for (i, input) in ["off", "offl", "offli", "offlin", "offline"].iter().enumerate() {
      let at = start + ms(100 * i as u64);
      store.set_search_query_at(input, at);
      assert!(!store.tick_at(at + ms(50)));
    }
    assert_eq!(store.pending_tasks(), 0);

    assert!(store.tick_at(start + ms(400 + 500)));
    store.settle().await;
    assert_eq!(store.state().search.submitted.as_deref(), Some("offline"));
    assert_eq!(store.state().search.results.items().len(), 1);
  }

  #[tokio::test]
  async fn test_offline_search_is_not_memoized() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage
      .put_many(Collection::Posts, &[Post::sample(1, &[]), Post::sample(2, &[])])
      .unwrap();

    let (mut store, _dir) = test_store_with(unreachable_base_url(), storage);
    store.submit_search("post 2");
    store.settle().await;

    assert_eq!(ids(store.state().search.results.items()), vec!["2"]);
    assert!(store.state().search.cache.is_empty());
    // Search fallback does not touch primary-list reachability
    assert!(store.state().is_server_online);
  }

  #[tokio::test]
  async fn test_toggle_offline_twice_restores_membership() {
    let (mut store, _dir) = test_store(unreachable_base_url());
    let post = Post::sample(1, &[]).with_content("full");

    assert!(store.toggle_offline(post.clone()).await);
    assert!(store.state().is_pinned(&post.id));
    assert!(!store.toggle_offline(post.clone()).await);
    assert!(!store.state().is_pinned(&post.id));

    let stored: Vec<Post> = store.client().storage().get_all(Collection::Offline).unwrap();
    assert!(stored.is_empty());
  }

  #[tokio::test]
  async fn test_pin_summary_fetches_full_content() {
    let server = MockServer::start().await;
    let mut full = post_json(1, &["rust"]);
    full["content"] = json!("# Full body");
    Mock::given(method("GET"))
      .and(path("/api/posts/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(full))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    assert!(store.toggle_offline(Post::sample(1, &["rust"])).await);

    let pinned = &store.state().offline_posts[0];
    assert_eq!(pinned.content.as_deref(), Some("# Full body"));
    let stored: Option<Post> = store.client().storage().get_one(Collection::Offline, "1").unwrap();
    assert!(stored.unwrap().has_content());
  }

  #[tokio::test]
  async fn test_pin_while_offline_keeps_summary() {
    let (mut store, _dir) = test_store(unreachable_base_url());
    let summary = Post::sample(1, &[]);

    assert!(store.toggle_offline(summary.clone()).await);
    assert_eq!(store.state().offline_posts, vec![summary]);
  }

  #[tokio::test]
  async fn test_find_post_uses_cached_summary() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.put_one(Collection::Posts, &Post::sample(5, &[])).unwrap();

    let (store, _dir) = test_store_with(unreachable_base_url(), storage);
    assert_eq!(store.find_post(&PostId::new("5")), Some(Post::sample(5, &[])));
    assert_eq!(store.find_post(&PostId::new("6")), None);
  }

  #[tokio::test]
  async fn test_store_without_storage_degrades_quietly() {
    let (mut store, _dir) = test_store_with(unreachable_base_url(), Arc::new(NoopStorage));
    store.fetch_initial_posts();
    store.settle().await;

    let state = store.state();
    assert!(state.posts.is_from_cache());
    assert!(state.posts.items().is_empty());
    assert!(!state.is_server_online);

    let summary = Post::sample(1, &[]);
    assert!(store.toggle_offline(summary.clone()).await);
    assert_eq!(store.state().offline_posts, vec![summary.clone()]);
    assert_eq!(store.state().detail.error, None);

    assert!(!store.toggle_offline(summary).await);
    assert!(store.state().offline_posts.is_empty());
  }

  #[tokio::test]
  async fn test_pinned_posts_survive_restart_and_cache_clear() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let (mut store, _dir) = test_store_with(unreachable_base_url(), storage.clone());
    store.toggle_offline(Post::sample(1, &[]).with_content("x")).await;
    store.clear_cache();

    let (store, _dir) = test_store_with(unreachable_base_url(), storage);
    assert!(store.state().is_pinned(&PostId::new("1")));
  }

  #[tokio::test]
  async fn test_detail_prefers_pinned_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(post_json(1, &[])))
      .expect(0)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store
      .toggle_offline(Post::sample(1, &[]).with_content("pinned"))
      .await;
    store.open_post(PostId::new("1"));

    let detail = &store.state().detail;
    assert_eq!(detail.source, Some(DetailSource::Offline));
    assert_eq!(store.pending_tasks(), 0);
  }

  #[tokio::test]
  async fn test_detail_revalidates_visited_copy() {
    let server = MockServer::start().await;
    let mut fresh = post_json(1, &[]);
    fresh["content"] = json!("fresh");
    Mock::given(method("GET"))
      .and(path("/api/posts/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fresh))
      .expect(1)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store
      .client()
      .storage()
      .put_one(Collection::Visited, &Post::sample(1, &[]).with_content("stale"))
      .unwrap();

    store.open_post(PostId::new("1"));
    assert_eq!(store.state().detail.source, Some(DetailSource::Visited));
    assert_eq!(
      store.state().detail.post.as_ref().unwrap().content.as_deref(),
      Some("stale")
    );

    store.settle().await;
    assert_eq!(
      store.state().detail.post.as_ref().unwrap().content.as_deref(),
      Some("fresh")
    );
    let cached: Option<Post> = store.client().storage().get_one(Collection::Visited, "1").unwrap();
    assert_eq!(cached.unwrap().content.as_deref(), Some("fresh"));
  }

  #[tokio::test]
  async fn test_detail_failure_keeps_summary_silently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/posts/latest"))
      .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0..3)))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/1"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/posts/9"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_initial_posts();
    store.settle().await;

    store.open_post(PostId::new("1"));
    assert_eq!(store.state().detail.source, Some(DetailSource::Summary));
    store.settle().await;
    assert!(store.state().detail.post.is_some());
    assert_eq!(store.state().detail.error, None);
    assert!(!store.state().detail.loading);

    store.open_post(PostId::new("9"));
    store.settle().await;
    assert!(store.state().detail.post.is_none());
    assert_eq!(
      store.state().detail.error.as_deref(),
      Some("server responded with status 500")
    );
  }

  #[tokio::test]
  async fn test_detail_network_result_is_cached_as_visited() {
    let server = MockServer::start().await;
    let mut full = post_json(5, &[]);
    full["content"] = json!("body");
    Mock::given(method("GET"))
      .and(path("/api/posts/5"))
      .respond_with(ResponseTemplate::new(200).set_body_json(full))
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.open_post(PostId::new("5"));
    store.settle().await;

    assert_eq!(store.state().detail.source, Some(DetailSource::Network));
    let visited: Option<Post> = store.client().storage().get_one(Collection::Visited, "5").unwrap();
    assert!(visited.unwrap().has_content());
  }

  #[tokio::test]
  async fn test_remembered_filter_is_persisted() {
    let (mut store, dir) = test_store(unreachable_base_url());
    store.toggle_tag("rust");
    let prefs = PreferenceStore::in_dir(dir.path()).load();
    assert_eq!(prefs.selected_tags, None);

    store.set_remember_filter(true);
    store.toggle_tag("web");
    let prefs = PreferenceStore::in_dir(dir.path()).load();
    assert!(prefs.remember_filter);
    assert_eq!(prefs.selected_tags, Some(vec!["rust".to_string(), "web".to_string()]));

    store.set_remember_filter(false);
    let prefs = PreferenceStore::in_dir(dir.path()).load();
    assert_eq!(prefs.selected_tags, None);
    store.settle().await;
  }

  #[tokio::test]
  async fn test_tags_fetched_once_per_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/tags/available"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!(["rust", "pwa"])))
      .expect(2)
      .mount(&server)
      .await;

    let (mut store, _dir) = test_store(server.uri());
    store.fetch_tags();
    store.settle().await;
    store.fetch_tags();
    assert_eq!(store.pending_tasks(), 0);
    assert_eq!(store.state().filters.available_tags, vec!["rust", "pwa"]);

    store.clear_cache();
    store.fetch_tags();
    store.settle().await;
  }

  #[tokio::test]
  async fn test_subscribers_see_snapshots() {
    let (mut store, _dir) = test_store(unreachable_base_url());
    let mut rx = store.subscribe();
    store.set_theme(Theme::Light);
    assert!(rx.has_changed().unwrap());
    let snapshot: AppState = rx.borrow_and_update().clone();
    assert_eq!(snapshot.theme, Theme::Light);
    assert_eq!(store.toggle_theme(), Theme::Dark);
  }
}
