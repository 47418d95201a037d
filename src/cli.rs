//! Command-line front end. Reads the store's state and calls its actions.

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

use crate::api::{Post, PostId};
use crate::cache::CacheStorage;
use crate::config::Config;
use crate::prefs::Theme;
use crate::shell;
use crate::state::{AppState, Store};

#[derive(Parser, Debug)]
#[command(name = "blogsync")]
#[command(about = "Offline-first reader for a blog API")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/blogsync/config.yaml)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  pub base_url: Option<String>,

  /// Directory for the cache database, preferences and logs
  #[arg(long)]
  pub data_dir: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List posts, newest first
  List {
    /// Only posts carrying any of these tags (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,
    /// Drop the remembered filter and list everything
    #[arg(long, conflicts_with = "tags")]
    all: bool,
    /// Number of pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Show the newest few posts
  Highlights,
  /// Search posts by title and summary
  Search {
    query: String,
    /// Number of result pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Show a single post
  Show { id: String },
  /// Pin a post for offline reading, or unpin it
  Pin { id: String },
  /// List pinned posts
  Pinned,
  /// List available tags
  Tags,
  /// Clear cached posts (pinned posts are kept unless --offline)
  ClearCache {
    #[arg(long)]
    offline: bool,
  },
  /// Remember the tag filter between runs
  Remember {
    #[arg(value_enum)]
    switch: Switch,
  },
  /// Set the theme, or toggle it when omitted
  Theme {
    #[arg(value_enum)]
    theme: Option<ThemeArg>,
  },
  /// Check whether the server is reachable
  Status,
  /// Check that a navigation document is a cacheable application page
  CheckShell {
    #[arg(default_value = "/")]
    path: String,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Switch {
  On,
  Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ThemeArg {
  Dark,
  Light,
}

impl From<ThemeArg> for Theme {
  fn from(arg: ThemeArg) -> Self {
    match arg {
      ThemeArg::Dark => Theme::Dark,
      ThemeArg::Light => Theme::Light,
    }
  }
}

pub async fn run<S: CacheStorage>(mut store: Store<S>, config: &Config, command: Command) -> Result<()> {
  match command {
    Command::List { tags, all, pages } => {
      if !tags.is_empty() {
        store.apply_filters(tags);
      } else if all {
        store.clear_filters();
      } else {
        store.fetch_initial_posts();
      }
      store.settle().await;
      for _ in 1..pages {
        if !store.fetch_next_page() {
          break;
        }
        store.settle().await;
      }

      let state = store.state();
      if !state.filters.selected.is_all() {
        println!("Filter: {}", state.filters.selected.filter_tags().join(", "));
      }
      print_offline_notice(state, state.posts.is_from_cache(), state.posts.error());
      print_posts(state, state.posts.items());
      if state.posts.has_more() {
        println!("(more available, use --pages)");
      }
    }
    Command::Highlights => {
      store.fetch_highlights();
      store.settle().await;
      let state = store.state();
      print_posts(state, &state.highlights);
    }
    Command::Search { query, pages } => {
      store.set_search_query(&query);
      if let Some(deadline) = store.search_deadline() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
      }
      store.tick();
      store.settle().await;
      for _ in 1..pages {
        if !store.fetch_next_search_page() {
          break;
        }
        store.settle().await;
      }

      let state = store.state();
      if state.search.submitted.is_none() {
        println!(
          "Query too short (at least {} characters)",
          config.search.min_query_len
        );
        return Ok(());
      }
      let results = &state.search.results;
      print_offline_notice(state, results.is_from_cache(), results.error());
      print_posts(state, results.items());
    }
    Command::Show { id } => {
      let post = resolve_post(&mut store, id).await?;
      println!("{}", post.title);
      println!(
        "{} | {} | {}",
        post.author,
        post.created_at.format("%Y-%m-%d"),
        post.tags.join(", ")
      );
      if let Some(cover) = post.cover_image_url(store.client().api().base_url()) {
        println!("Cover: {}", cover);
      }
      println!();
      match &post.content {
        Some(content) if post.has_content() => println!("{}", content),
        _ => println!("{}\n\n(full content unavailable offline)", post.summary),
      }
    }
    Command::Pin { id } => {
      // Any local copy will do; toggling upgrades summaries when it can
      let post = match store.find_post(&PostId::new(id.clone())) {
        Some(post) => post,
        None => resolve_post(&mut store, id).await?,
      };
      let title = post.title.clone();
      if store.toggle_offline(post).await {
        println!("Pinned: {}", title);
      } else {
        println!("Unpinned: {}", title);
      }
    }
    Command::Pinned => {
      let state = store.state();
      if state.offline_posts.is_empty() {
        println!("No pinned posts");
      }
      print_posts(state, &state.offline_posts);
    }
    Command::Tags => {
      store.fetch_tags();
      store.settle().await;
      let filters = &store.state().filters;
      if let Some(error) = &filters.tags_error {
        eprintln!("Warning: {}", error);
      }
      for tag in &filters.available_tags {
        let marker = if filters.selected.contains(tag) { "*" } else { " " };
        println!("{} {}", marker, tag);
      }
    }
    Command::ClearCache { offline } => {
      store.clear_cache();
      if offline {
        store.clear_offline_posts();
      }
      println!("Cache cleared");
    }
    Command::Remember { switch } => {
      let remember = matches!(switch, Switch::On);
      store.set_remember_filter(remember);
      println!("Remember filter: {}", if remember { "on" } else { "off" });
    }
    Command::Theme { theme } => {
      let theme = match theme {
        Some(theme) => {
          let theme = Theme::from(theme);
          store.set_theme(theme);
          theme
        }
        None => store.toggle_theme(),
      };
      println!("Theme: {:?}", theme);
    }
    Command::Status => {
      let online = store.check_server_status().await;
      println!("Server: {}", if online { "online" } else { "unreachable" });
    }
    Command::CheckShell { path } => {
      let ok = shell::check_navigation(store.client().api(), &path, &config.shell.app_marker).await?;
      if ok {
        println!("{} is a cacheable application document", path);
      } else {
        println!("{} is not an application document; it must not be cached", path);
      }
    }
  }

  Ok(())
}

/// Open a post through the store and wait for its best available form.
async fn resolve_post<S: CacheStorage>(store: &mut Store<S>, id: String) -> Result<Post> {
  store.open_post(PostId::new(id.clone()));
  store.settle().await;
  let detail = &store.state().detail;
  match (&detail.post, &detail.error) {
    (Some(post), _) => Ok(post.clone()),
    (None, Some(error)) => Err(eyre!("Failed to load post {}: {}", id, error)),
    (None, None) => Err(eyre!("Post {} not found", id)),
  }
}

fn print_offline_notice(state: &AppState, from_cache: bool, error: Option<&str>) {
  if from_cache {
    eprintln!(
      "Offline: showing cached posts ({})",
      error.unwrap_or("server unreachable")
    );
  } else if let Some(error) = error {
    eprintln!("Error: {}", error);
  }
  if !state.is_server_online && !from_cache {
    eprintln!("Server was unreachable on the last list load");
  }
}

fn print_posts(state: &AppState, posts: &[Post]) {
  for post in posts {
    let pin = if state.is_pinned(&post.id) { "*" } else { " " };
    let tags = if post.tags.is_empty() {
      String::new()
    } else {
      format!("  [{}]", post.tags.join(", "))
    };
    println!(
      "{} {:>6}  {}  {}{}",
      pin,
      post.id.as_str(),
      post.created_at.format("%Y-%m-%d"),
      post.title,
      tags
    );
  }
}
