use clap::Parser;
use color_eyre::Result;
use std::sync::Arc;
use tracing::warn;

use blogsync::api::{ApiClient, CachedApiClient};
use blogsync::cache::{NoopStorage, SqliteStorage};
use blogsync::prefs::PreferenceStore;
use blogsync::state::Store;
use blogsync::{cli, config, logging};

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }
  if let Some(data_dir) = args.data_dir {
    config.data_dir = Some(data_dir);
  }

  let data_dir = config.data_dir()?;
  let _log_guard = logging::init(&data_dir)?;

  let api = ApiClient::new(&config.api)?;
  let prefs = PreferenceStore::in_dir(&data_dir);

  // Without a cache database the client still works, just never offline
  match SqliteStorage::open(&data_dir.join("cache.db")) {
    Ok(storage) => {
      let store = Store::new(CachedApiClient::new(api, Arc::new(storage)), prefs, &config);
      cli::run(store, &config, args.command).await
    }
    Err(e) => {
      warn!(error = %e, "cache unavailable, continuing without it");
      let store = Store::new(CachedApiClient::new(api, Arc::new(NoopStorage)), prefs, &config);
      cli::run(store, &config, args.command).await
    }
  }
}
