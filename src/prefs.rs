//! User preference persistence, independent of the content cache.
//!
//! Preferences live in a small JSON file in the data directory and are read
//! once at startup. Writes go through a temp file and a rename so a crash
//! never leaves a half-written file behind.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::filter::TagSelection;

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Dark,
  Light,
}

impl Theme {
  pub fn toggled(self) -> Self {
    match self {
      Theme::Dark => Theme::Light,
      Theme::Light => Theme::Dark,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
  pub theme: Theme,
  pub remember_filter: bool,
  /// Last filter selection; only present while `remember_filter` is on
  #[serde(skip_serializing_if = "Option::is_none")]
  pub selected_tags: Option<Vec<String>>,
}

impl Preferences {
  /// Filter selection to start the session with.
  pub fn initial_selection(&self) -> TagSelection {
    match (&self.selected_tags, self.remember_filter) {
      (Some(tags), true) => TagSelection::from_tags(tags.iter().cloned()),
      _ => TagSelection::all(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
  path: PathBuf,
}

impl PreferenceStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn in_dir(data_dir: &Path) -> Self {
    Self::new(data_dir.join(PREFERENCES_FILE))
  }

  #[cfg(test)]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read preferences; a missing or unreadable file yields the defaults.
  pub fn load(&self) -> Preferences {
    let contents = match fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "failed to read preferences, using defaults");
        return Preferences::default();
      }
    };

    serde_json::from_str(&contents).unwrap_or_else(|e| {
      warn!(path = %self.path.display(), error = %e, "corrupt preferences file, using defaults");
      Preferences::default()
    })
  }

  pub fn save(&self, prefs: &Preferences) -> SyncResult<()> {
    let unavailable = |e: std::io::Error| {
      SyncError::StorageUnavailable(format!("{}: {}", self.path.display(), e))
    };

    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(unavailable)?;
    }

    let json = serde_json::to_string_pretty(prefs)
      .map_err(|e| SyncError::StorageUnavailable(e.to_string()))?;

    // Write atomically via temp file
    let temp_path = self.path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(unavailable)?;
    file.write_all(json.as_bytes()).map_err(unavailable)?;
    file.sync_all().map_err(unavailable)?;
    fs::rename(&temp_path, &self.path).map_err(unavailable)?;

    Ok(())
  }
}
