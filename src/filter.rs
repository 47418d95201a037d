//! Tag filter selection.

use std::collections::BTreeSet;

/// The "no filter" sentinel tag.
pub const ALL_TAG: &str = "All";

/// A set of selected tags that is either exactly `{All}` or a non-empty set
/// without `All`. Every constructor and mutation keeps that shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelection(BTreeSet<String>);

impl Default for TagSelection {
  fn default() -> Self {
    Self::all()
  }
}

impl TagSelection {
  pub fn all() -> Self {
    Self(BTreeSet::from([ALL_TAG.to_string()]))
  }

  /// Build a selection from arbitrary tags. `All` is dropped when other tags
  /// are present; nothing left means `{All}`.
  pub fn from_tags<I, T>(tags: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    let tags: BTreeSet<String> = tags
      .into_iter()
      .map(Into::into)
      .filter(|t| t != ALL_TAG && !t.trim().is_empty())
      .collect();

    if tags.is_empty() {
      Self::all()
    } else {
      Self(tags)
    }
  }

  /// Toggle a tag. Selecting `All` resets; removing the last tag falls back to `All`.
  pub fn toggle(&mut self, tag: &str) {
    if tag == ALL_TAG {
      *self = Self::all();
      return;
    }

    self.0.remove(ALL_TAG);
    if !self.0.remove(tag) {
      self.0.insert(tag.to_string());
    }
    if self.0.is_empty() {
      *self = Self::all();
    }
  }

  pub fn is_all(&self) -> bool {
    self.0.contains(ALL_TAG)
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.0.contains(tag)
  }

  /// Tags to send to the filter endpoint; empty when unfiltered.
  pub fn filter_tags(&self) -> Vec<String> {
    if self.is_all() {
      Vec::new()
    } else {
      self.0.iter().cloned().collect()
    }
  }

  /// Persisted form, including the sentinel.
  pub fn to_vec(&self) -> Vec<String> {
    self.0.iter().cloned().collect()
  }
}
