use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use url::Url;

use super::endpoints::resolve_media_url;
use crate::cache::Cacheable;

/// Opaque post identifier. The API sends either strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for PostId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for PostId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
      Text(String),
      Unsigned(u64),
      Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
      RawId::Text(s) => PostId(s),
      RawId::Unsigned(n) => PostId(n.to_string()),
      RawId::Signed(n) => PostId(n.to_string()),
    })
  }
}

/// A post, either in summary form (no `content`) or full form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  pub id: PostId,
  pub title: String,
  #[serde(default)]
  pub summary: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cover_image: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub author: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(with = "timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
  pub last_updated_at: Option<DateTime<Utc>>,
}

impl Post {
  /// Whether this is the full form of the post.
  pub fn has_content(&self) -> bool {
    self.content.as_deref().is_some_and(|c| !c.is_empty())
  }

  pub fn has_any_tag(&self, tags: &[String]) -> bool {
    self.tags.iter().any(|t| tags.contains(t))
  }

  /// Case-insensitive match on title or summary.
  pub fn matches_query(&self, query: &str) -> bool {
    let needle = query.to_lowercase();
    self.title.to_lowercase().contains(&needle) || self.summary.to_lowercase().contains(&needle)
  }

  pub fn cover_image_url(&self, base: &Url) -> Option<String> {
    self
      .cover_image
      .as_deref()
      .and_then(|reference| resolve_media_url(base, reference))
  }
}

impl Cacheable for Post {
  fn cache_key(&self) -> String {
    self.id.0.clone()
  }

  fn sort_key(&self) -> Option<String> {
    Some(self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
  }
}

/// Serde helpers for API timestamps.
///
/// Accepts RFC 3339 as well as naive ISO-8601 (read as UTC); always writes RFC 3339.
pub(crate) mod timestamp {
  use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
  use serde::{de, Deserialize, Deserializer, Serializer};

  pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
      if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(naive.and_utc());
      }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
      .ok()
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .map(|naive| naive.and_utc())
  }

  pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
  }

  pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
      value: &Option<DateTime<Utc>>,
      serializer: S,
    ) -> Result<S::Ok, S::Error> {
      match value {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
      }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
      deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
      match Option::<String>::deserialize(deserializer)? {
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => super::parse(&raw)
          .map(Some)
          .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
        None => Ok(None),
      }
    }
  }
}

#[cfg(test)]
impl Post {
  /// Summary-form post with a creation time derived from `n`.
  pub fn sample(n: u32, tags: &[&str]) -> Self {
    use chrono::TimeZone;
    Post {
      id: PostId(n.to_string()),
      title: format!("Post {}", n),
      summary: format!("Summary of post {}", n),
      cover_image: None,
      tags: tags.iter().map(|t| t.to_string()).collect(),
      author: "Admin".to_string(),
      content: None,
      created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(n as i64),
      last_updated_at: None,
    }
  }

  pub fn with_content(mut self, content: &str) -> Self {
    self.content = Some(content.to_string());
    self
  }
}
