//! Decoding of blog API payloads into domain types.
//!
//! The API speaks snake_case and nests part of each post under `metadata`.
//! Payloads are normalized in two stages before a strict decode:
//! 1. rename every object key to camelCase, recursively
//! 2. flatten `metadata` onto the post and backfill defaults
//!
//! Decoding fails closed: a payload that still doesn't look like a post after
//! normalization is a [`SyncError::Decode`], never a half-filled record.

use serde_json::Value;

use super::types::Post;
use crate::error::{SyncError, SyncResult};

/// Author shown when the API omits one.
pub const DEFAULT_AUTHOR: &str = "Admin";

// ============================================================================
// Stage 1: key renaming
// ============================================================================

/// Recursively rename object keys from snake_case (or kebab-case) to camelCase.
pub fn camel_case_keys(value: Value) -> Value {
  match value {
    Value::Array(items) => Value::Array(items.into_iter().map(camel_case_keys).collect()),
    Value::Object(map) => Value::Object(
      map
        .into_iter()
        .map(|(key, value)| (camel_case(&key), camel_case_keys(value)))
        .collect(),
    ),
    other => other,
  }
}

/// `cover_image` -> `coverImage`. A separator only folds when a letter follows it.
fn camel_case(key: &str) -> String {
  let mut out = String::with_capacity(key.len());
  let mut chars = key.chars().peekable();
  while let Some(c) = chars.next() {
    if c == '_' || c == '-' {
      if let Some(next) = chars.peek().copied().filter(|n| n.is_ascii_alphabetic()) {
        out.push(next.to_ascii_uppercase());
        chars.next();
        continue;
      }
    }
    out.push(c);
  }
  out
}

// ============================================================================
// Stage 2: metadata flattening and defaults
// ============================================================================

/// Flatten `metadata` and backfill defaults on a post, or on every post of an array.
pub fn flatten_posts(value: Value) -> Value {
  match value {
    Value::Array(items) => Value::Array(items.into_iter().map(flatten_post).collect()),
    other => flatten_post(other),
  }
}

fn flatten_post(value: Value) -> Value {
  let Value::Object(mut post) = value else {
    return value;
  };

  match post.remove("metadata") {
    // Metadata keys win over top-level keys of the same name
    Some(Value::Object(metadata)) => post.extend(metadata),
    Some(Value::Null) | None => {}
    Some(other) => {
      post.insert("metadata".to_string(), other);
    }
  }

  if is_blank(post.get("author")) {
    post.insert("author".to_string(), Value::String(DEFAULT_AUTHOR.to_string()));
  }
  if post.get("tags").map_or(true, Value::is_null) {
    post.insert("tags".to_string(), Value::Array(Vec::new()));
  }

  Value::Object(post)
}

fn is_blank(value: Option<&Value>) -> bool {
  match value {
    None | Some(Value::Null) => true,
    Some(Value::String(s)) => s.is_empty(),
    Some(_) => false,
  }
}

/// Both normalization stages.
pub fn normalize(value: Value) -> Value {
  flatten_posts(camel_case_keys(value))
}

// ============================================================================
// Strict decoding
// ============================================================================

/// Decode a list endpoint payload. Anything but an array is rejected.
pub fn decode_posts(raw: Value) -> SyncResult<Vec<Post>> {
  match normalize(raw) {
    Value::Array(items) => items.into_iter().map(decode_normalized).collect(),
    other => Err(SyncError::Decode(format!(
      "expected an array of posts, got {}",
      kind(&other)
    ))),
  }
}

/// Decode a single-post payload.
pub fn decode_post(raw: Value) -> SyncResult<Post> {
  decode_normalized(normalize(raw))
}

fn decode_normalized(value: Value) -> SyncResult<Post> {
  let id_hint = value
    .get("id")
    .map(Value::to_string)
    .unwrap_or_else(|| "<missing id>".to_string());
  serde_json::from_value(value).map_err(|e| SyncError::Decode(format!("post {}: {}", id_hint, e)))
}

/// Decode the tag vocabulary. Non-string entries are rejected.
pub fn decode_tags(raw: Value) -> SyncResult<Vec<String>> {
  serde_json::from_value(raw).map_err(|e| SyncError::Decode(format!("tag list: {}", e)))
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
