//! Navigation document checks for the asset-caching layer.
//!
//! Only genuine application documents may be cached as the offline shell.
//! Error pages served with a 200 (proxies, captive portals) are recognised by
//! the missing application marker.

use tracing::debug;

use crate::api::ApiClient;
use crate::error::SyncResult;

/// Whether a navigation response may be cached.
pub fn is_cacheable_navigation(status: u16, body: &str, marker: &str) -> bool {
  status == 200 && !marker.is_empty() && body.contains(marker)
}

/// Fetch `path` and report whether it qualifies as a cacheable document.
pub async fn check_navigation(api: &ApiClient, path: &str, marker: &str) -> SyncResult<bool> {
  let (status, body) = api.fetch_document(path).await?;
  let ok = is_cacheable_navigation(status, &body, marker);
  debug!(path, status, ok, "checked navigation document");
  Ok(ok)
}
