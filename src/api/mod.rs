//! Fetch adapter for the blog API: endpoints, payload decoding and the
//! cache-backed client.

pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod endpoints;
pub mod types;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
pub use types::{Post, PostId};
