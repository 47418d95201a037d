//! Offline-first sync and cache engine for a blog reading client.
//!
//! The [`state::Store`] is the single source of truth: front ends read its
//! [`state::AppState`] (or subscribe to snapshots) and call its actions. The
//! fetch adapter in [`api`] and the persistent collections in [`cache`] are
//! passive collaborators.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod logging;
pub mod prefs;
pub mod query;
pub mod shell;
pub mod state;
#[cfg(test)]
mod test_support;
