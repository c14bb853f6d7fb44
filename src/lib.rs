//! Keeps a local media directory in step with a remote content list.
//!
//! The [`SyncEngine`] fetches the list (falling back to a cached copy),
//! downloads missing or stale files one after another, and reports progress
//! to a [`ProgressSink`]. [`SyncEngine::list_local_content`] then yields the
//! files that are ready for playback.

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod networking;
pub mod storage;
pub mod util;

#[cfg(test)]
mod test_support;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use engine::models::{EntryOutcome, Manifest, ManifestEntry, ManifestSource, SyncReport};
pub use engine::state::{ChannelSink, ProgressSink, SyncEvent};
pub use error::{ConfigError, EntryError, FetchError, ManifestError, SyncError};
