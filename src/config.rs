use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://3gfp.com/i/rdm_test_media/";

/// Read buffer and write chunk size used for downloads and hashing (32 KB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Minimum spacing between progress emissions for one download.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1_000;

/// Top-level configuration for a sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote root; the manifest and every file are resolved against it.
    pub base_url: String,
    /// Local root for downloads and the cached manifest.
    pub download_dir: Option<PathBuf>,
    /// Reject two-field manifest lines that carry no checksum.
    pub require_checksums: bool,
    pub chunk_size: usize,
    pub progress_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            download_dir: None,
            require_checksums: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (env::default_config_path(), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound && !explicit => {
                debug!("config: no file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config = Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        info!("config: loaded {}", path.display());
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// The directory synced content is written to.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(env::default_download_dir)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Chunk size with a floor of one byte, so a zero in the file can't stall a download.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Minimum number of comma-separated fields a manifest line must carry.
    pub fn min_manifest_fields(&self) -> usize {
        if self.require_checksums { 3 } else { 2 }
    }
}
