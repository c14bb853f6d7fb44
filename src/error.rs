use std::path::PathBuf;

use thiserror::Error;

/// Why a single manifest line was rejected. Never escapes the parser.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("size field `{0}` is not a non-negative integer")]
    InvalidSize(String),

    #[error("path field is empty")]
    MissingPath,

    #[error("path `{0}` escapes the download directory")]
    UnsafePath(String),

    #[error("path `{0}` would overwrite the cached content list")]
    ReservedPath(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("transfer of {url} failed after {bytes} bytes: {message}")]
    Transport {
        url: String,
        bytes: u64,
        message: String,
    },

    #[error("local I/O error on {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} cancelled after {bytes} bytes")]
    Cancelled { url: String, bytes: u64 },

    #[error("cannot build a download URL from `{0}`")]
    InvalidUrl(String),
}

impl FetchError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::LocalIo {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

/// A per-entry failure recorded in the session report.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{path} failed verification after download ({reason})")]
    Verification { path: String, reason: String },
}

/// Session-level failures. Per-entry problems never become one of these.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid base URL `{url}`: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("cannot prepare download directory {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config {} parse error: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
