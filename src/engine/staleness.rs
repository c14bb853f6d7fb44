use std::fs;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, warn};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::engine::models::ManifestEntry;
use crate::storage::resolve_local_path;

/// Result of comparing one manifest entry against the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Staleness {
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    ChecksumMismatch { expected: String, actual: String },
    UpToDate,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::UpToDate)
    }
}

impl std::fmt::Display for Staleness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Staleness::Missing => f.write_str("missing"),
            Staleness::SizeMismatch { expected, actual } => {
                write!(f, "size {actual} != expected {expected}")
            }
            Staleness::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum {actual} != expected {expected}")
            }
            Staleness::UpToDate => f.write_str("up to date"),
        }
    }
}

/// Digest family inferred from the length of a manifest checksum.
///
/// These are transfer-integrity checks. Neither protects against a hostile
/// server or network path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestKind {
    Md5,
    Sha256,
}

impl DigestKind {
    pub fn for_checksum(hex: &str) -> Self {
        if hex.len() == 64 {
            DigestKind::Sha256
        } else {
            DigestKind::Md5
        }
    }
}

/// Decides whether local copies match their manifest entries.
#[derive(Clone, Copy, Debug)]
pub struct StalenessChecker {
    buffer_size: usize,
}

impl Default for StalenessChecker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StalenessChecker {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn is_stale(&self, entry: &mut ManifestEntry, base_dir: &Path) -> bool {
        self.check(entry, base_dir).is_stale()
    }

    /// Cheapest test first: existence, then size, then content digest.
    ///
    /// A verified entry is remembered and later calls skip the filesystem.
    pub fn check(&self, entry: &mut ManifestEntry, base_dir: &Path) -> Staleness {
        if entry.up_to_date {
            return Staleness::UpToDate;
        }

        let path = resolve_local_path(base_dir, &entry.relative_path);
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                debug!("staleness: {} missing", path.display());
                return Staleness::Missing;
            }
        };

        if meta.len() != entry.size_bytes {
            debug!(
                "staleness: {} has {} bytes, expected {}",
                path.display(),
                meta.len(),
                entry.size_bytes
            );
            return Staleness::SizeMismatch {
                expected: entry.size_bytes,
                actual: meta.len(),
            };
        }

        if let Some(expected) = entry.checksum.as_deref() {
            let kind = DigestKind::for_checksum(expected);
            let actual = match file_digest(&path, kind, self.buffer_size) {
                Ok(actual) => actual,
                Err(err) => {
                    warn!("staleness: unable to hash {}: {err}", path.display());
                    String::new()
                }
            };
            if !actual.eq_ignore_ascii_case(expected) {
                debug!(
                    "staleness: {} digest {actual} != {expected}",
                    path.display()
                );
                return Staleness::ChecksumMismatch {
                    expected: expected.to_owned(),
                    actual,
                };
            }
        }

        entry.up_to_date = true;
        Staleness::UpToDate
    }
}

/// Lowercase hex digest of a file, read in `buffer_size` pieces.
pub fn file_digest(path: &Path, kind: DigestKind, buffer_size: usize) -> io::Result<String> {
    let file = fs::File::open(path)?;
    match kind {
        DigestKind::Md5 => stream_digest(file, Md5::new(), buffer_size),
        DigestKind::Sha256 => stream_digest(file, Sha256::new(), buffer_size),
    }
}

fn stream_digest<R: Read, D: Digest>(
    mut reader: R,
    mut hasher: D,
    buffer_size: usize,
) -> io::Result<String> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
