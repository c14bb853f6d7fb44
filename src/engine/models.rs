use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One syncable file described by a manifest line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub relative_path: String,
    pub size_bytes: u64,
    pub checksum: Option<String>,
    /// Set once the local copy has been verified; never cleared.
    #[serde(skip)]
    pub(crate) up_to_date: bool,
}

impl ManifestEntry {
    pub fn new(relative_path: impl Into<String>, size_bytes: u64, checksum: Option<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size_bytes,
            checksum,
            up_to_date: false,
        }
    }

    pub fn is_known_up_to_date(&self) -> bool {
        self.up_to_date
    }
}

/// Entries in source-text order. Duplicates are kept.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Where the manifest for a session came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    Remote,
    Cache,
    /// Something was readable but it listed no entries.
    Empty,
    /// Neither the remote list nor a cached copy could be read.
    Unavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    UpToDate,
    Downloaded { bytes: u64 },
    Failed { error: String },
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryReport {
    pub relative_path: String,
    pub local_path: PathBuf,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Summary of one `sync` call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    pub base_dir: PathBuf,
    pub manifest_source: ManifestSource,
    /// Stale entries found before downloading began.
    pub pending: usize,
    pub entries: Vec<EntryReport>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Downloaded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::UpToDate))
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_flat_outcomes() {
        let report = SyncReport {
            base_dir: PathBuf::from("/media"),
            manifest_source: ManifestSource::Cache,
            pending: 1,
            entries: vec![EntryReport {
                relative_path: "a.mp4".into(),
                local_path: PathBuf::from("/media/a.mp4"),
                outcome: EntryOutcome::Downloaded { bytes: 10 },
            }],
            cancelled: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["manifest_source"], "cache");
        assert_eq!(json["entries"][0]["status"], "downloaded");
        assert_eq!(json["entries"][0]["bytes"], 10);
        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn new_entries_start_unverified() {
        let entry = ManifestEntry::new("a.mp4", 3, None);
        assert!(!entry.is_known_up_to_date());
    }
}
