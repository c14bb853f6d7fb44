use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use reqwest::Url;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::engine::manifest::ManifestParser;
use crate::engine::models::{
    EntryOutcome, EntryReport, Manifest, ManifestEntry, ManifestSource, SyncReport,
};
use crate::engine::progress::ProgressReporter;
use crate::engine::staleness::StalenessChecker;
use crate::engine::state::ProgressSink;
use crate::error::{EntryError, SyncError};
use crate::networking::{self, NetworkClient};
use crate::storage::StorageManager;

pub mod manifest;
pub mod models;
pub mod progress;
pub mod staleness;
pub mod state;

/// State owned by one `sync` call.
struct SyncSession {
    storage: StorageManager,
    manifest: Manifest,
    source: ManifestSource,
    pending: usize,
    fetched: HashSet<String>,
    outcomes: Vec<EntryOutcome>,
    cancelled: bool,
}

impl SyncSession {
    fn into_report(self) -> (SyncReport, Manifest, StorageManager) {
        let entries = self
            .manifest
            .iter()
            .zip(self.outcomes)
            .map(|(entry, outcome)| EntryReport {
                relative_path: entry.relative_path.clone(),
                local_path: self.storage.local_path(&entry.relative_path),
                outcome,
            })
            .collect();
        let report = SyncReport {
            base_dir: self.storage.base_dir().to_path_buf(),
            manifest_source: self.source,
            pending: self.pending,
            entries,
            cancelled: self.cancelled,
        };
        (report, self.manifest, self.storage)
    }
}

/// Brings a local directory in line with the remote content list.
pub struct SyncEngine {
    config: SyncConfig,
    base_url: Url,
    network: NetworkClient,
    parser: ManifestParser,
    checker: StalenessChecker,
    cancel_flag: Arc<AtomicBool>,
    /// Manifest and directory of the most recent session, for local content queries.
    manifest: Manifest,
    storage: StorageManager,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, cancel_flag: Arc<AtomicBool>) -> Result<Self, SyncError> {
        let base_url =
            networking::parse_base_url(&config.base_url).map_err(|message| {
                SyncError::InvalidBaseUrl {
                    url: config.base_url.clone(),
                    message,
                }
            })?;
        let network = NetworkClient::new(&config);
        let parser = ManifestParser::with_min_fields(config.min_manifest_fields());
        let checker = StalenessChecker::new(config.chunk_size());
        let storage = StorageManager::new(config.download_dir());
        Ok(Self {
            config,
            base_url,
            network,
            parser,
            checker,
            cancel_flag,
            manifest: Manifest::default(),
            storage,
        })
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    /// The manifest loaded by the last session.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn base_dir(&self) -> &Path {
        self.storage.base_dir()
    }

    /// Run one session against `local_base` (or the configured download dir).
    ///
    /// Individual entry failures are reported to `sink` and in the returned
    /// report; only an unusable local directory fails the call.
    /// `sink.on_session_finished` is always invoked before returning.
    ///
    /// A cancel raised before the call cancels this session. The flag is
    /// cleared once the session ends, so the next call starts fresh.
    pub async fn sync(
        &mut self,
        local_base: Option<&Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run_session(local_base, sink).await;
        self.reset_cancel_flag();
        let cancelled = matches!(&result, Ok(report) if report.cancelled);
        sink.on_session_finished(cancelled);
        result
    }

    /// Run `sync` on a background task. The engine comes back with the result.
    pub fn spawn<S>(
        mut self,
        local_base: Option<PathBuf>,
        mut sink: S,
    ) -> JoinHandle<(Self, Result<SyncReport, SyncError>)>
    where
        S: ProgressSink + 'static,
    {
        tokio::spawn(async move {
            let result = self.sync(local_base.as_deref(), &mut sink).await;
            (self, result)
        })
    }

    /// Local paths of every manifest entry that is currently up to date, in manifest order.
    pub fn list_local_content(&mut self) -> Vec<PathBuf> {
        let base_dir = self.storage.base_dir().to_path_buf();
        let checker = self.checker;
        self.manifest
            .entries
            .iter_mut()
            .filter_map(|entry| {
                (!checker.is_stale(entry, &base_dir))
                    .then(|| self.storage.local_path(&entry.relative_path))
            })
            .collect()
    }

    /// Load the cached content list without touching the network.
    pub async fn load_cached_manifest(&mut self, local_base: Option<&Path>) -> ManifestSource {
        let storage = self.resolve_storage(local_base);
        let (manifest, source) = match storage.read_cached_manifest().await {
            Ok(text) => {
                let manifest = self.parser.parse(&text);
                let source = if manifest.is_empty() {
                    ManifestSource::Empty
                } else {
                    ManifestSource::Cache
                };
                (manifest, source)
            }
            Err(err) => {
                warn!(
                    "sync: no cached content list at {}: {err}",
                    storage.cached_manifest_path().display()
                );
                (Manifest::default(), ManifestSource::Unavailable)
            }
        };
        self.manifest = manifest;
        self.storage = storage;
        source
    }

    async fn run_session(
        &mut self,
        local_base: Option<&Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        let storage = self.resolve_storage(local_base);
        storage
            .ensure_base_dir()
            .await
            .map_err(|source| SyncError::LocalIo {
                path: storage.base_dir().to_path_buf(),
                source,
            })?;
        info!("sync: starting session in {}", storage.base_dir().display());

        let (manifest, source) = self.load_manifest(&storage).await;
        if source == ManifestSource::Unavailable {
            sink.on_session_error(
                "content list unavailable: remote fetch failed and no cached copy exists",
            );
        }

        let mut session = SyncSession {
            outcomes: vec![EntryOutcome::UpToDate; manifest.len()],
            storage,
            manifest,
            source,
            pending: 0,
            fetched: HashSet::new(),
            cancelled: false,
        };

        let base_dir = session.storage.base_dir().to_path_buf();
        let stale: Vec<bool> = session
            .manifest
            .entries
            .iter_mut()
            .map(|entry| self.checker.is_stale(entry, &base_dir))
            .collect();
        session.pending = stale.iter().filter(|s| **s).count();
        info!(
            "sync: {} of {} entries need downloading",
            session.pending,
            session.manifest.len()
        );
        sink.on_total_count(session.pending);

        for (index, needs_download) in stale.into_iter().enumerate() {
            if !needs_download {
                continue;
            }
            if session.cancelled || self.cancel_requested() {
                session.cancelled = true;
                session.outcomes[index] = EntryOutcome::Cancelled;
                continue;
            }
            let outcome = self.sync_entry(&mut session, index, sink).await;
            if outcome == EntryOutcome::Cancelled {
                session.cancelled = true;
            }
            session.outcomes[index] = outcome;
        }

        let (report, manifest, storage) = session.into_report();
        info!(
            "sync: session finished: {} downloaded, {} failed, {} up to date{}",
            report.downloaded(),
            report.failed(),
            report.up_to_date(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        self.manifest = manifest;
        self.storage = storage;
        Ok(report)
    }

    /// Remote list first; the cached copy when the remote is unreachable or empty.
    async fn load_manifest(&self, storage: &StorageManager) -> (Manifest, ManifestSource) {
        let mut readable = false;

        let remote = match networking::manifest_url(&self.base_url) {
            Ok(url) => self.network.fetch_text(&url).await,
            Err(err) => Err(err),
        };
        match remote {
            Ok(text) => {
                readable = true;
                let manifest = self.parser.parse(&text);
                if !manifest.is_empty() {
                    if let Err(err) = storage.write_cached_manifest(&text).await {
                        warn!("sync: unable to cache content list: {err}");
                    }
                    return (manifest, ManifestSource::Remote);
                }
                warn!("sync: remote content list has no usable entries");
            }
            Err(err) => warn!("sync: remote content list unavailable: {err}"),
        }

        match storage.read_cached_manifest().await {
            Ok(text) => {
                readable = true;
                let manifest = self.parser.parse(&text);
                if !manifest.is_empty() {
                    info!(
                        "sync: using cached content list ({} entries)",
                        manifest.len()
                    );
                    return (manifest, ManifestSource::Cache);
                }
            }
            Err(err) => debug!("sync: no cached content list: {err}"),
        }

        if readable {
            (Manifest::default(), ManifestSource::Empty)
        } else {
            error!("sync: no content list could be obtained");
            (Manifest::default(), ManifestSource::Unavailable)
        }
    }

    async fn sync_entry(
        &self,
        session: &mut SyncSession,
        index: usize,
        sink: &mut dyn ProgressSink,
    ) -> EntryOutcome {
        let storage = &session.storage;
        let entry = &mut session.manifest.entries[index];
        let url = match networking::entry_url(&self.base_url, &entry.relative_path) {
            Ok(url) => url,
            Err(err) => {
                let text = networking::entry_url_text(&self.base_url, &entry.relative_path);
                sink.on_entry_started(&text, entry.size_bytes);
                let outcome = report_failure(entry, EntryError::from(err), sink);
                sink.on_entry_finished();
                return outcome;
            }
        };
        sink.on_entry_started(url.as_str(), entry.size_bytes);

        // A duplicate line may already have been satisfied earlier in the session.
        if session.fetched.contains(&entry.relative_path)
            && !self.checker.is_stale(entry, storage.base_dir())
        {
            debug!("sync: {} already fetched this session", entry.relative_path);
            sink.on_entry_finished();
            return EntryOutcome::UpToDate;
        }
        session.fetched.insert(entry.relative_path.clone());

        let dest = storage.local_path(&entry.relative_path);
        let mut reporter = ProgressReporter::new(self.config.progress_interval());
        reporter.start(entry.size_bytes);

        let result = self
            .network
            .fetch(
                &url,
                &dest,
                entry.size_bytes,
                Some(self.cancel_flag.as_ref()),
                |bytes| {
                    if let Some(pct) = reporter.on_bytes(bytes) {
                        sink.on_entry_progress(pct);
                    }
                },
            )
            .await;

        let outcome = match result {
            Ok(bytes) => {
                if let Some(pct) = reporter.finish() {
                    sink.on_entry_progress(pct);
                }
                let staleness = self.checker.check(entry, storage.base_dir());
                if staleness.is_stale() {
                    storage.discard(&dest).await;
                    report_failure(
                        entry,
                        EntryError::Verification {
                            path: entry.relative_path.clone(),
                            reason: staleness.to_string(),
                        },
                        sink,
                    )
                } else {
                    info!("sync: {} downloaded ({bytes} bytes)", entry.relative_path);
                    EntryOutcome::Downloaded { bytes }
                }
            }
            Err(err) if err.is_cancelled() => {
                warn!("sync: {} cancelled", entry.relative_path);
                EntryOutcome::Cancelled
            }
            Err(err) => report_failure(entry, EntryError::from(err), sink),
        };
        sink.on_entry_finished();
        outcome
    }

    fn resolve_storage(&self, local_base: Option<&Path>) -> StorageManager {
        let base_dir = local_base
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.download_dir());
        StorageManager::new(base_dir)
    }

    fn reset_cancel_flag(&self) {
        self.cancel_flag.store(false, Ordering::SeqCst);
        debug!("cancel flag reset");
    }

    fn cancel_requested(&self) -> bool {
        let value = self.cancel_flag.load(Ordering::SeqCst);
        if value {
            debug!("cancel flag observed set");
        }
        value
    }
}

fn report_failure(
    entry: &ManifestEntry,
    err: EntryError,
    sink: &mut dyn ProgressSink,
) -> EntryOutcome {
    let message = err.to_string();
    error!("sync: {} failed: {message}", entry.relative_path);
    sink.on_session_error(&message);
    EntryOutcome::Failed { error: message }
}
