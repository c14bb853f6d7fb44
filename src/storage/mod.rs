use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;

pub const CONTENT_LIST: &str = "content_list";

/// Local file for a manifest path. Forward slashes split into components.
pub fn resolve_local_path(base_dir: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .fold(base_dir.to_path_buf(), |path, part| path.join(part))
}

/// Owns the on-disk layout under one download directory.
#[derive(Clone, Debug)]
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cached_manifest_path(&self) -> PathBuf {
        self.base_dir.join(CONTENT_LIST)
    }

    pub fn local_path(&self, relative_path: &str) -> PathBuf {
        resolve_local_path(&self.base_dir, relative_path)
    }

    pub async fn ensure_base_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_dir).await
    }

    /// The previously persisted manifest text, if one is readable.
    pub async fn read_cached_manifest(&self) -> std::io::Result<String> {
        let path = self.cached_manifest_path();
        let bytes = fs::read(&path).await?;
        debug!("storage: read {} bytes from {}", bytes.len(), path.display());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn write_cached_manifest(&self, text: &str) -> std::io::Result<()> {
        let path = self.cached_manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, text.as_bytes()).await?;
        debug!("storage: cached manifest at {}", path.display());
        Ok(())
    }

    /// Remove a file left behind by a failed or cancelled download.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!("storage: removed {}", path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("storage: unable to remove {}: {err}", path.display()),
        }
    }
}
