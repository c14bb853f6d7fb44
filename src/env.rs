use std::env;
use std::path::PathBuf;

/// Returns the per-user data directory owned by content-sync.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                env::var_os("HOME")
                    .map(PathBuf::from)
                    .map(|home| home.join(".local").join("share"))
            }),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("content-sync")
}

/// Where synced media lands when no download directory is configured.
pub fn default_download_dir() -> PathBuf {
    default_app_dir().join("media")
}

/// Config file picked up when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    default_app_dir().join("config.json")
}
