use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::{Client, Response, Url};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::storage::CONTENT_LIST;

/// Parse a base URL, making sure relative joins land beneath it.
pub fn parse_base_url(base: &str) -> Result<Url, String> {
    let mut url = Url::parse(base.trim()).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".into());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub fn manifest_url(base: &Url) -> Result<Url, FetchError> {
    entry_url(base, CONTENT_LIST)
}

/// Remote location of a manifest path; each segment is percent-encoded, `/` is kept.
pub fn entry_url(base: &Url, relative_path: &str) -> Result<Url, FetchError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(base.to_string()))?;
        segments.pop_if_empty();
        segments.extend(relative_path.split('/').filter(|part| !part.is_empty()));
    }
    Ok(url)
}

/// The URL reported for an entry, even when `entry_url` cannot build one.
pub fn entry_url_text(base: &Url, relative_path: &str) -> String {
    match entry_url(base, relative_path) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}/{}", base.as_str().trim_end_matches('/'), relative_path),
    }
}

/// The single place that talks HTTP and writes downloaded bytes.
#[derive(Clone, Debug)]
pub struct NetworkClient {
    client: Client,
    chunk_size: usize,
}

impl NetworkClient {
    pub fn new(config: &SyncConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .user_agent(concat!("content-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self {
            client,
            chunk_size: config.chunk_size(),
        }
    }

    /// Fetch a small text body such as the content list.
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            bytes: 0,
            message: e.to_string(),
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Stream `url` into `dest`, calling `on_progress` with the running byte
    /// total after every chunk write.
    ///
    /// Any failure after `dest` was opened removes it again. Cancellation is
    /// observed between chunk writes.
    pub async fn fetch<F>(
        &self,
        url: &Url,
        dest: &Path,
        expected_size: u64,
        cancel: Option<&AtomicBool>,
        mut on_progress: F,
    ) -> Result<u64, FetchError>
    where
        F: FnMut(u64),
    {
        if is_cancelled(cancel) {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
                bytes: 0,
            });
        }

        let response = self.get(url).await?;
        if let Some(len) = response.content_length()
            && len != expected_size
        {
            debug!(
                "download: {url} announces {len} bytes, manifest expects {expected_size}"
            );
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::local_io(parent, e))?;
        }
        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::local_io(dest, e))?;

        match self
            .stream_body(url, response, file, dest, cancel, &mut on_progress)
            .await
        {
            Ok(written) => {
                info!("download: {} complete ({written} bytes)", dest.display());
                Ok(written)
            }
            Err(err) => {
                if let Err(rm) = fs::remove_file(dest).await {
                    warn!("download: unable to remove partial {}: {rm}", dest.display());
                }
                Err(err)
            }
        }
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        debug!("download: GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                bytes: 0,
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn stream_body<F>(
        &self,
        url: &Url,
        response: Response,
        mut file: File,
        dest: &Path,
        cancel: Option<&AtomicBool>,
        on_progress: &mut F,
    ) -> Result<u64, FetchError>
    where
        F: FnMut(u64),
    {
        let announced = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                bytes: downloaded,
                message: e.to_string(),
            })?;
            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece)
                    .await
                    .map_err(|e| FetchError::local_io(dest, e))?;
                downloaded += piece.len() as u64;
                on_progress(downloaded);
                if is_cancelled(cancel) {
                    warn!("download: {url} cancelled after {downloaded} bytes");
                    return Err(FetchError::Cancelled {
                        url: url.to_string(),
                        bytes: downloaded,
                    });
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| FetchError::local_io(dest, e))?;

        if let Some(total) = announced
            && downloaded < total
        {
            return Err(FetchError::Transport {
                url: url.to_string(),
                bytes: downloaded,
                message: format!("incomplete body: received {downloaded} of {total} bytes"),
            });
        }

        Ok(downloaded)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel
        .map(|flag| flag.load(Ordering::SeqCst))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixtureServer, patterned_body};
    use axum::http::StatusCode;

    fn test_client(chunk_size: usize) -> NetworkClient {
        NetworkClient::new(&SyncConfig {
            chunk_size,
            ..SyncConfig::default()
        })
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("http://example.test/media").unwrap();
        assert_eq!(url.as_str(), "http://example.test/media/");
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.test").is_err());
    }

    #[test]
    fn entry_urls_encode_segments_but_keep_slashes() {
        let base = parse_base_url("http://example.test/media/").unwrap();
        assert_eq!(
            manifest_url(&base).unwrap().as_str(),
            "http://example.test/media/content_list"
        );
        assert_eq!(
            entry_url(&base, "clips/my clip#1.mp4").unwrap().as_str(),
            "http://example.test/media/clips/my%20clip%231.mp4"
        );
    }

    #[test]
    fn entry_url_text_falls_back_to_plain_join() {
        let base = parse_base_url("http://example.test/media/").unwrap();
        assert_eq!(
            entry_url_text(&base, "clips/a b.mp4"),
            "http://example.test/media/clips/a%20b.mp4"
        );

        let opaque = Url::parse("mailto:someone@example.test").unwrap();
        assert!(entry_url(&opaque, "a.mp4").is_err());
        assert_eq!(
            entry_url_text(&opaque, "a.mp4"),
            "mailto:someone@example.test/a.mp4"
        );
    }

    #[tokio::test]
    async fn streams_body_to_disk_with_progress() {
        let body = patterned_body(100_000);
        let server = FixtureServer::start(vec![("/a.mp4", StatusCode::OK, body.clone())]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("a.mp4");

        let mut seen = Vec::new();
        let written = test_client(32 * 1024)
            .fetch(&server.url("a.mp4"), &dest, body.len() as u64, None, |n| seen.push(n))
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(seen.len() >= 4, "expected one callback per 32 KB chunk");
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some(body.len() as u64));
    }

    #[tokio::test]
    async fn bad_status_leaves_nothing_on_disk() {
        let server = FixtureServer::start(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.mp4");

        let err = test_client(1024)
            .fetch(&server.url("missing.mp4"), &dest, 10, None, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::BadStatus { status: 404, .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("http://{addr}/a.mp4")).unwrap();
        let err = test_client(1024)
            .fetch(&url, &dir.path().join("a.mp4"), 10, None, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { bytes: 0, .. }));
    }

    #[tokio::test]
    async fn connection_dropped_mid_body_removes_partial() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&patterned_body(40_000)).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.mp4");
        let url = Url::parse(&format!("http://{addr}/a.mp4")).unwrap();
        let mut last_seen = 0;
        let err = test_client(1024)
            .fetch(&url, &dest, 100_000, None, |n| last_seen = n)
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(
            matches!(err, FetchError::Transport { bytes: 40_000, .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(last_seen, 40_000);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn cancellation_stops_after_current_chunk_and_removes_partial() {
        let body = patterned_body(64 * 1024);
        let server = FixtureServer::start(vec![("/big.mp4", StatusCode::OK, body)]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("big.mp4");
        let cancel = AtomicBool::new(false);

        let mut calls = 0;
        let err = test_client(1024)
            .fetch(&server.url("big.mp4"), &dest, 64 * 1024, Some(&cancel), |_| {
                calls += 1;
                cancel.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Cancelled { bytes: 1024, .. }));
        assert_eq!(calls, 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn fetch_text_reads_whole_body() {
        let server =
            FixtureServer::start(vec![("/content_list", StatusCode::OK, b"a,1\n".to_vec())]).await;
        let text = test_client(1024)
            .fetch_text(&server.url("content_list"))
            .await
            .unwrap();
        assert_eq!(text, "a,1\n");
    }
}
