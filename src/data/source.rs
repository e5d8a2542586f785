//! Raw dataset sources: remote URLs, local files and the snapshot cache.
//!
//! A source only produces bytes; parsing happens in [`super::clean`] and
//! [`super::join`].

use super::error::{LoadError, LoadResult};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Where a CSV input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Fetched over HTTP(S).
    Remote(String),
    /// Read from disk.
    Local(PathBuf),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Remote(url) => write!(f, "{}", url),
            DataSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Options controlling how remote sources are fetched.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory holding raw snapshots of remote sources.
    pub cache: Option<SnapshotCache>,
    /// Ignore existing snapshots and download again.
    pub refresh: bool,
    /// Show a spinner while downloading.
    pub show_progress: bool,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache: None,
            refresh: false,
            show_progress: true,
            timeout_seconds: 60,
        }
    }
}

/// On-disk copies of previously downloaded sources.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file for a URL.
    ///
    /// The readable part replaces every byte outside `[A-Za-z0-9.]`, so
    /// distinct URLs can flatten alike; the hash suffix keeps them apart.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let flat: String = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}-{}", flat, &hash_url(url)[..12]))
    }

    /// Read the snapshot for `url`, if one exists.
    pub async fn read(&self, url: &str) -> LoadResult<Option<Vec<u8>>> {
        let path = self.path_for(url);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LoadError::Io { path, source }),
        }
    }

    /// Store the snapshot for `url`, creating the cache directory if needed.
    pub async fn write(&self, url: &str, bytes: &[u8]) -> LoadResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| LoadError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.path_for(url);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Progress display shared by concurrent downloads; hidden when progress is off.
pub fn progress_for(options: &FetchOptions) -> MultiProgress {
    if options.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }
}

/// Download spinner, cleared when dropped so a failed request leaves no line behind.
struct Spinner(ProgressBar);

impl Spinner {
    fn start(progress: &MultiProgress, url: &str) -> Self {
        let pb = progress.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Downloading {}", url));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self(pb)
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}

/// Build the HTTP client shared by both downloads.
pub fn build_client(options: &FetchOptions) -> LoadResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .user_agent(concat!("cvdash/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| LoadError::Fetch {
            url: String::from("<client>"),
            source,
        })
}

impl DataSource {
    /// Fetch the raw bytes of this source.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        options: &FetchOptions,
        progress: &MultiProgress,
    ) -> LoadResult<Vec<u8>> {
        match self {
            DataSource::Local(path) => {
                debug!("Reading local source: {}", path.display());
                tokio::fs::read(path).await.map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })
            }
            DataSource::Remote(url) => fetch_remote(client, url, options, progress).await,
        }
    }
}

async fn fetch_remote(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
    progress: &MultiProgress,
) -> LoadResult<Vec<u8>> {
    if let Some(ref cache) = options.cache {
        if !options.refresh {
            if let Some(bytes) = cache.read(url).await? {
                info!("Using cached snapshot of {}", url);
                return Ok(bytes);
            }
        }
    }

    let spinner = Spinner::start(progress, url);
    info!("Downloading {}", url);
    let fetch_err = |source: reqwest::Error| LoadError::Fetch {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
    let bytes = response.bytes().await.map_err(fetch_err)?.to_vec();

    drop(spinner);
    debug!("Downloaded {} bytes from {}", bytes.len(), url);

    if let Some(ref cache) = options.cache {
        let path = cache.write(url, &bytes).await?;
        debug!("Stored snapshot at {}", path.display());
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn test_snapshot_path_is_flat() {
        let cache = SnapshotCache::new("/tmp/cvdash");
        let path = cache.path_for("https://example.org/data/file.csv?x=1");
        assert_eq!(
            path,
            PathBuf::from("/tmp/cvdash/example.org_data_file.csv_x_1-c3826e10e95c")
        );
    }

    #[test]
    fn test_snapshot_paths_keep_similar_urls_apart() {
        let cache = SnapshotCache::new("/tmp/cvdash");
        let slash = cache.path_for("https://example.org/a/b");
        let underscore = cache.path_for("https://example.org/a_b");
        assert_ne!(slash, underscore);
        assert_eq!(slash, PathBuf::from("/tmp/cvdash/example.org_a_b-005f09736b1a"));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested"));
        let url = "https://example.org/codes.csv";

        tokio_test::block_on(async {
            assert!(cache.read(url).await.unwrap().is_none());
            cache.write(url, b"Country,country-code\n").await.unwrap();
            assert_eq!(
                cache.read(url).await.unwrap().as_deref(),
                Some(&b"Country,country-code\n"[..])
            );
        });
    }

    #[test]
    fn test_cached_remote_skips_network() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        // Unroutable URL: only the snapshot can satisfy the fetch.
        let url = "http://127.0.0.1:9/mortality.csv";
        tokio_test::block_on(cache.write(url, b"cached")).unwrap();

        let options = FetchOptions {
            cache: Some(cache),
            show_progress: false,
            ..FetchOptions::default()
        };
        let client = build_client(&options).unwrap();
        let source = DataSource::Remote(url.to_string());

        let bytes = tokio_test::block_on(source.fetch(&client, &options, &hidden())).unwrap();
        assert_eq!(bytes, b"cached");
    }

    #[test]
    fn test_failed_download_reports_fetch_error() {
        let options = FetchOptions {
            show_progress: false,
            timeout_seconds: 5,
            ..FetchOptions::default()
        };
        let client = build_client(&options).unwrap();
        let source = DataSource::Remote("http://127.0.0.1:9/mortality.csv".to_string());

        let err = tokio_test::block_on(source.fetch(&client, &options, &hidden())).unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }

    #[test]
    fn test_spinner_cleared_on_drop() {
        let progress = hidden();
        let bar = {
            let spinner = Spinner::start(&progress, "http://127.0.0.1:9/mortality.csv");
            assert!(!spinner.0.is_finished());
            spinner.0.clone()
        };
        assert!(bar.is_finished());
    }

    #[test]
    fn test_local_source_missing_file() {
        let options = FetchOptions::default();
        let client = build_client(&options).unwrap();
        let source = DataSource::Local(PathBuf::from("/definitely/not/here.csv"));

        let err = tokio_test::block_on(source.fetch(&client, &options, &hidden())).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
