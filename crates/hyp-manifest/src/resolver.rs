use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use hyp_drive::{
    path, Download, DownloadCanceller, DownloadStats, DriveError, DriveLease, DriveStore, Filesystem, LocalFs,
};
use hyp_types::DriveUrl;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::document::{EntryPoint, EntryType, ManifestDocument, MANIFEST_FILE};
use crate::error::{ManifestError, ManifestResult};

/// Options for [`ManifestResolver::main`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MainOptions {
    /// Fully fetch the entry file before returning.
    pub preload: bool,
}

/// Outcome of [`ManifestResolver::preload`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreloadResult {
    /// Number of trace entries read successfully.
    pub preloaded: usize,
    /// Trace key → file contents, for the entries that were read.
    pub trace: BTreeMap<String, String>,
}

type Downloads = Arc<Mutex<HashMap<u64, DownloadCanceller>>>;

/// A download started by [`ManifestResolver::start_download`].
///
/// Registered with its resolver until it finishes or is dropped. Dropping
/// it, or closing the resolver, cancels the transfer.
pub struct ManifestDownload {
    id: u64,
    download: Option<Download>,
    registry: Downloads,
}

impl ManifestDownload {
    pub fn cancel(&self) {
        if let Some(download) = &self.download {
            download.cancel();
        }
    }

    /// Wait for the transfer. A canceled one fails with [`DriveError::Cancelled`].
    pub async fn wait(mut self) -> ManifestResult<DownloadStats> {
        let Some(download) = self.download.take() else {
            return Err(DriveError::Cancelled.into());
        };
        Ok(download.wait().await?)
    }
}

impl Drop for ManifestDownload {
    fn drop(&mut self) {
        if let Some(canceller) = self.registry.lock().expect("lock poisoned").remove(&self.id) {
            canceller.cancel();
        }
    }
}

enum Backend {
    Local(LocalFs),
    Drive(DriveLease),
}

impl Backend {
    fn fs(&self) -> &dyn Filesystem {
        match self {
            Self::Local(fs) => fs,
            Self::Drive(lease) => lease.handle(),
        }
    }
}

/// Reads an application's manifest and finds its entry point.
///
/// `asset://` base URLs check a drive out of the [`DriveStore`] for the
/// resolver's lifetime; anything else is read from local disk. The manifest
/// is read at most once per resolver.
pub struct ManifestResolver {
    url: String,
    url_prefix: String,
    path: String,
    backend: Backend,
    /// `None` records that the manifest is absent.
    data: OnceCell<Option<ManifestDocument>>,
    downloads: Downloads,
    next_download: AtomicU64,
}

impl ManifestResolver {
    /// Open a resolver for `url`.
    pub fn open(drives: &Arc<DriveStore>, url: &str) -> ManifestResult<Self> {
        let (backend, url_prefix, path) = if DriveUrl::is_drive_url(url) {
            let parsed = DriveUrl::parse(url)?;
            let lease = drives.lease(&parsed.key)?;
            let prefix = format!("{}://{}", hyp_types::ASSET_SCHEME, parsed.key.to_hex());
            (Backend::Drive(lease), prefix, parsed.path)
        } else if let Some(local) = url.strip_prefix("file://") {
            (Backend::Local(LocalFs::new()), "file://".to_string(), path::normalize(local))
        } else {
            (Backend::Local(LocalFs::new()), String::new(), local_path(url))
        };

        debug!(url, path = %path, "manifest resolver opened");
        Ok(Self {
            url: url.to_string(),
            url_prefix,
            path,
            backend,
            data: OnceCell::new(),
            downloads: Downloads::default(),
            next_download: AtomicU64::new(0),
        })
    }

    /// Open, load, and close in one step.
    pub async fn load_once(drives: &Arc<DriveStore>, url: &str) -> ManifestResult<ManifestDocument> {
        let resolver = Self::open(drives, url)?;
        let data = resolver.load().await?.clone();
        resolver.close();
        Ok(data)
    }

    /// The base URL this resolver was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Application directory inside the backend.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_drive(&self) -> bool {
        matches!(self.backend, Backend::Drive(_))
    }

    /// Read and parse `hyperspace.json`, once. An absent manifest is
    /// remembered too.
    pub async fn load(&self) -> ManifestResult<&ManifestDocument> {
        let doc = self
            .data
            .get_or_try_init(|| async {
                let file = path::join(&self.path, MANIFEST_FILE);
                match self.backend.fs().read_file(&file).await {
                    Ok(data) => ManifestDocument::from_slice(&data).map(Some),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(ManifestError::Drive(e)),
                }
            })
            .await?;
        doc.as_ref().ok_or_else(|| ManifestError::ManifestNotFound(self.url.clone()))
    }

    /// Resolve the application's entry point.
    ///
    /// Order: the manifest's `main`, then `index.html`, then `index.js`.
    /// A missing manifest falls through to the probes; an invalid one is an
    /// error.
    pub async fn main(&self, opts: MainOptions) -> ManifestResult<EntryPoint> {
        match self.load().await {
            Ok(doc) => {
                if let Some(main) = &doc.main {
                    return self.entry(EntryType::from_path(main), main, opts).await;
                }
            }
            Err(ManifestError::ManifestNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if self.exists("index.html").await {
            return self.entry(EntryType::Html, "index.html", opts).await;
        }
        if self.exists("index.js").await {
            return self.entry(EntryType::Js, "index.js", opts).await;
        }
        Err(ManifestError::NoEntryPoint(self.url.clone()))
    }

    async fn exists(&self, name: &str) -> bool {
        self.backend.fs().stat(&path::join(&self.path, name)).await.is_ok()
    }

    async fn entry(&self, kind: EntryType, filename: &str, opts: MainOptions) -> ManifestResult<EntryPoint> {
        let file = path::join(&self.path, filename);
        if opts.preload {
            self.backend.fs().read_file(&file).await?;
        }
        let url = format!("{}{}", self.url_prefix, file);
        info!(url = %url, kind = ?kind, "entry point resolved");
        Ok(EntryPoint { kind, url })
    }

    /// Read every file named in the manifest trace, concurrently.
    ///
    /// Individual failures are logged and skipped.
    pub async fn preload(&self) -> ManifestResult<PreloadResult> {
        let doc = self.load().await?;
        if doc.trace.is_empty() {
            return Ok(PreloadResult::default());
        }

        let fs = self.backend.fs();
        let reads = doc.trace.iter().map(|(key, file)| async move {
            (key, file, fs.read_file(file).await)
        });

        let mut result = PreloadResult::default();
        for (key, file, outcome) in join_all(reads).await {
            match outcome {
                Ok(data) => {
                    result.trace.insert(key.clone(), String::from_utf8_lossy(&data).into_owned());
                    result.preloaded += 1;
                }
                Err(e) => warn!(key = %key, file = %file, error = %e, "trace preload failed"),
            }
        }
        debug!(preloaded = result.preloaded, total = doc.trace.len(), "trace preloaded");
        Ok(result)
    }

    /// Fetch and pin everything under the application directory.
    ///
    /// Returns `None` for local applications. Dropping the returned future
    /// cancels the download.
    pub async fn download(&self) -> ManifestResult<Option<DownloadStats>> {
        match self.start_download() {
            Some(download) => Ok(Some(download.wait().await?)),
            None => Ok(None),
        }
    }

    /// Start [`download`](Self::download) without waiting for it. The
    /// transfer is canceled when the resolver closes.
    pub fn start_download(&self) -> Option<ManifestDownload> {
        let Backend::Drive(lease) = &self.backend else {
            return None;
        };

        let download = lease.download(&self.path);
        let id = self.next_download.fetch_add(1, Ordering::Relaxed);
        self.downloads
            .lock()
            .expect("lock poisoned")
            .insert(id, download.canceller());
        debug!(url = %self.url, id, "download started");
        Some(ManifestDownload { id, download: Some(download), registry: self.downloads.clone() })
    }

    /// Number of downloads still running.
    pub fn active_downloads(&self) -> usize {
        self.downloads.lock().expect("lock poisoned").len()
    }

    /// Cancel running downloads and give the drive back to the pool.
    pub fn close(self) {
        debug!(url = %self.url, "manifest resolver closed");
    }

    /// Cancel running downloads without closing the resolver.
    pub fn cancel_downloads(&self) {
        let mut downloads = self.downloads.lock().expect("lock poisoned");
        for (_, canceller) in downloads.drain() {
            canceller.cancel();
        }
    }
}

impl Drop for ManifestResolver {
    fn drop(&mut self) {
        self.cancel_downloads();
    }
}

fn local_path(url: &str) -> String {
    let p = std::path::Path::new(url);
    if p.is_absolute() {
        return path::normalize(url);
    }
    match std::path::absolute(p) {
        Ok(abs) => path::normalize(&abs.to_string_lossy()),
        Err(_) => path::normalize(url),
    }
}
