use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{DriveError, DriveResult};
use crate::fs::Filesystem;
use crate::path;

/// Totals for a finished download.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub files: u64,
    pub bytes: u64,
}

impl DownloadStats {
    fn add(&mut self, other: DownloadStats) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// An eager fetch running in the background.
///
/// Dropping a `Download` does not stop it; call [`Download::cancel`] or a
/// [`DownloadCanceller`] obtained from it.
pub struct Download {
    token: CancellationToken,
    task: JoinHandle<DriveResult<DownloadStats>>,
}

impl Download {
    /// Spawn `fut` on the current tokio runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = DriveResult<DownloadStats>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = child.cancelled() => Err(DriveError::Cancelled),
                res = fut => res,
            }
        });
        Self { token, task }
    }

    /// Cancel handle that outlives `wait`.
    pub fn canceller(&self) -> DownloadCanceller {
        DownloadCanceller(self.token.clone())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for completion. A canceled download yields [`DriveError::Cancelled`].
    pub async fn wait(self) -> DriveResult<DownloadStats> {
        match self.task.await {
            Ok(res) => res,
            Err(e) if e.is_cancelled() => Err(DriveError::Cancelled),
            Err(e) => Err(DriveError::Storage(format!("download task failed: {e}"))),
        }
    }
}

/// Cloneable cancel handle for a [`Download`].
#[derive(Clone, Debug)]
pub struct DownloadCanceller(CancellationToken);

impl DownloadCanceller {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Read every file under `root`, recursively.
///
/// Backends that replicate lazily use this to pull and pin a whole subtree.
pub fn fetch_tree<'a>(fs: &'a dyn Filesystem, root: &'a str) -> BoxFuture<'a, DriveResult<DownloadStats>> {
    async move {
        let stat = fs.stat(root).await?;
        if stat.is_file() {
            let data = fs.read_file(root).await?;
            return Ok(DownloadStats { files: 1, bytes: data.len() as u64 });
        }
        let mut total = DownloadStats::default();
        for name in fs.read_dir(root).await? {
            let child = path::join(root, &name);
            total.add(fetch_tree(fs, &child).await?);
        }
        Ok(total)
    }
    .boxed()
}
