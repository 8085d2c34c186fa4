use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hyp_types::ContentKey;

use crate::download::{fetch_tree, Download};
use crate::drive::{Drive, DriveOpener};
use crate::error::{DriveError, DriveResult};
use crate::fs::{ByteStream, Filesystem, ReadRange, Stat};
use crate::local::LocalFs;
use crate::path;

/// Drive replica stored as a plain directory on disk.
///
/// A drive root holds one sub-directory per content key, named by the key's
/// hex encoding. A missing sub-directory opens as an empty drive.
pub struct DirDrive {
    key: ContentKey,
    fs: LocalFs,
    closed: AtomicBool,
}

impl DirDrive {
    pub fn new(key: ContentKey, dir: impl Into<PathBuf>) -> Self {
        Self { key, fs: LocalFs::rooted(dir), closed: AtomicBool::new(false) }
    }

    fn ensure_open(&self) -> DriveResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriveError::Storage(format!("drive {} is closed", self.key.short_hex())));
        }
        Ok(())
    }
}

#[async_trait]
impl Filesystem for DirDrive {
    async fn stat(&self, path: &str) -> DriveResult<Stat> {
        self.ensure_open()?;
        self.fs.stat(path).await
    }

    async fn read_file(&self, path: &str) -> DriveResult<Bytes> {
        self.ensure_open()?;
        self.fs.read_file(path).await
    }

    async fn create_read_stream(&self, path: &str, range: ReadRange) -> DriveResult<ByteStream> {
        self.ensure_open()?;
        self.fs.create_read_stream(path, range).await
    }

    async fn read_dir(&self, path: &str) -> DriveResult<Vec<String>> {
        self.ensure_open()?;
        self.fs.read_dir(path).await
    }
}

impl Drive for DirDrive {
    fn key(&self) -> ContentKey {
        self.key
    }

    fn download(self: Arc<Self>, path: &str) -> Download {
        let root = path::normalize(path);
        Download::spawn(async move { fetch_tree(self.as_ref(), &root).await })
    }

    fn close(&self) -> DriveResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Opens [`DirDrive`]s below a drive root.
#[derive(Clone, Debug)]
pub struct DirOpener {
    root: PathBuf,
}

impl DirOpener {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the replica for `key`.
    pub fn drive_dir(&self, key: &ContentKey) -> PathBuf {
        self.root.join(key.to_hex())
    }
}

impl DriveOpener for DirOpener {
    fn open(&self, key: &ContentKey) -> DriveResult<Arc<dyn Drive>> {
        Ok(Arc::new(DirDrive::new(*key, self.drive_dir(key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_key_directory() {
        let root = tempfile::tempdir().unwrap();
        let key = ContentKey::from_bytes([3; 32]);
        let opener = DirOpener::new(root.path());
        std::fs::create_dir_all(opener.drive_dir(&key).join("app")).unwrap();
        std::fs::write(opener.drive_dir(&key).join("app/index.html"), b"<h1>").unwrap();

        let drive = opener.open(&key).unwrap();
        assert_eq!(drive.key(), key);
        assert_eq!(drive.stat("/app/index.html").await.unwrap(), Stat::file(4));

        let stats = drive.clone().download("/").wait().await.unwrap();
        assert_eq!(stats.files, 1);
    }

    #[tokio::test]
    async fn missing_replica_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let drive = DirOpener::new(root.path()).open(&ContentKey::from_bytes([4; 32])).unwrap();
        assert!(drive.stat("/index.html").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn closed_drive_rejects_reads() {
        let root = tempfile::tempdir().unwrap();
        let drive = DirDrive::new(ContentKey::from_bytes([5; 32]), root.path());
        drive.close().unwrap();
        assert!(matches!(drive.stat("/").await, Err(DriveError::Storage(_))));
    }
}
