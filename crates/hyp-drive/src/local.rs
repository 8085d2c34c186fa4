use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{DriveError, DriveResult};
use crate::fs::{ByteStream, Filesystem, ReadRange, Stat};

/// Local disk backend.
///
/// Without a root, paths are host paths. With a root, every path is taken
/// relative to it and `..` cannot climb above it.
#[derive(Clone, Debug, Default)]
pub struct LocalFs {
    root: Option<PathBuf>,
}

impl LocalFs {
    /// Backend over host paths.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Backend confined to `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn host_path(&self, path: &str) -> DriveResult<PathBuf> {
        let Some(root) = &self.root else {
            return Ok(PathBuf::from(path));
        };
        let rel = Path::new(path.trim_start_matches('/'));
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(DriveError::NotFound(path.to_string()));
        }
        Ok(root.join(rel))
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn stat(&self, path: &str) -> DriveResult<Stat> {
        let meta = tokio::fs::metadata(self.host_path(path)?)
            .await
            .map_err(|e| DriveError::from_io(path, e))?;
        if meta.is_dir() {
            Ok(Stat::directory())
        } else {
            Ok(Stat::file(meta.len()))
        }
    }

    async fn read_file(&self, path: &str) -> DriveResult<Bytes> {
        let data = tokio::fs::read(self.host_path(path)?)
            .await
            .map_err(|e| DriveError::from_io(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn create_read_stream(&self, path: &str, range: ReadRange) -> DriveResult<ByteStream> {
        let host = self.host_path(path)?;
        let mut file = tokio::fs::File::open(&host)
            .await
            .map_err(|e| DriveError::from_io(path, e))?;
        let size = file.metadata().await?.len();
        let (offset, len) = range.bounds(size);
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(ReaderStream::new(file.take(len)).boxed())
    }

    async fn read_dir(&self, path: &str) -> DriveResult<Vec<String>> {
        let host = self.host_path(path)?;
        let mut dir = tokio::fs::read_dir(&host)
            .await
            .map_err(|e| DriveError::from_io(path, e))?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn collect(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn stat_and_read_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/a.js"), b"hello").unwrap();

        let fs = LocalFs::rooted(dir.path());
        assert_eq!(fs.stat("/lib/a.js").await.unwrap(), Stat::file(5));
        assert!(fs.stat("/lib").await.unwrap().is_dir());
        assert_eq!(&fs.read_file("/lib/a.js").await.unwrap()[..], b"hello");
        assert_eq!(fs.read_dir("/lib").await.unwrap(), vec!["a.js"]);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::rooted(dir.path());
        let err = fs.stat("/nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn parent_components_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::rooted(dir.path().join("inner"));
        assert!(fs.stat("/../secret").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn ranged_stream_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.bin"), b"0123456789").unwrap();
        let fs = LocalFs::rooted(dir.path());

        let part = fs.create_read_stream("/f.bin", ReadRange::new(2, 5)).await.unwrap();
        assert_eq!(collect(part).await, b"2345");

        let full = fs.create_read_stream("/f.bin", ReadRange::FULL).await.unwrap();
        assert_eq!(collect(full).await, b"0123456789");
    }

    #[tokio::test]
    async fn unrooted_uses_host_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        std::fs::write(&file, b"x").unwrap();
        let fs = LocalFs::new();
        assert!(fs.stat(file.to_str().unwrap()).await.unwrap().is_file());
    }
}
