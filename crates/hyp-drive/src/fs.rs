use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::DriveResult;

/// Lazily produced file contents.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Kind of filesystem entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata returned by [`Filesystem::stat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    pub size: u64,
}

impl Stat {
    pub fn file(size: u64) -> Self {
        Self { kind: EntryKind::File, size }
    }

    pub fn directory() -> Self {
        Self { kind: EntryKind::Directory, size: 0 }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Inclusive byte bounds for [`Filesystem::create_read_stream`].
///
/// `end` is clamped to the last byte of the file when absent or too large.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ReadRange {
    /// The whole file.
    pub const FULL: Self = Self { start: None, end: None };

    pub fn new(start: u64, end: u64) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    /// Resolve against a file of `size` bytes into `(offset, length)`.
    pub fn bounds(&self, size: u64) -> (u64, u64) {
        let start = self.start.unwrap_or(0).min(size);
        let last = size.saturating_sub(1);
        let end = self.end.map_or(last, |e| e.min(last));
        if size == 0 || end < start {
            (start, 0)
        } else {
            (start, end - start + 1)
        }
    }
}

/// Uniform read-only filesystem interface.
///
/// Implemented by the local disk backend and by every drive. Higher layers
/// (manifest loading, module resolution, asset serving) only talk to this
/// trait, so they work the same over either backend.
///
/// All implementations must satisfy:
/// - `stat` on a missing path fails with [`DriveError::NotFound`](crate::DriveError::NotFound).
/// - Other I/O failures are reported as storage errors, never as not-found.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Metadata for `path`.
    async fn stat(&self, path: &str) -> DriveResult<Stat>;

    /// Read a whole file.
    async fn read_file(&self, path: &str) -> DriveResult<Bytes>;

    /// Stream a file, optionally bounded to an inclusive byte range.
    async fn create_read_stream(&self, path: &str, range: ReadRange) -> DriveResult<ByteStream>;

    /// Names of the entries directly inside `path`, sorted.
    async fn read_dir(&self, path: &str) -> DriveResult<Vec<String>>;
}
