use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hyp_types::ContentKey;

use crate::download::{fetch_tree, Download};
use crate::drive::{Drive, DriveOpener};
use crate::error::{DriveError, DriveResult};
use crate::fs::{ByteStream, Filesystem, ReadRange, Stat};
use crate::path;

/// Chunk size used when streaming from memory.
const CHUNK_SIZE: usize = 16 * 1024;

/// Files of one drive, shared by every handle opened for its key.
type Files = Arc<RwLock<BTreeMap<String, Bytes>>>;

/// In-memory drive, intended for tests and embedding.
///
/// Directories are implied by file paths. Every handle opened for the same
/// key by a [`MemoryOpener`] sees the same files, the way handles to one
/// replicated drive see the same data.
pub struct MemoryDrive {
    key: ContentKey,
    files: Files,
    closed: AtomicBool,
}

impl MemoryDrive {
    /// Create an empty drive.
    pub fn new(key: ContentKey) -> Self {
        Self::with_files(key, Files::default())
    }

    fn with_files(key: ContentKey, files: Files) -> Self {
        Self { key, files, closed: AtomicBool::new(false) }
    }

    /// Add or replace a file.
    pub fn write_file(&self, path: &str, data: impl Into<Bytes>) {
        self.files
            .write()
            .expect("lock poisoned")
            .insert(path::normalize(path), data.into());
    }

    fn ensure_open(&self) -> DriveResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriveError::Storage(format!("drive {} is closed", self.key.short_hex())));
        }
        Ok(())
    }

    fn get(&self, path: &str) -> DriveResult<Bytes> {
        self.ensure_open()?;
        let key = path::normalize(path);
        let files = self.files.read().expect("lock poisoned");
        if let Some(data) = files.get(&key) {
            return Ok(data.clone());
        }
        if is_dir(&files, &key) {
            return Err(DriveError::Storage(format!("is a directory: {path}")));
        }
        Err(DriveError::NotFound(path.to_string()))
    }
}

fn is_dir(files: &BTreeMap<String, Bytes>, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    let prefix = format!("{dir}/");
    files
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&prefix))
}

#[async_trait]
impl Filesystem for MemoryDrive {
    async fn stat(&self, path: &str) -> DriveResult<Stat> {
        self.ensure_open()?;
        let key = path::normalize(path);
        let files = self.files.read().expect("lock poisoned");
        if let Some(data) = files.get(&key) {
            Ok(Stat::file(data.len() as u64))
        } else if is_dir(&files, &key) {
            Ok(Stat::directory())
        } else {
            Err(DriveError::NotFound(path.to_string()))
        }
    }

    async fn read_file(&self, path: &str) -> DriveResult<Bytes> {
        self.get(path)
    }

    async fn create_read_stream(&self, path: &str, range: ReadRange) -> DriveResult<ByteStream> {
        let data = self.get(path)?;
        let (offset, len) = range.bounds(data.len() as u64);
        let slice = data.slice(offset as usize..(offset + len) as usize);
        let chunks: Vec<std::io::Result<Bytes>> = (0..slice.len())
            .step_by(CHUNK_SIZE)
            .map(|i| Ok(slice.slice(i..(i + CHUNK_SIZE).min(slice.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn read_dir(&self, path: &str) -> DriveResult<Vec<String>> {
        self.ensure_open()?;
        let dir = path::normalize(path);
        let files = self.files.read().expect("lock poisoned");
        if files.contains_key(&dir) {
            return Err(DriveError::NotADirectory(path.to_string()));
        }
        if !is_dir(&files, &dir) {
            return Err(DriveError::NotFound(path.to_string()));
        }
        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or_default().to_string())
            .collect();
        names.dedup();
        Ok(names)
    }
}

impl Drive for MemoryDrive {
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

impl std::fmt::Debug for MemoryDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDrive")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens [`MemoryDrive`]s. Unknown keys open as empty drives.
#[derive(Default)]
pub struct MemoryOpener {
    contents: RwLock<HashMap<ContentKey, Files>>,
    opened: Mutex<Vec<Arc<MemoryDrive>>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file into the drive for `key`.
    pub fn insert_file(&self, key: &ContentKey, path: &str, data: impl Into<Bytes>) {
        let files = self.files(key);
        files
            .write()
            .expect("lock poisoned")
            .insert(path::normalize(path), data.into());
    }

    /// Every drive object opened so far, oldest first.
    pub fn opened(&self) -> Vec<Arc<MemoryDrive>> {
        self.opened.lock().expect("lock poisoned").clone()
    }

    /// Number of drive objects opened for `key`.
    pub fn open_count(&self, key: &ContentKey) -> usize {
        self.opened().iter().filter(|d| d.key == *key).count()
    }

    fn files(&self, key: &ContentKey) -> Files {
        self.contents
            .write()
            .expect("lock poisoned")
            .entry(*key)
            .or_default()
            .clone()
    }
}

impl DriveOpener for MemoryOpener {
    fn open(&self, key: &ContentKey) -> DriveResult<Arc<dyn Drive>> {
        let drive = Arc::new(MemoryDrive::with_files(*key, self.files(key)));
        self.opened.lock().expect("lock poisoned").push(drive.clone());
        Ok(drive)
    }
}
