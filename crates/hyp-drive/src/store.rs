use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use hyp_types::{ContentKey, DiscoveryKey};
use tracing::{debug, warn};

use crate::download::Download;
use crate::drive::{Drive, DriveOpener};
use crate::error::{DriveError, DriveResult};
use crate::fs::{ByteStream, Filesystem, ReadRange, Stat};
use crate::network::{JoinOptions, Network};

/// A checked-out drive.
///
/// Handles are not `Clone`: each one stands for exactly one reference in the
/// pool and must be given back with [`DriveStore::checkin`] (or wrapped in a
/// [`DriveLease`], which does that on drop).
pub struct DriveHandle {
    key: ContentKey,
    drive: Arc<dyn Drive>,
}

impl DriveHandle {
    pub fn key(&self) -> ContentKey {
        self.key
    }

    pub fn discovery_key(&self) -> DiscoveryKey {
        self.drive.discovery_key()
    }

    /// The drive behind this handle.
    pub fn drive(&self) -> &Arc<dyn Drive> {
        &self.drive
    }

    /// Start an eager fetch of everything under `path`.
    pub fn download(&self, path: &str) -> Download {
        self.drive.clone().download(path)
    }
}

impl Deref for DriveHandle {
    type Target = dyn Drive;

    fn deref(&self) -> &Self::Target {
        self.drive.as_ref()
    }
}

#[async_trait]
impl Filesystem for DriveHandle {
    async fn stat(&self, path: &str) -> DriveResult<Stat> {
        self.drive.stat(path).await
    }

    async fn read_file(&self, path: &str) -> DriveResult<Bytes> {
        self.drive.read_file(path).await
    }

    async fn create_read_stream(&self, path: &str, range: ReadRange) -> DriveResult<ByteStream> {
        self.drive.create_read_stream(path, range).await
    }

    async fn read_dir(&self, path: &str) -> DriveResult<Vec<String>> {
        self.drive.read_dir(path).await
    }
}

impl std::fmt::Debug for DriveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveHandle").field("key", &self.key).finish()
    }
}

struct PoolEntry {
    drive: Arc<dyn Drive>,
    refs: usize,
}

/// Reference-counted pool of open drives, keyed by content key.
///
/// The pool is the only owner of drive lifecycles:
/// - The first checkout of a key opens the drive and starts a lookup on its
///   discovery key.
/// - Later checkouts of the same key share that drive.
/// - The checkin that brings the count to zero closes the drive, evicts it
///   and stops the lookup. This happens exactly once per zero-crossing.
///
/// Checkout and checkin are synchronous, so operations on one key are
/// applied in the order callers issue them.
pub struct DriveStore {
    opener: Arc<dyn DriveOpener>,
    network: Arc<dyn Network>,
    pool: Mutex<HashMap<ContentKey, PoolEntry>>,
}

impl DriveStore {
    pub fn new(opener: Arc<dyn DriveOpener>, network: Arc<dyn Network>) -> Self {
        Self {
            opener,
            network,
            pool: Mutex::new(HashMap::new()),
        }
    }

    /// Take a reference to the drive for `key`, opening it if needed.
    pub fn checkout(&self, key: &ContentKey) -> DriveResult<DriveHandle> {
        let mut pool = self.pool.lock().expect("pool lock poisoned");
        if let Some(entry) = pool.get_mut(key) {
            entry.refs += 1;
            debug!(key = %key.short_hex(), refs = entry.refs, "drive checkout");
            return Ok(DriveHandle { key: *key, drive: entry.drive.clone() });
        }

        let drive = self.opener.open(key)?;
        self.network.configure(&drive.discovery_key(), JoinOptions::LOOKUP);
        pool.insert(*key, PoolEntry { drive: drive.clone(), refs: 1 });
        debug!(key = %key.short_hex(), "drive opened");
        Ok(DriveHandle { key: *key, drive })
    }

    /// Parse a hex key and check it out.
    pub fn checkout_hex(&self, key: &str) -> DriveResult<DriveHandle> {
        self.checkout(&ContentKey::from_hex(key)?)
    }

    /// Give a reference back. Returns `true` if this closed the drive.
    ///
    /// Fails with [`DriveError::UnknownResource`] and changes nothing if the
    /// handle does not belong to a drive currently in this pool.
    pub fn checkin(&self, handle: DriveHandle) -> DriveResult<bool> {
        let mut pool = self.pool.lock().expect("pool lock poisoned");
        let entry = match pool.get_mut(&handle.key) {
            Some(entry) if Arc::ptr_eq(&entry.drive, &handle.drive) => entry,
            _ => return Err(DriveError::UnknownResource(handle.key.to_hex())),
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            debug!(key = %handle.key.short_hex(), refs = entry.refs, "drive checkin");
            return Ok(false);
        }

        let entry = pool.remove(&handle.key).expect("entry present");
        drop(pool);

        if let Err(e) = entry.drive.close() {
            warn!(key = %handle.key.short_hex(), error = %e, "drive close failed");
        }
        self.network.configure(&entry.drive.discovery_key(), JoinOptions::LEAVE);
        debug!(key = %handle.key.short_hex(), "drive closed");
        Ok(true)
    }

    /// Check out `key` behind a guard that checks it back in on drop.
    pub fn lease(self: &Arc<Self>, key: &ContentKey) -> DriveResult<DriveLease> {
        let handle = self.checkout(key)?;
        Ok(DriveLease { store: self.clone(), handle: Some(handle) })
    }

    /// Re-announce lookup interest for a checked-out drive.
    pub fn announce_lookup(&self, handle: &DriveHandle) {
        self.network.configure(&handle.discovery_key(), JoinOptions::LOOKUP);
    }

    /// Current reference count for `key` (zero if not open).
    pub fn ref_count(&self, key: &ContentKey) -> usize {
        self.pool
            .lock()
            .expect("pool lock poisoned")
            .get(key)
            .map_or(0, |e| e.refs)
    }

    pub fn is_open(&self, key: &ContentKey) -> bool {
        self.ref_count(key) > 0
    }

    /// Number of open drives.
    pub fn len(&self) -> usize {
        self.pool.lock().expect("pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DriveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveStore").field("open_drives", &self.len()).finish()
    }
}

/// Scoped checkout: the handle is checked in exactly once, either by
/// [`DriveLease::release`] or when the lease is dropped.
pub struct DriveLease {
    store: Arc<DriveStore>,
    handle: Option<DriveHandle>,
}

impl DriveLease {
    /// Check the handle in now. Returns `true` if this closed the drive.
    pub fn release(mut self) -> bool {
        self.checkin()
    }

    fn checkin(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        match self.store.checkin(handle) {
            Ok(closed) => closed,
            Err(e) => {
                warn!(error = %e, "lease checkin failed");
                false
            }
        }
    }

    pub fn handle(&self) -> &DriveHandle {
        self.handle.as_ref().expect("lease holds a handle until released")
    }
}

impl Deref for DriveLease {
    type Target = DriveHandle;

    fn deref(&self) -> &Self::Target {
        self.handle()
    }
}

impl Drop for DriveLease {
    fn drop(&mut self) {
        self.checkin();
    }
}

impl std::fmt::Debug for DriveLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveLease").field("handle", &self.handle).finish()
    }
}
