use std::sync::Arc;

use hyp_types::{ContentKey, DiscoveryKey};

use crate::download::Download;
use crate::error::DriveResult;
use crate::fs::Filesystem;

/// An open, stateful connection to a replicated drive.
///
/// Drives are opened by a [`DriveOpener`] and owned by the
/// [`DriveStore`](crate::DriveStore). Callers never close a drive directly;
/// they check their handle back into the pool.
pub trait Drive: Filesystem {
    /// The content key this drive was opened for.
    fn key(&self) -> ContentKey;

    /// Topic announced on the replication network for this drive.
    fn discovery_key(&self) -> DiscoveryKey {
        self.key().discovery_key()
    }

    /// Eagerly fetch and pin everything under `path`.
    fn download(self: Arc<Self>, path: &str) -> Download;

    /// Release the drive's resources. Called by the pool exactly once.
    fn close(&self) -> DriveResult<()>;

    fn is_closed(&self) -> bool;
}

/// Creates drive objects for content keys.
///
/// Opening is synchronous: the returned drive becomes usable immediately and
/// fetches data lazily as it is read.
pub trait DriveOpener: Send + Sync {
    fn open(&self, key: &ContentKey) -> DriveResult<Arc<dyn Drive>>;
}
