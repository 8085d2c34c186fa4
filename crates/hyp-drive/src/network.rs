use std::collections::HashMap;
use std::sync::Mutex;

use hyp_types::DiscoveryKey;

/// How this node participates in a discovery topic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoinOptions {
    /// Look up peers that have the data.
    pub lookup: bool,
    /// Announce ourselves as a peer that has the data.
    pub announce: bool,
}

impl JoinOptions {
    /// Find peers without advertising. Used for every checked-out drive.
    pub const LOOKUP: Self = Self { lookup: true, announce: false };
    /// Stop participating in the topic.
    pub const LEAVE: Self = Self { lookup: false, announce: false };
}

/// Replication network client.
///
/// Peer discovery and replication themselves live outside this crate; the
/// pool only tells the network which topics it is interested in.
pub trait Network: Send + Sync {
    fn configure(&self, discovery_key: &DiscoveryKey, opts: JoinOptions);
}

/// Network that only logs topic changes. Used when no replication daemon
/// is attached (e.g. drives served from a local directory).
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNetwork;

impl Network for LogNetwork {
    fn configure(&self, discovery_key: &DiscoveryKey, opts: JoinOptions) {
        tracing::debug!(
            topic = %discovery_key.short_hex(),
            lookup = opts.lookup,
            announce = opts.announce,
            "network configure"
        );
    }
}

/// Network that records every call, for tests and embedding.
#[derive(Debug, Default)]
pub struct RecordingNetwork {
    calls: Mutex<Vec<(DiscoveryKey, JoinOptions)>>,
}

impl RecordingNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `configure` call in order.
    pub fn calls(&self) -> Vec<(DiscoveryKey, JoinOptions)> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Latest options per topic.
    pub fn topics(&self) -> HashMap<DiscoveryKey, JoinOptions> {
        self.calls().into_iter().collect()
    }

    /// Returns `true` if the latest options for the topic enable lookup.
    pub fn is_looking_up(&self, discovery_key: &DiscoveryKey) -> bool {
        self.topics().get(discovery_key).is_some_and(|o| o.lookup)
    }
}

impl Network for RecordingNetwork {
    fn configure(&self, discovery_key: &DiscoveryKey, opts: JoinOptions) {
        self.calls
            .lock()
            .expect("lock poisoned")
            .push((*discovery_key, opts));
    }
}
