use hyp_types::ContentKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Drive the loader resolves against; `None` resolves on local disk.
    pub host: Option<ContentKey>,
    /// Requesting file for top-level `require` calls.
    pub root_filename: String,
    /// Upper bound on concurrent fetches during preload.
    pub preload_concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            host: None,
            root_filename: "/index.js".into(),
            preload_concurrency: 8,
        }
    }
}

impl LoaderConfig {
    pub fn for_host(host: ContentKey) -> Self {
        Self { host: Some(host), ..Self::default() }
    }

    pub fn with_root_filename(mut self, filename: impl Into<String>) -> Self {
        self.root_filename = filename.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = LoaderConfig::default();
        assert!(c.host.is_none());
        assert_eq!(c.root_filename, "/index.js");
        assert_eq!(c.preload_concurrency, 8);
    }

    #[test]
    fn builders() {
        let key = ContentKey::from_bytes([1; 32]);
        let c = LoaderConfig::for_host(key).with_root_filename("/app/main.js");
        assert_eq!(c.host, Some(key));
        assert_eq!(c.root_filename, "/app/main.js");
    }
}
