use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use hyp_drive::LocalFs;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Holds one sub-directory per drive, named by its hex content key.
    pub drives_root: PathBuf,
    /// Directory key-less module requests resolve in.
    pub local_root: Option<PathBuf>,
    /// Serve key-less module requests from `local_root`. Without a root
    /// they answer 404.
    pub allow_local_modules: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9419)),
            drives_root: PathBuf::from("."),
            local_root: None,
            allow_local_modules: false,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Filesystem for key-less resolution, if local modules are allowed
    /// and confined to a root.
    pub fn local_fs(&self) -> Option<LocalFs> {
        if !self.allow_local_modules {
            return None;
        }
        match &self.local_root {
            Some(root) => Some(LocalFs::rooted(root)),
            None => {
                tracing::warn!("allow_local_modules is set without local_root; key-less requests will 404");
                None
            }
        }
    }
}
