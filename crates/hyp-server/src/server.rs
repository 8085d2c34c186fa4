use std::sync::Arc;

use hyp_drive::{DirOpener, DriveStore, LogNetwork};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Hyperspace protocol server.
pub struct HyperspaceServer {
    config: ServerConfig,
    store: Arc<DriveStore>,
}

impl HyperspaceServer {
    /// Serve drives from `config.drives_root`.
    pub fn new(config: ServerConfig) -> Self {
        let opener = Arc::new(DirOpener::new(&config.drives_root));
        let store = Arc::new(DriveStore::new(opener, Arc::new(LogNetwork)));
        Self::with_store(config, store)
    }

    /// Serve drives from an existing pool.
    pub fn with_store(config: ServerConfig, store: Arc<DriveStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DriveStore> {
        &self.store
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.store.clone(), self.config.local_fs()))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            drives_root = %self.config.drives_root.display(),
            "hyperspace server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = HyperspaceServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:9419".parse().unwrap());
        assert!(server.store().is_empty());
    }

    #[test]
    fn router_builds() {
        let server = HyperspaceServer::new(ServerConfig::default());
        let _router = server.router();
    }
}
