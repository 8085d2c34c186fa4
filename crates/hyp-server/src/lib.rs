//! HTTP server for Hyperspace.
//!
//! Exposes the two protocol handlers over HTTP so tools and remote hosts can
//! use them without embedding:
//!
//! - `GET /require?name=&filename=&key=&empty=` -- module resolution
//! - `GET /asset/{key}/{path}` -- drive files, honouring `Range`
//! - `GET /v1/health`

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, ProtocolReply};
pub use server::HyperspaceServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hyp_drive::{DriveStore, MemoryOpener, RecordingNetwork};
    use hyp_types::ContentKey;
    use tower::util::ServiceExt;

    fn key() -> ContentKey {
        ContentKey::from_bytes([0x77; 32])
    }

    fn server() -> HyperspaceServer {
        let opener = Arc::new(MemoryOpener::new());
        opener.insert_file(&key(), "/app/index.js", "require('./lib')");
        opener.insert_file(&key(), "/app/lib.js", "module.exports = 'lib'");
        opener.insert_file(&key(), "/media/song.mp3", vec![7u8; 4096]);
        let store = Arc::new(DriveStore::new(opener, Arc::new(RecordingNetwork::new())));
        HyperspaceServer::with_store(ServerConfig::default(), store)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = server().router().oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn require_endpoint_streams_source() {
        let server = server();
        let uri = format!("/require?name=.%2Flib&filename=%2Fapp%2Findex.js&key={}", key().to_hex());
        let response = server.router().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-filename"], "/app/lib.js");
        assert_eq!(response.headers()["x-dirname"], "/app");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"module.exports = 'lib'");
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn require_endpoint_rejects_incomplete_queries() {
        let response = server().router().oneshot(get("/require?name=x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn default_config_does_not_serve_host_files() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("id_rsa");
        std::fs::write(&secret, "PRIVATE KEY").unwrap();

        let server = HyperspaceServer::new(ServerConfig::default());
        let name = secret.to_str().unwrap().replace('/', "%2F");
        let uri = format!("/require?name={name}&filename=%2F");
        let response = server.router().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("access-control-allow-origin").is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn local_modules_stay_inside_local_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/util.js"), "local").unwrap();
        let config = ServerConfig {
            local_root: Some(dir.path().to_path_buf()),
            allow_local_modules: true,
            ..ServerConfig::default()
        };
        let server = HyperspaceServer::new(config);

        let response = server
            .router()
            .oneshot(get("/require?name=.%2Futil&filename=%2Fapp%2Findex.js"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"local");

        let response = server
            .router()
            .oneshot(get("/require?name=..%2F..%2Fetc%2Fpasswd&filename=%2Fapp%2Findex.js"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn keyless_require_is_404_when_local_modules_disabled() {
        let response = server()
            .router()
            .oneshot(get("/require?name=.%2Flib&filename=%2Fapp%2Findex.js"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn asset_endpoint_serves_ranges() {
        let server = server();
        let request = Request::builder()
            .uri(format!("/asset/{}/media/song.mp3", key().to_hex()))
            .header("range", "bytes=1000-1999")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 1000-1999/4096");
        assert_eq!(response.headers()["content-type"], "audio/mpeg");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 1000);
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn asset_endpoint_full_and_missing() {
        let server = server();
        let uri = format!("/asset/{}/app/index.js", key().to_hex());
        let response = server.router().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-length"], "16");
        assert_eq!(response.headers()["accept-ranges"], "bytes");
        drop(response);
        assert!(server.store().is_empty());

        let uri = format!("/asset/{}/nope.png", key().to_hex());
        let response = server.router().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server.router().oneshot(get("/asset/not-a-key/app/index.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(server.store().is_empty());
    }
}
